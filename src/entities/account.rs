//! Account entity - A login identity for the dashboard.
//!
//! Passwords are stored as Argon2id PHC hashes, never in clear. Accounts
//! provisioned by an administrator start with `must_change_password` set,
//! which gates all access until the holder picks their own password.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Unique identifier for the account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Login email, unique across accounts
    #[sea_orm(unique)]
    pub email: String,
    /// Display name
    pub full_name: String,
    /// Role: `"student"`, `"manager"`, or `"admin"`
    pub role: String,
    /// Argon2id hash of the current password, PHC string format
    pub password_hash: String,
    /// Hard gate: when set, login succeeds only into the password-change flow
    pub must_change_password: bool,
    /// Inactive accounts cannot log in
    pub active: bool,
    /// When the account was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Account and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One account has at most one live reset token
    #[sea_orm(has_many = "super::reset_token::Entity")]
    ResetTokens,
    /// One account may be linked to a student record
    #[sea_orm(has_many = "super::student::Entity")]
    Students,
}

impl Related<super::reset_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ResetTokens.def()
    }
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Students.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
