//! Reset token entity - A time-limited, single-use recovery code.
//!
//! At most one live token exists per account: issuing a new one deletes any
//! prior row, and a successful validation deletes the row it matched. The
//! code itself is six ASCII digits.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Reset token database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reset_tokens")]
pub struct Model {
    /// Unique identifier for the token
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Account the token was issued for
    pub account_id: i64,
    /// Six-digit numeric recovery code
    pub code: String,
    /// When the token was issued
    pub issued_at: DateTimeUtc,
    /// Instant after which validation fails with an expiry error
    pub expires_at: DateTimeUtc,
    /// Optional one-time temporary password hash issued alongside the code
    pub temp_password_hash: Option<String>,
}

/// Defines relationships between ResetToken and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each token belongs to one account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
