//! Student entity - Represents a resident and their billing profile.
//!
//! Each student carries their occupancy (suite/room, entry and exit dates),
//! contact details, the monthly rent, and the recurring utility amounts that
//! feed charge generation. Students are soft-retired on move-out and never
//! hard-deleted while invoices reference them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Student database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "students")]
pub struct Model {
    /// Unique identifier for the student
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Login account tied to this student, if one has been provisioned
    pub account_id: Option<i64>,
    /// Full legal name
    pub full_name: String,
    /// Suite the student occupies (e.g., "Suite 1")
    pub suite: String,
    /// Room number within the suite
    pub room: String,
    /// Date the student moved in
    pub entry_date: Date,
    /// Date the student moved (or will move) out, if known
    pub exit_date: Option<Date>,
    /// Home address kept on file
    pub home_address: String,
    /// Contact phone number including country code
    pub phone: String,
    /// Contact email address for invoices and reminders
    pub email: String,
    /// Monthly rent amount
    pub monthly_rent: f64,
    /// Recurring electricity charge
    pub electricity: f64,
    /// Recurring water charge
    pub water: f64,
    /// Recurring internet charge
    pub internet: f64,
    /// Any other recurring utility charge
    pub other_utilities: f64,
    /// Next of kin name
    pub next_of_kin: String,
    /// Next of kin contact (phone or email)
    pub next_of_kin_contact: String,
    /// Soft-retire flag set on move-out; retired students are skipped by billing
    pub is_retired: bool,
}

/// Defines relationships between Student and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One student has many charges
    #[sea_orm(has_many = "super::charge::Entity")]
    Charges,
    /// One student has many payments
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
    /// One student has many invoices
    #[sea_orm(has_many = "super::invoice::Entity")]
    Invoices,
    /// Each student may belong to one login account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
}

impl Related<super::charge::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Charges.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
