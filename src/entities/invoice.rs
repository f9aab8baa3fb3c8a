//! Invoice entity - One bill per student per billing period.
//!
//! The `status` column holds one of `"unpaid"`, `"overdue"`, or `"paid"`;
//! transitions are driven exclusively through `core::invoice` so the state
//! machine stays monotonic. Exactly one invoice may exist per
//! (student, period) pair.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invoice database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    /// Unique identifier for the invoice
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Student being billed
    pub student_id: i64,
    /// Billing period the invoice covers, formatted `YYYY-MM`
    pub period: String,
    /// Amount due, always non-negative
    pub amount: f64,
    /// Date payment is due
    pub due_date: Date,
    /// Lifecycle status: `"unpaid"`, `"overdue"`, or `"paid"`
    pub status: String,
    /// Short note describing the invoice (e.g., "rent")
    pub note: String,
    /// When the invoice was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Invoice and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each invoice belongs to one student
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id"
    )]
    Student,
    /// One invoice has many payments applied to it
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
