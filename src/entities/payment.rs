//! Payment entity - A named, dated amount received from a student.
//!
//! Payments are immutable once recorded. A payment may be linked to a
//! specific invoice (counting toward its paid-to-date total) or stand alone
//! as general credit.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    /// Unique identifier for the payment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Student the payment was received from
    pub student_id: i64,
    /// Invoice the payment applies to, if any
    pub invoice_id: Option<i64>,
    /// Amount received, always positive
    pub amount: f64,
    /// Date the payment was received
    pub paid_on: Date,
    /// Free-form reference (bank reference, receipt number)
    pub reference: Option<String>,
}

/// Defines relationships between Payment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payment belongs to one student
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id"
    )]
    Student,
    /// A payment may apply to one invoice
    #[sea_orm(
        belongs_to = "super::invoice::Entity",
        from = "Column::InvoiceId",
        to = "super::invoice::Column::Id"
    )]
    Invoice,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
