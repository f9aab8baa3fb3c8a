//! Charge entity - A named, dated amount a student owes.
//!
//! Charges are immutable once issued; a new billing period gets new charge
//! rows rather than edits to old ones.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Charge database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "charges")]
pub struct Model {
    /// Unique identifier for the charge
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Student this charge belongs to
    pub student_id: i64,
    /// What the charge is for (e.g., "rent", "electricity")
    pub label: String,
    /// Amount owed, always non-negative
    pub amount: f64,
    /// Billing period the charge covers, formatted `YYYY-MM`
    pub period: String,
    /// Date the charge was issued
    pub issued_on: Date,
}

/// Defines relationships between Charge and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each charge belongs to one student
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id"
    )]
    Student,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
