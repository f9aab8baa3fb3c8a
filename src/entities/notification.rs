//! Notification entity - The delivery ledger.
//!
//! One row per (entity, entity id, event) that has actually been delivered.
//! The overdue sweep consults this table before sending: absence of a row is
//! the only signal that a notification is still owed, which is what makes
//! repeated sweeps idempotent.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification record database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    /// Unique identifier for the record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Kind of entity the notification documents: `"invoice"` or `"reset"`
    pub entity: String,
    /// Id of the invoice or reset token
    pub entity_id: i64,
    /// Event delivered: `"created"`, `"overdue"`, or `"issued"`
    pub event: String,
    /// Channel the transport delivered on (e.g., `"email"`)
    pub channel: String,
    /// When delivery succeeded
    pub sent_at: DateTimeUtc,
}

/// Notification records reference their entity by (kind, id) rather than a
/// foreign key, so they have no ORM-level relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
