//! Core business logic - framework-agnostic billing and account-recovery
//! operations.
//!
//! Nothing in here knows about a UI. Each module takes a database connection
//! (and, where delivery is involved, a transport) and returns plain domain
//! results, so the same code serves interactive callers and the scheduled
//! sweep worker alike.

/// Login accounts: provisioning, password verification, the forced-change gate
pub mod account;
/// Invoice lifecycle: creation, payments, and the overdue state machine
pub mod invoice;
/// Pure balance arithmetic over charges and payments
pub mod ledger;
/// Notification dispatch with the at-most-once delivery ledger
pub mod notify;
/// Time-limited single-use reset codes
pub mod reset;
/// Student residency and billing-profile records
pub mod student;
/// The scheduled sweep tying the lifecycle manager and dispatcher together
pub mod sweep;
