//! Unified error types and result handling for the billing engine.
//!
//! Every fallible operation in the crate returns [`Result`]. Validation
//! errors are raised before any database mutation, so a rejected input never
//! leaves a partial write behind.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file or value problem
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what is wrong with the configuration
        message: String,
    },

    /// A charge, payment, or billing amount failed validation
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The offending amount
        amount: f64,
    },

    /// An invoice already exists for this student and billing period
    #[error("Invoice already exists for student {student_id} in period {period}")]
    DuplicateInvoice {
        /// Student the duplicate was attempted for
        student_id: i64,
        /// Billing period of the duplicate
        period: String,
    },

    /// No invoice with the given id
    #[error("Invoice not found: {id}")]
    InvoiceNotFound {
        /// The missing invoice id
        id: i64,
    },

    /// No student with the given id
    #[error("Student not found: {id}")]
    StudentNotFound {
        /// The missing student id
        id: i64,
    },

    /// No account matching the given identifier
    #[error("Account not found: {identity}")]
    AccountNotFound {
        /// Email or id used for the lookup
        identity: String,
    },

    /// Login failed: unknown account, inactive account, or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No live reset token exists for the account
    #[error("No reset token on file")]
    TokenNotFound,

    /// The reset token exists but its expiry has passed
    #[error("Reset token has expired")]
    TokenExpired,

    /// The supplied reset code does not match the stored one
    #[error("Reset code does not match")]
    CodeMismatch,

    /// The delivery transport failed or timed out
    #[error("Transport failure: {message}")]
    Transport {
        /// What the transport reported
        message: String,
    },

    /// A conditional update raced with a concurrent writer and lost
    #[error("Conflicting update on {entity} {id}")]
    StoreConflict {
        /// Table the conflict occurred on
        entity: &'static str,
        /// Record the conflict occurred on
        id: i64,
    },

    /// Password hashing or verification failed internally
    #[error("Password hashing error: {message}")]
    PasswordHash {
        /// What the hasher reported
        message: String,
    },

    /// Database error from the underlying store
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
