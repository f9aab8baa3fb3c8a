//! Shared test utilities.
//!
//! Common helpers for setting up an in-memory database, creating entities
//! with sensible defaults, and a recording transport double for exercising
//! notification delivery without a mail relay.

use crate::{
    config::settings::Settings,
    core::{account, invoice, notify::Transport, student, student::NewStudent},
    entities::{account as account_entity, charge, invoice as invoice_entity, payment, student as student_entity},
    errors::{Error, Result},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{DatabaseConnection, Set, prelude::*};
use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Default settings for tests (ZAR currency, all notifications on).
#[must_use]
pub fn test_settings() -> Settings {
    Settings::default()
}

/// Builds a [`NewStudent`] with the standard test profile:
/// rent 1000, electricity 150, water 50 (1200 per month in total).
#[must_use]
pub fn new_test_student(name: &str) -> NewStudent {
    let email = format!(
        "{}@example.com",
        name.to_lowercase().replace(char::is_whitespace, ".")
    );
    NewStudent {
        account_id: None,
        full_name: name.to_string(),
        suite: "Suite 1".to_string(),
        room: "4".to_string(),
        entry_date: NaiveDate::from_ymd_opt(2023, 2, 1).expect("valid date"),
        home_address: "12 Main Rd".to_string(),
        phone: "+27820000000".to_string(),
        email,
        monthly_rent: 1000.0,
        electricity: 150.0,
        water: 50.0,
        internet: 0.0,
        other_utilities: 0.0,
        next_of_kin: "B M".to_string(),
        next_of_kin_contact: "+27830000000".to_string(),
    }
}

/// Creates a student with the standard test profile.
pub async fn create_test_student(
    db: &DatabaseConnection,
    name: &str,
) -> Result<student_entity::Model> {
    student::create_student(db, new_test_student(name)).await
}

/// Inserts a charge row directly.
pub async fn create_test_charge(
    db: &DatabaseConnection,
    student_id: i64,
    label: &str,
    amount: f64,
    period: &str,
) -> Result<charge::Model> {
    let issued_on = NaiveDate::parse_from_str(&format!("{period}-01"), "%Y-%m-%d")
        .map_err(|e| Error::Config {
            message: format!("bad test period: {e}"),
        })?;
    let model = charge::ActiveModel {
        student_id: Set(student_id),
        label: Set(label.to_string()),
        amount: Set(amount),
        period: Set(period.to_string()),
        issued_on: Set(issued_on),
        ..Default::default()
    };
    model.insert(db).await.map_err(Into::into)
}

/// Inserts an unlinked payment row directly (not applied to any invoice).
pub async fn create_test_payment(
    db: &DatabaseConnection,
    student_id: i64,
    amount: f64,
    paid_on: NaiveDate,
) -> Result<payment::Model> {
    let model = payment::ActiveModel {
        student_id: Set(student_id),
        invoice_id: Set(None),
        amount: Set(amount),
        paid_on: Set(paid_on),
        reference: Set(None),
        ..Default::default()
    };
    model.insert(db).await.map_err(Into::into)
}

/// Creates the standard scenario: a student with the 1200/month profile and
/// their January invoice due 2024-01-05. Returns (student, invoice).
pub async fn setup_with_invoice(
    db: &DatabaseConnection,
) -> Result<(student_entity::Model, invoice_entity::Model)> {
    let resident = create_test_student(db, "Thandi M").await?;
    let inv = invoice::create_invoice(
        db,
        resident.id,
        "2024-01",
        NaiveDate::from_ymd_opt(2024, 1, 5).expect("valid date"),
        "rent",
    )
    .await?;
    Ok((resident, inv))
}

/// Provisions an account for tests, discarding the temporary password.
pub async fn create_test_account(
    db: &DatabaseConnection,
    email: &str,
) -> Result<account_entity::Model> {
    let (created, _temp) = account::provision_account(db, email, "Thandi M", "student").await?;
    Ok(created)
}

/// One message captured by [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    /// Address the message was sent to
    pub recipient: String,
    /// Subject line
    pub subject: String,
    /// Rendered body
    pub body: String,
}

/// In-memory transport double: records every send, and can be switched into
/// a failing mode to exercise delivery-failure paths.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl MemoryTransport {
    /// A fresh, healthy transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().expect("transport mutex poisoned").clone()
    }

    /// Toggles failure mode: while set, every send errors.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn channel(&self) -> &'static str {
        "memory"
    }

    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Transport {
                message: "simulated outage".to_string(),
            });
        }
        self.sent
            .lock()
            .expect("transport mutex poisoned")
            .push(SentMessage {
                recipient: recipient.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }
}
