//! Student business logic - residency records and the billing profile.
//!
//! Provides functions for creating, retrieving, and retiring students, and
//! for computing a student's outstanding balance from their full charge and
//! payment history. Students are only ever soft-retired: invoices keep
//! referencing them after move-out.

use crate::{
    core::ledger,
    entities::{Charge, Payment, Student, charge, payment, student},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, Set, prelude::*};

/// Input for creating a student record.
///
/// Mirrors the intake form: occupancy, contacts, and the recurring amounts
/// that drive monthly billing.
#[derive(Debug, Clone)]
pub struct NewStudent {
    /// Login account to link, if one exists yet
    pub account_id: Option<i64>,
    /// Full legal name
    pub full_name: String,
    /// Suite being occupied
    pub suite: String,
    /// Room number within the suite
    pub room: String,
    /// Move-in date
    pub entry_date: NaiveDate,
    /// Home address
    pub home_address: String,
    /// Contact phone including country code
    pub phone: String,
    /// Contact email for invoices and reminders
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
    /// Next of kin contact
    pub next_of_kin_contact: String,
}

/// Creates a new student record, validating the name and every recurring
/// amount before writing.
pub async fn create_student(db: &DatabaseConnection, new: NewStudent) -> Result<student::Model> {
    if new.full_name.trim().is_empty() {
        return Err(Error::Config {
            message: "Student name cannot be empty".to_string(),
        });
    }

    for amount in [
        new.monthly_rent,
        new.electricity,
        new.water,
        new.internet,
        new.other_utilities,
    ] {
        if amount < 0.0 || !amount.is_finite() {
            return Err(Error::InvalidAmount { amount });
        }
    }

    let model = student::ActiveModel {
        account_id: Set(new.account_id),
        full_name: Set(new.full_name.trim().to_string()),
        suite: Set(new.suite),
        room: Set(new.room),
        entry_date: Set(new.entry_date),
        exit_date: Set(None),
        home_address: Set(new.home_address),
        phone: Set(new.phone),
        email: Set(new.email),
        monthly_rent: Set(new.monthly_rent),
        electricity: Set(new.electricity),
        water: Set(new.water),
        internet: Set(new.internet),
        other_utilities: Set(new.other_utilities),
        next_of_kin: Set(new.next_of_kin),
        next_of_kin_contact: Set(new.next_of_kin_contact),
        is_retired: Set(false),
        ..Default::default()
    };

    let result = model.insert(db).await?;
    Ok(result)
}

/// Finds a student by id, returning None if absent.
pub async fn get_student_by_id(
    db: &DatabaseConnection,
    student_id: i64,
) -> Result<Option<student::Model>> {
    Student::find_by_id(student_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds the student record linked to a login account.
pub async fn get_student_by_account(
    db: &DatabaseConnection,
    account_id: i64,
) -> Result<Option<student::Model>> {
    Student::find()
        .filter(student::Column::AccountId.eq(account_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all active (non-retired) students, ordered by name.
pub async fn get_active_students(db: &DatabaseConnection) -> Result<Vec<student::Model>> {
    Student::find()
        .filter(student::Column::IsRetired.eq(false))
        .order_by_asc(student::Column::FullName)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Updates the recurring amounts on a student's billing profile. Takes
/// effect from the next period's charges; already-issued charges are
/// immutable and unaffected.
pub async fn update_billing_profile(
    db: &DatabaseConnection,
    student_id: i64,
    monthly_rent: f64,
    electricity: f64,
    water: f64,
    internet: f64,
    other_utilities: f64,
) -> Result<student::Model> {
    for amount in [monthly_rent, electricity, water, internet, other_utilities] {
        if amount < 0.0 || !amount.is_finite() {
            return Err(Error::InvalidAmount { amount });
        }
    }

    let student = Student::find_by_id(student_id)
        .one(db)
        .await?
        .ok_or(Error::StudentNotFound { id: student_id })?;

    let mut active: student::ActiveModel = student.into();
    active.monthly_rent = Set(monthly_rent);
    active.electricity = Set(electricity);
    active.water = Set(water);
    active.internet = Set(internet);
    active.other_utilities = Set(other_utilities);
    active.update(db).await.map_err(Into::into)
}

/// Soft-retires a student on move-out. The record and its invoices remain;
/// the student just stops accruing new charges.
pub async fn retire_student(
    db: &DatabaseConnection,
    student_id: i64,
    exit_date: NaiveDate,
) -> Result<student::Model> {
    let student = Student::find_by_id(student_id)
        .one(db)
        .await?
        .ok_or(Error::StudentNotFound { id: student_id })?;

    let mut active: student::ActiveModel = student.into();
    active.exit_date = Set(Some(exit_date));
    active.is_retired = Set(true);
    active.update(db).await.map_err(Into::into)
}

/// Computes a student's outstanding balance over their entire history:
/// every charge ever issued minus every payment ever received. Negative
/// results are credit.
pub async fn outstanding_balance(db: &DatabaseConnection, student_id: i64) -> Result<f64> {
    Student::find_by_id(student_id)
        .one(db)
        .await?
        .ok_or(Error::StudentNotFound { id: student_id })?;

    let charges = Charge::find()
        .filter(charge::Column::StudentId.eq(student_id))
        .all(db)
        .await?;
    let payments = Payment::find()
        .filter(payment::Column::StudentId.eq(student_id))
        .all(db)
        .await?;

    ledger::balance(&charges, &payments)
}
