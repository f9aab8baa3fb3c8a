//! Invoice lifecycle - creation, payments, and the overdue state machine.
//!
//! An invoice moves `unpaid -> overdue -> paid`, forward only, with one
//! exception: a covering payment moves it to `paid` from either earlier
//! state. Every transition is a single-row conditional update guarded on the
//! expected current status, so two concurrent sweeps (or a sweep racing a
//! payment) cannot revert a status or apply a transition twice. All call
//! sites go through this module; nothing else writes the status column.

use crate::{
    core::ledger,
    entities::{Charge, Invoice, Payment, Student, charge, invoice, payment},
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::warn;

/// Lifecycle status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    /// Due date today or in the future, not yet covered by payments
    Unpaid,
    /// Due date passed without sufficient payment
    Overdue,
    /// Payments met or exceeded the amount; terminal
    Paid,
}

impl InvoiceStatus {
    /// The string stored in the status column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Overdue => "overdue",
            Self::Paid => "paid",
        }
    }

    /// Parses a stored status string.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unpaid" => Some(Self::Unpaid),
            "overdue" => Some(Self::Overdue),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

/// Formats the billing period a date falls in, `YYYY-MM`.
#[must_use]
pub fn period_for(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// First day of the period and first day of the following period.
fn period_bounds(period: &str) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::parse_from_str(&format!("{period}-01"), "%Y-%m-%d").map_err(|_| {
        Error::Config {
            message: format!("Invalid billing period '{period}', expected YYYY-MM"),
        }
    })?;
    let end = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    // Both arms construct day 1, which exists in every month
    Ok((start, end.unwrap_or(start)))
}

/// Creates the invoice for a student's billing period.
///
/// Charges for the period are loaded from the store; if none have been
/// issued yet, the student's billing profile (rent plus non-zero utilities)
/// is materialized into charge rows first. Unapplied payments dated within
/// the period reduce the amount, and the stored amount never goes below
/// zero. Fails with `DuplicateInvoice` if an invoice already exists for
/// (student, period) - the check and the insert share one database
/// transaction, so concurrent callers cannot both succeed.
pub async fn create_invoice(
    db: &DatabaseConnection,
    student_id: i64,
    period: &str,
    due_date: NaiveDate,
    note: &str,
) -> Result<invoice::Model> {
    let (period_start, period_end) = period_bounds(period)?;

    let txn = db.begin().await?;

    let student = Student::find_by_id(student_id)
        .one(&txn)
        .await?
        .ok_or(Error::StudentNotFound { id: student_id })?;

    let existing = Invoice::find()
        .filter(invoice::Column::StudentId.eq(student_id))
        .filter(invoice::Column::Period.eq(period))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(Error::DuplicateInvoice {
            student_id,
            period: period.to_string(),
        });
    }

    let mut charges = Charge::find()
        .filter(charge::Column::StudentId.eq(student_id))
        .filter(charge::Column::Period.eq(period))
        .all(&txn)
        .await?;

    if charges.is_empty() {
        for (label, amount) in ledger::monthly_charge_lines(&student) {
            let row = charge::ActiveModel {
                student_id: Set(student_id),
                label: Set(label.to_string()),
                amount: Set(amount),
                period: Set(period.to_string()),
                issued_on: Set(period_start),
                ..Default::default()
            };
            charges.push(row.insert(&txn).await?);
        }
    }

    let payments = Payment::find()
        .filter(payment::Column::StudentId.eq(student_id))
        .filter(payment::Column::InvoiceId.is_null())
        .filter(payment::Column::PaidOn.gte(period_start))
        .filter(payment::Column::PaidOn.lt(period_end))
        .all(&txn)
        .await?;

    let amount = ledger::balance(&charges, &payments)?.max(0.0);

    let model = invoice::ActiveModel {
        student_id: Set(student_id),
        period: Set(period.to_string()),
        amount: Set(amount),
        due_date: Set(due_date),
        status: Set(InvoiceStatus::Unpaid.as_str().to_string()),
        note: Set(note.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let created = model.insert(&txn).await?;

    txn.commit().await?;
    Ok(created)
}

/// Finds an invoice by id, returning None if absent.
pub async fn get_invoice_by_id(
    db: &DatabaseConnection,
    invoice_id: i64,
) -> Result<Option<invoice::Model>> {
    Invoice::find_by_id(invoice_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all invoices currently in the given status, oldest due first.
pub async fn get_invoices_by_status(
    db: &DatabaseConnection,
    status: InvoiceStatus,
) -> Result<Vec<invoice::Model>> {
    Invoice::find()
        .filter(invoice::Column::Status.eq(status.as_str()))
        .order_by_asc(invoice::Column::DueDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sum of all payments applied to an invoice so far.
pub async fn paid_to_date<C>(db: &C, invoice_id: i64) -> Result<f64>
where
    C: ConnectionTrait,
{
    let payments = Payment::find()
        .filter(payment::Column::InvoiceId.eq(invoice_id))
        .all(db)
        .await?;
    let mut total = 0.0;
    for p in &payments {
        total += p.amount;
    }
    Ok(total)
}

/// Records a payment against an invoice and settles it when covered.
///
/// The payment is appended to the running paid-to-date total; multiple
/// partial payments accumulate. When the total meets or exceeds the invoice
/// amount, the status moves to `paid` from either `unpaid` or `overdue`
/// through a guarded update. A partial payment on an overdue invoice leaves
/// it overdue. Payment rows are immutable once written.
pub async fn record_payment(
    db: &DatabaseConnection,
    invoice_id: i64,
    amount: f64,
    paid_on: NaiveDate,
    reference: Option<String>,
) -> Result<invoice::Model> {
    if amount <= 0.0 || !amount.is_finite() {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;

    let invoice = Invoice::find_by_id(invoice_id)
        .one(&txn)
        .await?
        .ok_or(Error::InvoiceNotFound { id: invoice_id })?;

    let row = payment::ActiveModel {
        student_id: Set(invoice.student_id),
        invoice_id: Set(Some(invoice_id)),
        amount: Set(amount),
        paid_on: Set(paid_on),
        reference: Set(reference),
        ..Default::default()
    };
    row.insert(&txn).await?;

    let covered = paid_to_date(&txn, invoice_id).await? >= invoice.amount;
    if covered {
        // Guarded on the current status so a settled invoice is never
        // rewritten and the paid state stays terminal
        Invoice::update_many()
            .col_expr(
                invoice::Column::Status,
                Expr::value(InvoiceStatus::Paid.as_str()),
            )
            .filter(invoice::Column::Id.eq(invoice_id))
            .filter(invoice::Column::Status.is_in([
                InvoiceStatus::Unpaid.as_str(),
                InvoiceStatus::Overdue.as_str(),
            ]))
            .exec(&txn)
            .await?;
    }

    let updated = Invoice::find_by_id(invoice_id)
        .one(&txn)
        .await?
        .ok_or(Error::InvoiceNotFound { id: invoice_id })?;

    txn.commit().await?;
    Ok(updated)
}

/// Conditionally moves one invoice from `unpaid` to `overdue`.
///
/// Returns `StoreConflict` when the guarded update matched no row, meaning a
/// concurrent writer got there first (another sweep, or a payment that
/// settled the invoice).
async fn mark_overdue(db: &DatabaseConnection, invoice_id: i64) -> Result<()> {
    let result = Invoice::update_many()
        .col_expr(
            invoice::Column::Status,
            Expr::value(InvoiceStatus::Overdue.as_str()),
        )
        .filter(invoice::Column::Id.eq(invoice_id))
        .filter(invoice::Column::Status.eq(InvoiceStatus::Unpaid.as_str()))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::StoreConflict {
            entity: "invoice",
            id: invoice_id,
        });
    }
    Ok(())
}

/// Reclassifies every unpaid invoice whose due date lies strictly before
/// `as_of` as overdue, and returns the invoices that changed state.
///
/// Each transition is an independent compare-and-swap: a lost race is
/// re-read once with fresh data and retried if the invoice still qualifies,
/// otherwise skipped for this run. Re-running with the same `as_of`
/// produces no further transitions.
pub async fn sweep_overdue(
    db: &DatabaseConnection,
    as_of: NaiveDate,
) -> Result<Vec<invoice::Model>> {
    let candidates = Invoice::find()
        .filter(invoice::Column::Status.eq(InvoiceStatus::Unpaid.as_str()))
        .filter(invoice::Column::DueDate.lt(as_of))
        .all(db)
        .await?;

    let mut changed = Vec::new();
    for candidate in candidates {
        match mark_overdue(db, candidate.id).await {
            Ok(()) => {}
            Err(Error::StoreConflict { .. }) => {
                // Lost the race; re-read and retry once if still eligible
                let fresh = Invoice::find_by_id(candidate.id).one(db).await?;
                let still_unpaid = fresh
                    .as_ref()
                    .is_some_and(|f| f.status == InvoiceStatus::Unpaid.as_str());
                if !still_unpaid {
                    continue;
                }
                if let Err(e) = mark_overdue(db, candidate.id).await {
                    warn!(invoice_id = candidate.id, error = %e,
                        "skipping contested invoice until next sweep");
                    continue;
                }
            }
            Err(e) => return Err(e),
        }

        if let Some(updated) = Invoice::find_by_id(candidate.id).one(db).await? {
            changed.push(updated);
        }
    }

    Ok(changed)
}
