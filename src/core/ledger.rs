//! Ledger arithmetic - pure balance computation over charges and payments.
//!
//! No database access and no state: callers load the rows, this module sums
//! them. An overpayment yields a negative balance, which is carried as credit
//! rather than clamped; the only clamp in the system happens at invoice
//! creation, where the stored amount must be non-negative.

use crate::{
    entities::{charge, payment, student},
    errors::{Error, Result},
};

/// Computes the outstanding balance: sum of charges minus sum of payments.
///
/// Rejects any negative or non-finite amount before summing, so an invalid
/// row can never silently skew a balance. The result is order-independent
/// and may be negative (credit).
pub fn balance(charges: &[charge::Model], payments: &[payment::Model]) -> Result<f64> {
    let charged = sum_validated(charges.iter().map(|c| c.amount))?;
    let paid = sum_validated(payments.iter().map(|p| p.amount))?;
    Ok(charged - paid)
}

/// Sums amounts, rejecting negative or non-finite entries.
fn sum_validated<I: Iterator<Item = f64>>(amounts: I) -> Result<f64> {
    let mut total = 0.0;
    for amount in amounts {
        if amount < 0.0 || !amount.is_finite() {
            return Err(Error::InvalidAmount { amount });
        }
        total += amount;
    }
    Ok(total)
}

/// Materializes a student's billing profile into charge line items for one
/// period: the monthly rent plus each non-zero recurring utility.
#[must_use]
pub fn monthly_charge_lines(student: &student::Model) -> Vec<(&'static str, f64)> {
    let mut lines = Vec::new();
    if student.monthly_rent > 0.0 {
        lines.push(("rent", student.monthly_rent));
    }
    for (label, amount) in [
        ("electricity", student.electricity),
        ("water", student.water),
        ("internet", student.internet),
        ("other", student.other_utilities),
    ] {
        if amount > 0.0 {
            lines.push((label, amount));
        }
    }
    lines
}
