//! Overdue sweep - the periodic batch pass over the invoice book.
//!
//! One run reclassifies every unpaid invoice whose due date has passed,
//! then walks the book and delivers whatever notifications are still owed:
//! overdue reminders for overdue invoices, creation notices for unpaid ones
//! that never got theirs (including sends that failed on earlier runs).
//! Idempotency lives in the state machine and the delivery ledger, not
//! here, so an at-least-once scheduler - or an operator running the worker
//! by hand - can invoke this as often as they like. One invoice's failure
//! never stops the rest of the run.

use crate::{
    core::{
        invoice::{self, InvoiceStatus},
        notify::{Delivery, Dispatcher, Event, Transport},
        student,
    },
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use tracing::warn;

/// Outcome of one sweep run.
#[derive(Debug, Clone)]
pub struct SweepSummary {
    /// The date the sweep evaluated due dates against
    pub as_of: NaiveDate,
    /// Invoices moved from unpaid to overdue this run
    pub transitioned: usize,
    /// Overdue reminders delivered this run
    pub overdue_sent: usize,
    /// Creation notices delivered this run
    pub created_sent: usize,
    /// Notifications skipped because they were already delivered or toggled off
    pub skipped: usize,
    /// Notifications that failed delivery and remain owed
    pub failed: usize,
}

/// Runs one sweep: reclassify, then deliver owed notifications.
pub async fn run_sweep<T: Transport>(
    db: &DatabaseConnection,
    dispatcher: &Dispatcher<'_, T>,
    as_of: NaiveDate,
) -> Result<SweepSummary> {
    let mut summary = SweepSummary {
        as_of,
        transitioned: 0,
        overdue_sent: 0,
        created_sent: 0,
        skipped: 0,
        failed: 0,
    };

    summary.transitioned = invoice::sweep_overdue(db, as_of).await?.len();

    // Walk the whole overdue set rather than just this run's transitions,
    // so reminders that failed to deliver earlier are retried
    for inv in invoice::get_invoices_by_status(db, InvoiceStatus::Overdue).await? {
        let Some(resident) = student::get_student_by_id(db, inv.student_id).await? else {
            warn!(invoice_id = inv.id, student_id = inv.student_id,
                "invoice references a missing student; skipping reminder");
            summary.failed += 1;
            continue;
        };

        match dispatcher
            .notify(Event::InvoiceOverdue {
                invoice: &inv,
                student: &resident,
            })
            .await
        {
            Ok(Delivery::Sent) => summary.overdue_sent += 1,
            Ok(Delivery::Skipped) => summary.skipped += 1,
            Err(e) => {
                warn!(invoice_id = inv.id, error = %e, "overdue reminder failed");
                summary.failed += 1;
            }
        }
    }

    // Creation notices owed to invoices still sitting unpaid
    for inv in invoice::get_invoices_by_status(db, InvoiceStatus::Unpaid).await? {
        let Some(resident) = student::get_student_by_id(db, inv.student_id).await? else {
            warn!(invoice_id = inv.id, student_id = inv.student_id,
                "invoice references a missing student; skipping notice");
            summary.failed += 1;
            continue;
        };

        match dispatcher
            .notify(Event::InvoiceCreated {
                invoice: &inv,
                student: &resident,
            })
            .await
        {
            Ok(Delivery::Sent) => summary.created_sent += 1,
            Ok(Delivery::Skipped) => summary.skipped += 1,
            Err(e) => {
                warn!(invoice_id = inv.id, error = %e, "invoice notice failed");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

/// Formats a sweep summary into a one-look log block for the worker.
#[must_use]
pub fn format_sweep_summary(summary: &SweepSummary) -> String {
    format!(
        "Sweep {} - {} newly overdue\n  \
         Reminders sent: {} overdue, {} created | Skipped: {} | Failed: {}",
        summary.as_of.format("%Y-%m-%d"),
        summary.transitioned,
        summary.overdue_sent,
        summary.created_sent,
        summary.skipped,
        summary.failed,
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::invoice::{create_invoice, record_payment};
    use crate::entities::Notification;
    use crate::test_utils::*;
    use sea_orm::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_sweep_transitions_and_notifies_exactly_once() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = test_settings();
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(&db, &transport, &settings);

        // Rent 1000 + utilities 200, due 2024-01-05
        let resident = create_test_student(&db, "Thandi M").await?;
        create_invoice(&db, resident.id, "2024-01", date(2024, 1, 5), "rent").await?;

        let summary = run_sweep(&db, &dispatcher, date(2024, 1, 6)).await?;
        assert_eq!(summary.transitioned, 1);
        assert_eq!(summary.overdue_sent, 1);
        assert_eq!(summary.failed, 0);

        // Exactly one overdue record exists
        let overdue_records = Notification::find()
            .filter(crate::entities::notification::Column::Event.eq("overdue"))
            .count(&db)
            .await?;
        assert_eq!(overdue_records, 1);

        // Second run with the same date: no transitions, no new sends
        let again = run_sweep(&db, &dispatcher, date(2024, 1, 6)).await?;
        assert_eq!(again.transitioned, 0);
        assert_eq!(again.overdue_sent, 0);
        assert!(again.skipped >= 1);

        let overdue_records = Notification::find()
            .filter(crate::entities::notification::Column::Event.eq("overdue"))
            .count(&db)
            .await?;
        assert_eq!(overdue_records, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_sends_creation_notices_for_unpaid() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = test_settings();
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(&db, &transport, &settings);

        let resident = create_test_student(&db, "Thandi M").await?;
        create_invoice(&db, resident.id, "2024-01", date(2024, 1, 25), "rent").await?;

        // Invoice not yet due: creation notice goes out, nothing is overdue
        let summary = run_sweep(&db, &dispatcher, date(2024, 1, 10)).await?;
        assert_eq!(summary.transitioned, 0);
        assert_eq!(summary.created_sent, 1);
        assert_eq!(summary.overdue_sent, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_leaves_paid_invoices_alone() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = test_settings();
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(&db, &transport, &settings);

        let resident = create_test_student(&db, "Thandi M").await?;
        let inv = create_invoice(&db, resident.id, "2024-01", date(2024, 1, 5), "rent").await?;
        record_payment(&db, inv.id, 1200.0, date(2024, 1, 3), None).await?;

        let summary = run_sweep(&db, &dispatcher, date(2024, 2, 1)).await?;
        assert_eq!(summary.transitioned, 0);
        assert_eq!(summary.overdue_sent, 0);
        assert_eq!(summary.created_sent, 0);

        let stored = crate::core::invoice::get_invoice_by_id(&db, inv.id)
            .await?
            .unwrap();
        assert_eq!(stored.status, "paid");

        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_survives_transport_failure_and_retries_later() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = test_settings();
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(&db, &transport, &settings);

        let first = create_test_student(&db, "Thandi M").await?;
        let second = create_test_student(&db, "Sipho K").await?;
        create_invoice(&db, first.id, "2024-01", date(2024, 1, 5), "rent").await?;
        create_invoice(&db, second.id, "2024-01", date(2024, 1, 5), "rent").await?;

        transport.set_failing(true);
        let summary = run_sweep(&db, &dispatcher, date(2024, 1, 6)).await?;

        // State transitions committed even though every send failed
        assert_eq!(summary.transitioned, 2);
        assert_eq!(summary.overdue_sent, 0);
        assert_eq!(summary.failed, 2);
        assert_eq!(Notification::find().count(&db).await?, 0);

        // Next run, healthy transport: the owed reminders go out, once
        transport.set_failing(false);
        let retry = run_sweep(&db, &dispatcher, date(2024, 1, 6)).await?;
        assert_eq!(retry.transitioned, 0);
        assert_eq!(retry.overdue_sent, 2);
        assert_eq!(retry.failed, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_counts_mixed_outcomes_per_invoice() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = test_settings();
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(&db, &transport, &settings);

        let billed = create_test_student(&db, "Thandi M").await?;
        let mut unreachable = new_test_student("No Email");
        unreachable.email = String::new();
        let unreachable = crate::core::student::create_student(&db, unreachable).await?;

        create_invoice(&db, billed.id, "2024-01", date(2024, 1, 5), "rent").await?;
        create_invoice(&db, unreachable.id, "2024-01", date(2024, 1, 5), "rent").await?;

        let summary = run_sweep(&db, &dispatcher, date(2024, 1, 6)).await?;

        // The unreachable student fails; the other still gets their reminder
        assert_eq!(summary.transitioned, 2);
        assert_eq!(summary.overdue_sent, 1);
        assert_eq!(summary.failed, 1);

        Ok(())
    }

    #[test]
    fn test_format_sweep_summary() {
        let summary = SweepSummary {
            as_of: date(2024, 1, 6),
            transitioned: 3,
            overdue_sent: 2,
            created_sent: 1,
            skipped: 4,
            failed: 1,
        };

        let text = format_sweep_summary(&summary);
        assert!(text.contains("2024-01-06"));
        assert!(text.contains("3 newly overdue"));
        assert!(text.contains("2 overdue"));
        assert!(text.contains("Failed: 1"));
    }
}
