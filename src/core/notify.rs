//! Notification dispatch - templates, the transport seam, and the
//! at-most-once delivery ledger.
//!
//! The dispatcher decides *that* and *what* to send; *how* the bytes travel
//! is behind the [`Transport`] trait. Before every send it consults the
//! notifications table for the (entity, id, event) triple and skips when a
//! record exists; a record is written only after the transport reports
//! success. Delivery state and billing state are deliberately decoupled: a
//! failed or timed-out send surfaces as an error to the caller, and the
//! invoice or token it was about is left exactly as it was.

use crate::{
    config::settings::Settings,
    entities::{Notification, account, invoice, notification, reset_token, student},
    errors::{Error, Result},
};
use async_trait::async_trait;
use chrono::Utc;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};
use sea_orm::{DatabaseConnection, Set, prelude::*};
use std::time::Duration as StdDuration;
use tracing::debug;

/// Channel-agnostic delivery capability. Email in production; tests plug in
/// a recording double.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short channel name recorded with each delivery (e.g., `"email"`)
    fn channel(&self) -> &'static str;

    /// Delivers one message to one recipient address.
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMTP mailer - the production [`Transport`].
///
/// Relay endpoint comes from configuration; credentials come from the
/// `SMTP_USERNAME` / `SMTP_PASSWORD` environment variables so they never
/// live in a file.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Builds the mailer from the configured relay and environment
    /// credentials.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let username = std::env::var("SMTP_USERNAME")?;
        let password = std::env::var("SMTP_PASSWORD")?;
        let from_address = if settings.smtp.from_address.is_empty() {
            username.clone()
        } else {
            settings.smtp.from_address.clone()
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp.host)
            .map_err(|e| Error::Transport {
                message: e.to_string(),
            })?
            .port(settings.smtp.port)
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Self {
            transport,
            from_address,
        })
    }
}

#[async_trait]
impl Transport for SmtpMailer {
    fn channel(&self) -> &'static str {
        "email"
    }

    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from_address.parse().map_err(|_| Error::Transport {
                message: format!("invalid from address '{}'", self.from_address),
            })?)
            .to(recipient.parse().map_err(|_| Error::Transport {
                message: format!("invalid recipient address '{recipient}'"),
            })?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| Error::Transport {
                message: e.to_string(),
            })?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| Error::Transport {
                message: e.to_string(),
            })
    }
}

/// A notifiable state transition.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// An invoice was created and the student should receive it
    InvoiceCreated {
        /// The new invoice
        invoice: &'a invoice::Model,
        /// The student being billed
        student: &'a student::Model,
    },
    /// An invoice crossed into overdue
    InvoiceOverdue {
        /// The overdue invoice
        invoice: &'a invoice::Model,
        /// The student being reminded
        student: &'a student::Model,
    },
    /// A reset code was issued and must reach the account holder
    ResetIssued {
        /// The account recovering access
        account: &'a account::Model,
        /// The token carrying the code
        token: &'a reset_token::Model,
    },
}

/// Whether a notify call actually used the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Transport succeeded and a record was written
    Sent,
    /// Already delivered earlier, or the event's toggle is off
    Skipped,
}

/// Replaces recognized `{placeholder}` markers in a template.
#[must_use]
pub fn render_template(template: &str, substitutions: &[(&str, &str)]) -> String {
    let mut rendered = template.to_string();
    for (placeholder, value) in substitutions {
        rendered = rendered.replace(placeholder, value);
    }
    rendered
}

/// Composes and delivers notifications, enforcing at-most-once delivery per
/// (entity, event) transition.
pub struct Dispatcher<'a, T: Transport> {
    db: &'a DatabaseConnection,
    transport: &'a T,
    settings: &'a Settings,
}

impl<'a, T: Transport> Dispatcher<'a, T> {
    /// Creates a dispatcher over a store, a transport, and settings.
    pub const fn new(db: &'a DatabaseConnection, transport: &'a T, settings: &'a Settings) -> Self {
        Self {
            db,
            transport,
            settings,
        }
    }

    /// Renders and delivers the message for an event.
    ///
    /// Returns [`Delivery::Skipped`] when the event's toggle is off or a
    /// record shows it was already delivered. On transport success the
    /// delivery is recorded; on failure nothing is recorded and the error
    /// is returned, leaving the notification owed for a later attempt.
    pub async fn notify(&self, event: Event<'_>) -> Result<Delivery> {
        let notify = &self.settings.notify;
        let currency = &self.settings.billing.currency;

        let (enabled, entity, entity_id, event_name, recipient, name, subject, template) =
            match event {
                Event::InvoiceCreated { invoice, student } => (
                    notify.invoice_created,
                    "invoice",
                    invoice.id,
                    "created",
                    &student.email,
                    &student.full_name,
                    &notify.subject_invoice,
                    &notify.template_invoice,
                ),
                Event::InvoiceOverdue { invoice, student } => (
                    notify.invoice_overdue,
                    "invoice",
                    invoice.id,
                    "overdue",
                    &student.email,
                    &student.full_name,
                    &notify.subject_overdue,
                    &notify.template_overdue,
                ),
                Event::ResetIssued { account, token } => (
                    true,
                    "reset",
                    token.id,
                    "issued",
                    &account.email,
                    &account.full_name,
                    &notify.subject_reset,
                    &notify.template_reset,
                ),
            };

        if !enabled {
            return Ok(Delivery::Skipped);
        }

        if self.already_delivered(entity, entity_id, event_name).await? {
            debug!(entity, entity_id, event_name, "notification already delivered");
            return Ok(Delivery::Skipped);
        }

        if recipient.trim().is_empty() {
            return Err(Error::Transport {
                message: format!("no {} address on file for '{name}'", self.transport.channel()),
            });
        }

        let body = match event {
            Event::InvoiceCreated { invoice, .. } | Event::InvoiceOverdue { invoice, .. } => {
                render_template(
                    template,
                    &[
                        ("{name}", name.as_str()),
                        ("{amount}", &format!("{:.2}", invoice.amount)),
                        ("{currency}", currency),
                        ("{due_date}", &invoice.due_date.format("%Y-%m-%d").to_string()),
                        ("{note}", &invoice.note),
                    ],
                )
            }
            Event::ResetIssued { token, .. } => render_template(
                template,
                &[("{name}", name.as_str()), ("{code}", &token.code)],
            ),
        };

        let timeout = StdDuration::from_secs(notify.send_timeout_secs);
        match tokio::time::timeout(timeout, self.transport.send(recipient, subject, &body)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(Error::Transport {
                    message: format!("send timed out after {}s", notify.send_timeout_secs),
                });
            }
        }

        // Record only after the transport succeeded; the record is what
        // makes the next sweep skip this transition
        let record = notification::ActiveModel {
            entity: Set(entity.to_string()),
            entity_id: Set(entity_id),
            event: Set(event_name.to_string()),
            channel: Set(self.transport.channel().to_string()),
            sent_at: Set(Utc::now()),
            ..Default::default()
        };
        record.insert(self.db).await?;

        Ok(Delivery::Sent)
    }

    /// Whether a delivery record exists for this (entity, id, event).
    async fn already_delivered(&self, entity: &str, entity_id: i64, event: &str) -> Result<bool> {
        let count = Notification::find()
            .filter(notification::Column::Entity.eq(entity))
            .filter(notification::Column::EntityId.eq(entity_id))
            .filter(notification::Column::Event.eq(event))
            .count(self.db)
            .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{invoice::create_invoice, reset};
    use crate::test_utils::*;
    use chrono::{Duration, NaiveDate};

    #[test]
    fn test_render_template_replaces_known_placeholders() {
        let rendered = render_template(
            "Hello {name}, {amount} {currency} due {due_date} ({note}).",
            &[
                ("{name}", "Thandi M"),
                ("{amount}", "1200.00"),
                ("{currency}", "ZAR"),
                ("{due_date}", "2024-01-05"),
                ("{note}", "rent"),
            ],
        );
        assert_eq!(
            rendered,
            "Hello Thandi M, 1200.00 ZAR due 2024-01-05 (rent)."
        );
    }

    #[test]
    fn test_render_template_leaves_unknown_markers() {
        let rendered = render_template("Hi {name}, ref {unknown}", &[("{name}", "T")]);
        assert_eq!(rendered, "Hi T, ref {unknown}");
    }

    #[tokio::test]
    async fn test_notify_invoice_created_renders_and_records() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = test_settings();
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(&db, &transport, &settings);

        let student = create_test_student(&db, "Thandi M").await?;
        let invoice = create_invoice(
            &db,
            student.id,
            "2024-01",
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            "rent",
        )
        .await?;

        let delivery = dispatcher
            .notify(Event::InvoiceCreated {
                invoice: &invoice,
                student: &student,
            })
            .await?;
        assert_eq!(delivery, Delivery::Sent);

        let sent = transport.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, student.email);
        assert!(sent[0].body.contains("Thandi M"));
        assert!(sent[0].body.contains("1200.00"));
        assert!(sent[0].body.contains("ZAR"));
        assert!(sent[0].body.contains("2024-01-05"));

        let records = Notification::find().all(&db).await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity, "invoice");
        assert_eq!(records[0].event, "created");
        assert_eq!(records[0].channel, "memory");

        Ok(())
    }

    #[tokio::test]
    async fn test_notify_is_at_most_once_per_transition() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = test_settings();
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(&db, &transport, &settings);

        let student = create_test_student(&db, "Thandi M").await?;
        let invoice = create_invoice(
            &db,
            student.id,
            "2024-01",
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            "rent",
        )
        .await?;
        let event = Event::InvoiceCreated {
            invoice: &invoice,
            student: &student,
        };

        assert_eq!(dispatcher.notify(event).await?, Delivery::Sent);
        assert_eq!(dispatcher.notify(event).await?, Delivery::Skipped);

        assert_eq!(transport.sent_messages().len(), 1);
        assert_eq!(Notification::find().count(&db).await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_notify_toggle_disables_event() -> Result<()> {
        let db = setup_test_db().await?;
        let mut settings = test_settings();
        settings.notify.invoice_created = false;
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(&db, &transport, &settings);

        let student = create_test_student(&db, "Thandi M").await?;
        let invoice = create_invoice(
            &db,
            student.id,
            "2024-01",
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            "rent",
        )
        .await?;

        let delivery = dispatcher
            .notify(Event::InvoiceCreated {
                invoice: &invoice,
                student: &student,
            })
            .await?;

        assert_eq!(delivery, Delivery::Skipped);
        assert!(transport.sent_messages().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_no_record() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = test_settings();
        let transport = MemoryTransport::new();
        transport.set_failing(true);
        let dispatcher = Dispatcher::new(&db, &transport, &settings);

        let student = create_test_student(&db, "Thandi M").await?;
        let invoice = create_invoice(
            &db,
            student.id,
            "2024-01",
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            "rent",
        )
        .await?;
        let event = Event::InvoiceOverdue {
            invoice: &invoice,
            student: &student,
        };

        let result = dispatcher.notify(event).await;
        assert!(matches!(result.unwrap_err(), Error::Transport { .. }));
        assert_eq!(Notification::find().count(&db).await?, 0);

        // Once the transport recovers, the notification is still owed
        transport.set_failing(false);
        assert_eq!(dispatcher.notify(event).await?, Delivery::Sent);

        Ok(())
    }

    #[tokio::test]
    async fn test_notify_reset_issued_carries_code() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = test_settings();
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(&db, &transport, &settings);

        let account = create_test_account(&db, "thandi@example.com").await?;
        let token = reset::issue(&db, account.id, Duration::minutes(20)).await?;

        let delivery = dispatcher
            .notify(Event::ResetIssued {
                account: &account,
                token: &token,
            })
            .await?;
        assert_eq!(delivery, Delivery::Sent);

        let sent = transport.sent_messages();
        assert!(sent[0].body.contains(&token.code));
        assert_eq!(sent[0].recipient, "thandi@example.com");

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_recipient_is_a_transport_error() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = test_settings();
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(&db, &transport, &settings);

        let mut new = new_test_student("No Email");
        new.email = String::new();
        let student = crate::core::student::create_student(&db, new).await?;
        let invoice = create_invoice(
            &db,
            student.id,
            "2024-01",
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            "rent",
        )
        .await?;

        let result = dispatcher
            .notify(Event::InvoiceCreated {
                invoice: &invoice,
                student: &student,
            })
            .await;
        assert!(matches!(result.unwrap_err(), Error::Transport { .. }));

        Ok(())
    }
}
