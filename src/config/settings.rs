//! Runtime settings loaded from config.toml.
//!
//! Covers the billing defaults (currency, standard rent/utilities), the
//! notification templates and toggles, the reset-token time-to-live, and the
//! SMTP endpoint. Every section has working defaults so a missing file or a
//! partial file still yields a usable configuration. SMTP credentials are
//! never stored in the file; they come from `SMTP_USERNAME` / `SMTP_PASSWORD`
//! environment variables at mailer construction time.

use crate::errors::{Error, Result};
use chrono::Duration;
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration structure representing config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Billing defaults
    pub billing: BillingConfig,
    /// Notification templates and toggles
    pub notify: NotifyConfig,
    /// Reset-token issuance settings
    pub reset: ResetConfig,
    /// SMTP endpoint for the production mailer
    pub smtp: SmtpConfig,
}

/// Billing defaults applied when a student record leaves them unset
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// ISO currency code rendered into messages
    pub currency: String,
    /// Default monthly rent for new students
    pub default_rent: f64,
    /// Default combined utilities for new students
    pub default_utilities: f64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            currency: "ZAR".to_string(),
            default_rent: 0.0,
            default_utilities: 0.0,
        }
    }
}

/// Notification templates and per-event toggles
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Send a notice when an invoice is created
    pub invoice_created: bool,
    /// Send a reminder when an invoice becomes overdue
    pub invoice_overdue: bool,
    /// Upper bound on a single transport send, in seconds
    pub send_timeout_secs: u64,
    /// Subject line for invoice-created notices
    pub subject_invoice: String,
    /// Subject line for overdue reminders
    pub subject_overdue: String,
    /// Subject line for reset-code messages
    pub subject_reset: String,
    /// Body template for invoice-created notices
    pub template_invoice: String,
    /// Body template for overdue reminders
    pub template_overdue: String,
    /// Body template for reset-code messages
    pub template_reset: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            invoice_created: true,
            invoice_overdue: true,
            send_timeout_secs: 30,
            subject_invoice: "Your invoice".to_string(),
            subject_overdue: "Overdue: invoice".to_string(),
            subject_reset: "Your reset code".to_string(),
            template_invoice:
                "Hello {name}, your invoice ({note}) is {amount} {currency}, due {due_date}."
                    .to_string(),
            template_overdue:
                "Hi {name}, your invoice ({note}) is overdue: {amount} {currency}. Please pay."
                    .to_string(),
            template_reset: "Your reset code: {code}\nExpires in 20 minutes.".to_string(),
        }
    }
}

/// Reset-token issuance settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    /// Minutes a reset code stays valid
    pub ttl_minutes: i64,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self { ttl_minutes: 20 }
    }
}

impl ResetConfig {
    /// The configured time-to-live as a [`Duration`]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::minutes(self.ttl_minutes)
    }
}

/// SMTP endpoint for the production mailer
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// Relay hostname
    pub host: String,
    /// Relay port (STARTTLS)
    pub port: u16,
    /// From address; falls back to the SMTP username when empty
    pub from_address: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            from_address: String::new(),
        }
    }
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML fails to parse.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from ./config.toml, falling back to defaults when the
/// file does not exist.
pub fn load_or_default() -> Result<Settings> {
    if Path::new("config.toml").exists() {
        load_settings("config.toml")
    } else {
        Ok(Settings::default())
    }
}
