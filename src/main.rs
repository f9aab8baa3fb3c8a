//! Sweep worker - the scheduled entry point.
//!
//! Run by cron (or by hand): marks overdue invoices and delivers whatever
//! invoice and reset notifications are still owed, then logs a summary.
//! Safe to re-run at any time; idempotency is enforced by the state machine
//! and the delivery ledger, not by the schedule.

use chrono::Utc;
use dotenvy::dotenv;
use lodgebook::{
    config,
    core::{
        notify::{Dispatcher, SmtpMailer},
        sweep,
    },
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Env vars may also be set externally; a missing .env is not an error
    dotenv().ok();

    let settings = config::settings::load_or_default()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;

    let db = config::database::create_connection()
        .await
        .inspect(|_| info!("Database connection established."))
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    config::database::create_tables(&db).await?;

    let mailer = SmtpMailer::from_settings(&settings)
        .inspect_err(|e| error!("Failed to configure mailer: {e}"))?;
    let dispatcher = Dispatcher::new(&db, &mailer, &settings);

    let today = Utc::now().date_naive();
    let summary = sweep::run_sweep(&db, &dispatcher, today).await?;
    info!("{}", sweep::format_sweep_summary(&summary));

    Ok(())
}
