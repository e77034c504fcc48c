//! Waitlist Mailer
//!
//! One-shot campaign runner for the waitlist domain.
//!
//! ## Flow
//!
//! ```text
//! env (SMTP_*, WAITLIST_*, MONGODB_* / DATABASE_*)
//!   ↓
//! WaitlistService::initialize  (transport check, store connect, hydrate)
//!   ↓ optional --add enrolment
//! send_bulk_template  (one email per member, bounded concurrency)
//!   ↓
//! aggregate logged, service closed
//! ```
//!
//! Ctrl+C or SIGTERM abandons the campaign; the service is still closed.

use clap::Parser;
use core_config::{ConfigError, Environment, FromEnv, env_or_default, env_parse, env_required};
use domain_waitlist::{RetryPolicy, WaitlistConfig, WaitlistEvent, WaitlistService};
use eyre::{Result, WrapErr};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::signal;
use tracing::{debug, info, warn};

pub const DEFAULT_SUBJECT: &str = "News from the waitlist";

/// Command-line options
#[derive(Parser, Debug, Default)]
#[command(name = "zerg_waitlist_mailer")]
#[command(about = "Send a templated email to everyone on the waitlist")]
pub struct Cli {
    /// Addresses to enroll before the campaign runs
    #[arg(short, long = "add", value_delimiter = ',')]
    pub add: Vec<String>,

    /// Rewrite the store from the in-memory list after enrolling
    #[arg(long)]
    pub save: bool,

    /// Extra template placeholders as KEY=VALUE (repeatable)
    #[arg(short = 'r', long = "replace", value_parser = parse_replacement)]
    pub replacements: Vec<(String, String)>,
}

fn parse_replacement(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Campaign settings read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailerSettings {
    pub template_path: PathBuf,
    pub subject: String,
    pub retry: RetryPolicy,
}

impl FromEnv for MailerSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let template_path = PathBuf::from(env_required("WAITLIST_TEMPLATE_PATH")?);
        let subject = env_or_default("WAITLIST_SUBJECT", DEFAULT_SUBJECT);
        let max_retries: u32 = env_parse("WAITLIST_MAX_RETRIES", "3")?;
        let delay_ms: u64 = env_parse("WAITLIST_RETRY_DELAY_MS", "1000")?;

        Ok(Self {
            template_path,
            subject,
            retry: RetryPolicy::from_millis(max_retries, delay_ms),
        })
    }
}

/// Forward bus events to the log
fn log_event(event: &WaitlistEvent) {
    let payload = serde_json::to_string(event).unwrap_or_default();
    match event {
        WaitlistEvent::OperationFailed(_)
        | WaitlistEvent::TransportFailed(_)
        | WaitlistEvent::BackendFailed(_)
        | WaitlistEvent::ValidationRejected { .. } => {
            warn!(event = event.name(), %payload, "Waitlist event");
        }
        WaitlistEvent::MessageSent(_) | WaitlistEvent::MessageRetried { .. } => {
            debug!(event = event.name(), %payload, "Waitlist event");
        }
        _ => info!(event = event.name(), %payload, "Waitlist event"),
    }
}

/// Run the mailer
///
/// # Errors
///
/// Returns an error if the configuration is incomplete, initialization
/// fails or the waitlist cannot be closed cleanly.
pub async fn run(cli: Cli) -> Result<()> {
    // Initialize tracing (env-aware: JSON for prod, pretty for dev)
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        "Starting waitlist mailer"
    );
    info!("Environment: {:?}", environment);

    let settings = MailerSettings::from_env().wrap_err("Failed to load mailer settings")?;
    let config = WaitlistConfig::from_env().wrap_err("Failed to load waitlist configuration")?;
    let service = WaitlistService::new(config).wrap_err("Failed to build the waitlist service")?;
    service.subscribe(log_event);

    let outcome = tokio::select! {
        result = campaign(&service, &cli, &settings) => result,
        result = shutdown_signal() => {
            warn!("Campaign abandoned before completion");
            result
        }
    };

    service
        .close()
        .await
        .wrap_err("Failed to close the waitlist service")?;

    info!("Waitlist mailer stopped");
    outcome
}

async fn campaign(service: &WaitlistService, cli: &Cli, settings: &MailerSettings) -> Result<()> {
    service
        .initialize()
        .await
        .wrap_err("Failed to initialize the waitlist")?;
    info!(store = %service.store_kind(), "Waitlist ready");

    for address in &cli.add {
        let added = service
            .add_email(address)
            .await
            .wrap_err_with(|| format!("Failed to enroll {}", address))?;
        debug!(%address, added, "Enrollment processed");
    }
    if cli.save {
        let saved = service.save_waitlist().await?;
        info!(saved, "Store rewritten from the in-memory list");
    }

    let replacements: HashMap<String, String> = cli.replacements.iter().cloned().collect();
    let total = service.get_waitlist()?.len();
    info!(
        total,
        template = %settings.template_path.display(),
        max_retries = settings.retry.max_retries,
        "Sending campaign"
    );

    let sent = service
        .send_bulk_template(
            |_| settings.subject.clone(),
            &settings.template_path,
            &replacements,
            settings.retry,
        )
        .await
        .wrap_err("Bulk send failed")?;

    if sent < total {
        warn!(sent, total, "Campaign finished with failures");
    } else {
        info!(sent, total, "Campaign finished");
    }
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .wrap_err("Failed to install SIGTERM handler")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.wrap_err("Failed to install Ctrl+C handler")?;
                info!("Received Ctrl+C, initiating shutdown...");
            },
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown...");
            },
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .wrap_err("Failed to install Ctrl+C handler")?;
        info!("Received Ctrl+C, initiating shutdown...");
    }

    Ok(())
}
