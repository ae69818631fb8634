//! Diagnostic logging to stderr. Stdout is reserved for reports.

use std::io::{self, IsTerminal};
use std::sync::OnceLock;

use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{fmt, EnvFilter};

/// Overrides the verbosity-derived filter when set, e.g. `editguard::fixers=trace`.
pub const LOG_ENV: &str = "EDITGUARD_LOG";

static INSTALLED: OnceLock<()> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {message}")]
    Filter { filter: String, message: String },
    #[error("failed to install log subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "editguard=debug,warn",
        _ => "editguard=trace,info",
    }
}

/// Installs the global subscriber on first call; later calls do nothing.
pub fn init(verbosity: u8) -> Result<(), LoggingError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }

    let filter = std::env::var(LOG_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default_filter(verbosity).to_string());
    let env_filter = EnvFilter::try_new(&filter).map_err(|err| LoggingError::Filter {
        filter: filter.clone(),
        message: err.to_string(),
    })?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    let _ = INSTALLED.set(());
    Ok(())
}
