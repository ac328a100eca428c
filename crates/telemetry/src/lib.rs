//! Tracing subscriber bootstrap.

use std::io;

use bookserver_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,tower_http=info";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `telemetry.filter`, which wins over the built-in
/// default. Logs go to stdout so container runtimes pick them up.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;

    let installed = match settings.log_format {
        LogFormat::Pretty => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .with_writer(io::stdout)
            .try_init(),
        LogFormat::Json => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_writer(io::stdout)
            .try_init(),
    };

    // A subscriber installed earlier (tests, embedding) is left in place.
    if installed.is_err() {
        tracing::debug!(target: "bookserver-telemetry", "global subscriber already set");
    }

    Ok(())
}

fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directives = settings.filter.as_deref().unwrap_or(DEFAULT_FILTER);
    EnvFilter::try_new(directives)
        .map_err(|e| anyhow::anyhow!("invalid telemetry filter '{}': {}", directives, e))
}
