//! Process-wide logging setup.
//!
//! Library code logs through the `log` macros. [`init_logging`] routes
//! those records into a `tracing` subscriber so they share one filter and
//! one output format with the spans emitted around cluster calls.

use tracing_log::LogTracer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

use crate::config::LoggingSettings;
use crate::error::ConfigError;

/// Builds the filter: `RUST_LOG` when set and valid, else the configured level.
pub fn build_filter(settings: &LoggingSettings) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(settings.level.to_ascii_lowercase())
        .map_err(|e| ConfigError::Logging(format!("invalid log level '{}': {}", settings.level, e)))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), ConfigError> {
    let filter = build_filter(settings)?;

    LogTracer::init().map_err(|e| ConfigError::Logging(e.to_string()))?;

    let json = settings.json;
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_current_span(true)))
        .with((!json).then(|| fmt::layer().with_target(true)));

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    log::debug!(
        "Logging initialized (level: {}, json: {})",
        settings.level,
        settings.json
    );
    Ok(())
}
