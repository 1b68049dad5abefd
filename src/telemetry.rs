//! Tracing subscriber setup for EYWA MVC services.

use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingSettings;
use crate::{AppError, Result};

/// Install the global subscriber from the logging settings.
///
/// `RUST_LOG` wins over the configured level when it is set.
pub fn init_tracing(settings: &LoggingSettings) -> Result<()> {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| settings.level.clone());
    init_tracing_with_config(&level, settings.json)
}

/// Install the global subscriber with an explicit filter and output format.
///
/// Fails if the filter does not parse or a subscriber is already installed.
pub fn init_tracing_with_config(level: &str, json_format: bool) -> Result<()> {
    let env_filter = EnvFilter::try_new(level)
        .map_err(|e| AppError::ConfigError(format!("Invalid log level {level}: {e}")))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let installed = if json_format {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer.json().with_current_span(true).with_span_list(false))
            .try_init()
    } else {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .try_init()
    };
    installed.map_err(|e| AppError::ConfigError(e.to_string()))?;

    tracing::info!(level, json = json_format, "Logging initialized");
    Ok(())
}

/// Span wrapping one dispatched controller action.
pub fn create_action_span(method: &str, path: &str, action: &str) -> tracing::Span {
    tracing::info_span!(
        "action",
        http.method = method,
        http.path = path,
        action = action,
        http.status_code = tracing::field::Empty,
    )
}
