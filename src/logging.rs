//! Structured logging with tracing

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Error initializing the tracing subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter directive: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Failed to install tracing subscriber: {0}")]
    Install(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize the global tracing subscriber from the logging configuration.
///
/// The `RUST_LOG` environment variable takes precedence over the configured
/// level, matching the usual EnvFilter conventions.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    match config.format.as_str() {
        "json" => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .json()
                .with_current_span(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        _ => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}
