//! Tracing subscriber initialisation.

use crate::config::{LogFormat, LoggingConfig};
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured level is not a tracing level.
    #[error("invalid log level {0:?}")]
    InvalidLevel(String),

    /// Another global subscriber is already installed.
    #[error("tracing subscriber already installed")]
    AlreadyInstalled(#[source] TryInitError),
}

/// Installs the global subscriber described by `config`.
///
/// `RUST_LOG` directives take precedence over the configured level.
/// Events go to standard error.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidLevel`] for an unknown level and
/// [`TelemetryError::AlreadyInstalled`] when called twice.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let level = Level::from_str(config.level.trim())
        .map_err(|_| TelemetryError::InvalidLevel(config.level.clone()))?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(TelemetryError::AlreadyInstalled)
}
