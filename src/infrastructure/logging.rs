//! Process-wide tracing subscriber for the operator binary

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer, Registry,
};

use crate::config::{LogFormat, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Filter from `RUST_LOG`, falling back to the configured level
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Output layer on stderr, so stdout carries only command JSON
fn build_layer(format: &LogFormat) -> BoxedLayer {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE);

    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Pretty => layer.pretty().with_target(true).boxed(),
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber has already been installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(build_layer(&config.format))
        .with(build_filter(&config.level))
        .try_init()?;

    tracing::debug!(level = %config.level, "Logging initialized");
    Ok(())
}
