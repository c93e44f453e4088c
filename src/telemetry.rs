//! Tracing setup: stdout (pretty or JSON) plus an optional daily rolling file.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::{LogConfig, LogFormat};

const DEFAULT_FILTER: &str = "info,recipe_api=debug";
const LOG_FILE_PREFIX: &str = "recipe_api.log";

/// Installs the global subscriber. Keep the returned guard alive for the
/// life of the process, or buffered file output is lost on exit.
pub fn init(log: &LogConfig) -> Result<Option<WorkerGuard>, TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    match log.format {
        LogFormat::Json => layers.push(fmt::layer().json().boxed()),
        LogFormat::Pretty => layers.push(fmt::layer().boxed()),
    }

    let guard = log.dir.as_ref().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
        guard
    });

    tracing_subscriber::registry().with(layers).with(filter).try_init()?;
    Ok(guard)
}
