//! Tracing setup: console output plus the append-only alerts log.

use std::fs;
use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::domain::ALERTS_FILE;
use crate::error::AppError;

/// Install the global subscriber.
///
/// - console: `RUST_LOG` filter, `info` by default
/// - `<log_dir>/alerts.log`: `WARN` and above, appended, never rotated
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init(log_dir: &Path) -> Result<WorkerGuard, AppError> {
    fs::create_dir_all(log_dir)
        .map_err(|e| AppError::io(format_args!("failed to create log dir '{}'", log_dir.display()), e))?;

    let appender = tracing_appender::rolling::never(log_dir, ALERTS_FILE);
    let (alerts_writer, guard) = tracing_appender::non_blocking(appender);

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_target(false).with_filter(console_filter);

    let alerts = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(alerts_writer)
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(console)
        .with(alerts)
        .try_init()
        .map_err(|e| AppError::Config(format!("failed to install logger: {e}")))?;

    Ok(guard)
}
