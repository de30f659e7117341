//! Tracing subscriber setup for binaries embedding the pipeline.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the application. `init_logging` is the default setup used by
//! `sgbench`: human-readable output on stderr plus, optionally, a daily
//! rolling log file.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::errors::{PipelineError, PipelineResult};

/// File name prefix for rolling log files.
pub const LOG_FILE_PREFIX: &str = "scattergather.log";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter` (e.g. `"info"` or
/// `"scattergather=debug"`). When `log_dir` is given, events are also written
/// to a daily rolling file there; keep the returned guard alive until exit so
/// buffered lines are flushed.
pub fn init_logging(
    default_filter: &str,
    log_dir: Option<&Path>,
) -> PipelineResult<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter).map_err(|e| {
            PipelineError::Config(format!("invalid log filter {:?}: {}", default_filter, e))
        })?,
    };
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let guard = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                PipelineError::Config(format!(
                    "failed to create log directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().with_ansi(false).with_writer(writer);

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
                .map_err(|e| PipelineError::Config(format!("failed to install logger: {}", e)))?;
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init()
                .map_err(|e| PipelineError::Config(format!("failed to install logger: {}", e)))?;
            None
        }
    };

    tracing::debug!(log_dir = ?log_dir, "logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let result = init_logging("scattergather=notalevel", None);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_file_logging_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        // Another test may already own the global subscriber; the directory
        // is created either way.
        let _ = init_logging("info", Some(&log_dir));
        assert!(log_dir.is_dir());
    }
}
