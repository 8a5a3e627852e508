//! Structured logging bootstrap.
//!
//! Library code only emits `tracing` events; the binary calls [`init_logging`]
//! once to decide where they go. The file sink writes JSON lines to
//! `logs/app.log` under the working directory.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Directory (relative to the working directory) that holds log files.
pub const LOG_DIR: &str = "logs";

const LOG_FILE: &str = "app.log";

/// Controls where structured logs are published.
#[derive(Debug, Clone, Copy)]
pub enum LoggingDestination {
    /// Emit logs to both the log file and stderr.
    FileAndStderr,
    /// Emit logs only to the log file.
    FileOnly,
    /// Emit logs only to stderr.
    StderrOnly,
}

#[derive(Debug)]
struct LoggingGuards {
    _guard: Option<WorkerGuard>,
    log_path: Option<PathBuf>,
}

static LOGGING_STATE: OnceLock<LoggingGuards> = OnceLock::new();

/// Errors that can arise while standing up structured logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to prepare log directory: {0}")]
    Io(#[from] io::Error),
    #[error("invalid logging filter: {0}")]
    Filter(#[from] ParseError),
    #[error("failed to install logging subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber.
///
/// The first call wins; subsequent calls are no-ops that return the resolved
/// log file path.
pub fn init_logging(
    destination: LoggingDestination,
) -> Result<Option<&'static PathBuf>, LoggingError> {
    if LOGGING_STATE.get().is_none() {
        let guards = install_logging(destination, Path::new(LOG_DIR))?;
        if let Err(guards) = LOGGING_STATE.set(guards) {
            drop(guards);
        }
    }

    Ok(current_log_path())
}

/// Log file selected during initialization, if any.
pub fn current_log_path() -> Option<&'static PathBuf> {
    LOGGING_STATE
        .get()
        .and_then(|guards| guards.log_path.as_ref())
}

fn install_logging(
    destination: LoggingDestination,
    dir: &Path,
) -> Result<LoggingGuards, LoggingError> {
    let filter = build_filter(env_filter_spec().as_deref())?;
    let registry = tracing_subscriber::registry().with(filter);

    let (file_layer, guard, log_path) = match destination {
        LoggingDestination::FileAndStderr | LoggingDestination::FileOnly => {
            fs::create_dir_all(dir)?;
            let path = dir.join(LOG_FILE);
            let file_appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, worker_guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .event_format(
                    tracing_subscriber::fmt::format()
                        .json()
                        .with_level(true)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with_writer(writer)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(worker_guard), Some(path))
        }
        LoggingDestination::StderrOnly => (None, None, None),
    };

    let stderr_layer = match destination {
        LoggingDestination::FileOnly => None,
        _ => Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(io::stderr)
                .with_ansi(false)
                .boxed(),
        ),
    };

    registry.with(file_layer).with(stderr_layer).try_init()?;

    if let Some(path) = log_path.as_ref() {
        info!(path = %path.display(), "Structured logging enabled");
    }

    Ok(LoggingGuards {
        _guard: guard,
        log_path,
    })
}

/// First non-blank of TIDE_CALENDAR_LOG, LOG_LEVEL and RUST_LOG.
fn env_filter_spec() -> Option<String> {
    ["TIDE_CALENDAR_LOG", "LOG_LEVEL", "RUST_LOG"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|spec| !spec.trim().is_empty())
}

fn build_filter(spec: Option<&str>) -> Result<EnvFilter, ParseError> {
    EnvFilter::try_new(spec.unwrap_or("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_defaults_to_info() {
        let filter = build_filter(None).unwrap();
        assert_eq!(filter.to_string(), "info");
    }

    #[test]
    fn test_filter_accepts_directives() {
        let filter = build_filter(Some("tide_calendar=debug,warn")).unwrap();
        assert!(filter.to_string().contains("tide_calendar=debug"));
    }

    #[test]
    fn test_filter_rejects_garbage() {
        assert!(build_filter(Some("tide_calendar=loud")).is_err());
    }
}
