//! Logging for agentdeck
//!
//! Scan, parse, merge and write events are logged with structured fields to a
//! daily rotated file under `$XDG_STATE_HOME/agentdeck/`. Nothing is logged to
//! the terminal, so command output stays clean. `RUST_LOG` overrides the
//! configured level.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix of the rotated log files.
pub const LOG_FILE_PREFIX: &str = "agentdeck.log";

/// Guard that keeps the background log writer alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize logging into the XDG state directory.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    init_in(config, &Config::state_dir())
}

/// Initialize logging into `log_dir`.
///
/// Fails if the level is not a valid filter or a global subscriber is
/// already installed.
pub fn init_in(config: &LoggingConfig, log_dir: &Path) -> Result<LoggingGuard> {
    std::fs::create_dir_all(log_dir)?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(&config.level)?,
    };
    let (writer, guard) = tracing_appender::non_blocking(file_appender(config, log_dir)?);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install logger: {}", e)))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Parse a `logging.level` value (`info`, or directives like `agentdeck_core=debug`).
fn level_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|e| Error::Config(format!("invalid logging.level '{}': {}", level, e)))
}

fn file_appender(config: &LoggingConfig, log_dir: &Path) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(log_dir)
        .map_err(|e| Error::Config(format!("failed to create log appender: {}", e)))
}
