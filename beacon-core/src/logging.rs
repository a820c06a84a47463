//! Tracing setup
//!
//! The library itself only emits `tracing` events. Host applications that
//! already install a subscriber see them there; [`init`] is for hosts
//! without one and for the `beacon` binary. Files roll daily under
//! `logging.directory`, or `~/.local/state/beacon/` when that is unset.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

const LOG_FILE_PREFIX: &str = "beacon.log";

/// Filter for test output when `RUST_LOG` is unset
const TEST_FILTER: &str = "beacon_core=debug";

/// Install a file subscriber for the process
///
/// `RUST_LOG` takes precedence over `logging.level`. Fails if another
/// global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| Error::Logging(format!("cannot write logs to {:?}: {}", log_dir, e)))?;

    // Flushing and retry warnings must never stall the dispatcher task on disk
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // Pipeline and tracker tasks hop between runtime workers
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _guard: guard,
        log_dir,
    })
}

/// Route pipeline logs into the test harness output
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(TEST_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Keeps the background log writer alive; pending lines are flushed on drop
pub struct LoggingGuard {
    _guard: WorkerGuard,
    log_dir: PathBuf,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Path of the current log file for a config, before the date suffix
pub fn log_file_path(config: &LoggingConfig) -> PathBuf {
    config.log_dir().join(LOG_FILE_PREFIX)
}
