//! Logging system configuration and initialization
//!
//! Console output is always enabled; rotating daily log files can be turned
//! on from configuration. The non-blocking file writer guard is kept alive
//! for the lifetime of the process.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::infrastructure::config::LoggingConfig;

// Global guard to keep the log file writer alive
lazy_static::lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<WorkerGuard>> = Mutex::new(Vec::new());
}

/// Get the log directory relative to the executable location.
pub fn default_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(std::path::Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    exe_dir.join("logs")
}

/// Initialize the logging system from configuration.
///
/// RUST_LOG takes precedence over the configured level so operators can
/// raise verbosity without touching the config file.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    if config.file_enabled {
        let log_dir = config.dir.clone().unwrap_or_else(default_log_directory);
        std::fs::create_dir_all(&log_dir)?;
        let file_appender = rolling::daily(&log_dir, "sheetsync.log");
        let (file_writer, guard) = non_blocking(file_appender);
        if let Ok(mut guards) = LOG_GUARDS.lock() {
            guards.push(guard);
        }

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .try_init()?;
    }

    tracing::info!(
        level = %config.level,
        file_enabled = config.file_enabled,
        "logging initialized"
    );
    Ok(())
}
