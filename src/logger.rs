//! File logging for the task core.
//!
//! Library code logs through the `log` macros. An embedding app calls
//! [`init`] once at startup to route those records to a log file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;

use crate::config::LoggingConfig;
use crate::constants::{APP_DIR_NAME, LOG_FILE_NAME};

/// Install the global logger according to `config`.
///
/// Does nothing when logging is disabled.
///
/// # Errors
/// Returns an error if the log file cannot be opened or a logger is already installed
pub fn init(config: &LoggingConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let path = get_log_file_path()?;
    init_with_path(config, path)
}

/// Install the global logger writing to `path`.
pub fn init_with_path(config: &LoggingConfig, path: PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }

    dispatch(config.level_filter()?)
        .chain(fern::log_file(&path).with_context(|| format!("Failed to open log file: {}", path.display()))?)
        .apply()
        .context("A global logger is already installed")?;

    log::info!("📝 Logging to {}", path.display());
    Ok(())
}

/// Formatter shared by every output: `[time LEVEL target] message`.
fn dispatch(level: log::LevelFilter) -> fern::Dispatch {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        // Keep HTTP and SQL internals out of the app log
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn)
        .level_for("sqlx", log::LevelFilter::Warn)
}

/// Location of the log file in the platform's local data directory
pub fn get_log_file_path() -> Result<PathBuf> {
    dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))
        .map(|dir| dir.join(APP_DIR_NAME).join(LOG_FILE_NAME))
}
