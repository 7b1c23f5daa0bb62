//! Process-wide logging.
//!
//! [`Logger`] keeps a bounded buffer of recent formatted lines that a front
//! end can display, and [`Logger::install`] routes the `log` macros into it
//! (and into a log file when file logging is enabled) through `fern`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use log::LevelFilter;

use crate::config::LoggingConfig;
use crate::constants::{LOG_BUFFER_CAPACITY, LOG_FILE_NAME};

/// Shared logger that can be used across the application
#[derive(Clone)]
pub struct Logger {
    logs: Arc<Mutex<Vec<String>>>,
    capacity: usize,
    log_path: Option<PathBuf>,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            logs: Arc::new(Mutex::new(Vec::new())),
            capacity: LOG_BUFFER_CAPACITY,
            log_path: None,
        }
    }

    /// Logger writing to the default log file when `config.enabled` is set.
    pub fn from_config(config: &LoggingConfig) -> Result<Self> {
        let mut logger = Self::new();
        if config.enabled {
            let path = match &config.file {
                Some(path) => path.clone(),
                None => Self::default_log_path()?,
            };
            logger.log_path = Some(path);
        }
        Ok(logger)
    }

    /// Keep at most `capacity` lines in memory.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_log_file(mut self, path: PathBuf) -> Self {
        self.log_path = Some(path);
        self
    }

    /// `$XDG_DATA_HOME/todosync/todosync.log`
    pub fn default_log_path() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|dir| dir.join("todosync").join(LOG_FILE_NAME))
            .context("Could not determine data directory")
    }

    pub fn get_log_file_path(&self) -> Option<&PathBuf> {
        self.log_path.as_ref()
    }

    pub fn is_file_logging_enabled(&self) -> bool {
        self.log_path.is_some()
    }

    /// Install this logger as the global `log` backend.
    ///
    /// Fails if a global logger is already set or the log file cannot be
    /// opened.
    pub fn install(&self, level: LevelFilter) -> Result<()> {
        let buffer = self.clone();
        let mut dispatch = fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!("{:<5} {}: {}", record.level(), record.target(), message))
            })
            .level(level)
            // The SQL driver is chatty at debug level
            .level_for("sqlx", LevelFilter::Warn)
            .level_for("sea_orm", LevelFilter::Warn)
            .chain(fern::Output::call(move |record| buffer.log(record.args().to_string())));

        if let Some(path) = &self.log_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
            }
            let file = fern::log_file(path).with_context(|| format!("Failed to open log file: {}", path.display()))?;
            dispatch = dispatch.chain(
                fern::Dispatch::new()
                    .format(|out, message, _| {
                        out.finish(format_args!("[{}] {}", Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"), message))
                    })
                    .chain(file),
            );
        }

        dispatch.apply().context("A global logger is already installed")?;
        Ok(())
    }

    /// Add a log entry
    pub fn log(&self, message: String) {
        let timestamp = Utc::now().format("%H:%M:%S%.3f").to_string();
        let formatted_message = format!("[{}] {}", timestamp, message);

        if let Ok(mut logs) = self.logs.lock() {
            logs.push(formatted_message);
            if logs.len() > self.capacity {
                let overflow = logs.len() - self.capacity;
                logs.drain(..overflow);
            }
        }
    }

    /// Get all logs sorted by date (newest first)
    pub fn get_logs(&self) -> Vec<String> {
        if let Ok(logs) = self.logs.lock() {
            logs.iter().rev().cloned().collect()
        } else {
            Vec::new()
        }
    }

    /// Clear all logs
    pub fn clear(&self) {
        if let Ok(mut logs) = self.logs.lock() {
            logs.clear();
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a level name from configuration, case-insensitively.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    level
        .trim()
        .parse::<LevelFilter>()
        .map_err(|_| anyhow::anyhow!("Unknown log level '{level}'"))
}
