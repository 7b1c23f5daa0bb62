//! Configuration management for todosync
//!
//! This module handles loading, parsing, and validation of configuration files.

use crate::constants::{
    API_URL_ENV, CONFIG_GENERATED, DEFAULT_API_BASE_URL, DEFAULT_AUTH_MAX_ATTEMPTS, DEFAULT_AUTH_RETRY_DELAY,
    DEFAULT_AUTH_TIMEOUT_SECS, DEFAULT_LIST_BACKOFF_STEP, DEFAULT_LIST_MAX_ATTEMPTS, DEFAULT_LIST_TIMEOUT_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TRUSTED_MEDIA_MARKERS, DEFAULT_UPLOAD_TIMEOUT_SECS, FIRST_PASS_QUALITY,
    FIRST_PASS_WIDTH, MAX_UPLOAD_BYTES, SECOND_PASS_QUALITY, SECOND_PASS_WIDTH, UPLOAD_FALLBACK_FIELD,
    UPLOAD_PRIMARY_FIELD,
};
use crate::backend::client::Timeouts;
use crate::backend::retry::RetryPolicies;
use crate::backend::RetryPolicy;
use crate::upload::{ReducePass, UploadSettings};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub upload: UploadConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Remote service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// API origin, also used to absolutize media URLs
    pub base_url: String,
    pub auth_timeout_secs: u64,
    pub list_timeout_secs: u64,
    /// Single-record reads and writes
    pub request_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    /// Media URLs containing one of these are never re-hosted
    pub trusted_media_markers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub auth_max_attempts: u32,
    pub auth_delay_ms: u64,
    pub list_max_attempts: u32,
    /// The n-th retry waits n times this long
    pub list_backoff_ms: u64,
}

/// Image upload configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Hard ceiling in bytes after reduction
    pub max_bytes: u64,
    /// Target width of the first pass; omit to keep the original width
    pub first_pass_width: Option<u32>,
    pub first_pass_quality: f32,
    pub second_pass_width: Option<u32>,
    pub second_pass_quality: f32,
    pub primary_field: String,
    pub fallback_field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file; defaults to the user data directory
    pub database_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write logs to a file
    pub enabled: bool,
    /// One of off, error, warn, info, debug, trace
    pub level: String,
    /// Log file; defaults to the user data directory
    pub file: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_timeout_secs: DEFAULT_AUTH_TIMEOUT_SECS,
            list_timeout_secs: DEFAULT_LIST_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            upload_timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
            trusted_media_markers: DEFAULT_TRUSTED_MEDIA_MARKERS.iter().map(|m| (*m).to_string()).collect(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            auth_max_attempts: DEFAULT_AUTH_MAX_ATTEMPTS,
            auth_delay_ms: DEFAULT_AUTH_RETRY_DELAY.as_millis() as u64,
            list_max_attempts: DEFAULT_LIST_MAX_ATTEMPTS,
            list_backoff_ms: DEFAULT_LIST_BACKOFF_STEP.as_millis() as u64,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            first_pass_width: Some(FIRST_PASS_WIDTH),
            first_pass_quality: FIRST_PASS_QUALITY,
            second_pass_width: Some(SECOND_PASS_WIDTH),
            second_pass_quality: SECOND_PASS_QUALITY,
            primary_field: UPLOAD_PRIMARY_FIELD.to_string(),
            fallback_field: UPLOAD_FALLBACK_FIELD.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
            file: None,
        }
    }
}

impl ApiConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            auth: Duration::from_secs(self.auth_timeout_secs),
            list: Duration::from_secs(self.list_timeout_secs),
            request: Duration::from_secs(self.request_timeout_secs),
            upload: Duration::from_secs(self.upload_timeout_secs),
        }
    }
}

impl RetryConfig {
    pub fn policies(&self) -> RetryPolicies {
        RetryPolicies {
            auth: RetryPolicy::auth(self.auth_max_attempts, Duration::from_millis(self.auth_delay_ms)),
            list: RetryPolicy::list(self.list_max_attempts, Duration::from_millis(self.list_backoff_ms)),
        }
    }
}

impl UploadConfig {
    pub fn settings(&self) -> UploadSettings {
        UploadSettings {
            max_bytes: self.max_bytes,
            first_pass: ReducePass::new(self.first_pass_width, self.first_pass_quality),
            second_pass: ReducePass::new(self.second_pass_width, self.second_pass_quality),
            primary_field: self.primary_field.clone(),
            fallback_field: self.fallback_field.clone(),
        }
    }
}

impl Config {
    /// Load configuration from file or return defaults, then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        let config_path = Self::find_config_file()?;

        let mut config = if let Some(path) = config_path {
            Self::load_from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in order of precedence
    fn find_config_file() -> Result<Option<PathBuf>> {
        // 1. Check current directory
        let current_dir_config = PathBuf::from("todosync.toml");
        if current_dir_config.exists() {
            return Ok(Some(current_dir_config));
        }

        // 2. Check XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("todosync").join("config.toml");
            if xdg_config.exists() {
                return Ok(Some(xdg_config));
            }
        }

        Ok(None)
    }

    /// Apply `TODOSYNC_API_URL` if set and non-empty
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            self.apply_api_url_override(&url);
        }
    }

    pub fn apply_api_url_override(&mut self, url: &str) {
        let url = url.trim();
        if !url.is_empty() {
            self.api.base_url = url.to_string();
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate API settings
        let base = self.api.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            anyhow::bail!("api.base_url must start with http:// or https://, got '{}'", self.api.base_url);
        }
        url::Url::parse(base).with_context(|| format!("Invalid api.base_url '{}'", self.api.base_url))?;

        for (name, secs) in [
            ("auth_timeout_secs", self.api.auth_timeout_secs),
            ("list_timeout_secs", self.api.list_timeout_secs),
            ("request_timeout_secs", self.api.request_timeout_secs),
            ("upload_timeout_secs", self.api.upload_timeout_secs),
        ] {
            if secs == 0 {
                anyhow::bail!("api.{} must be greater than 0", name);
            }
        }

        // Validate retry settings
        if self.retry.auth_max_attempts == 0 {
            anyhow::bail!("retry.auth_max_attempts must be at least 1");
        }
        if self.retry.list_max_attempts == 0 {
            anyhow::bail!("retry.list_max_attempts must be at least 1");
        }

        // Validate upload settings
        if self.upload.max_bytes == 0 {
            anyhow::bail!("upload.max_bytes must be greater than 0");
        }
        for (name, quality) in [
            ("first_pass_quality", self.upload.first_pass_quality),
            ("second_pass_quality", self.upload.second_pass_quality),
        ] {
            if !(quality > 0.0 && quality <= 1.0) {
                anyhow::bail!("upload.{} must be in (0, 1], got {}", name, quality);
            }
        }
        for (name, width) in [
            ("first_pass_width", self.upload.first_pass_width),
            ("second_pass_width", self.upload.second_pass_width),
        ] {
            if width == Some(0) {
                anyhow::bail!("upload.{} must be greater than 0 when set", name);
            }
        }
        if self.upload.primary_field.trim().is_empty() || self.upload.fallback_field.trim().is_empty() {
            anyhow::bail!("upload field names cannot be empty");
        }

        // Validate logging level
        crate::logger::parse_level(&self.logging.level)?;

        Ok(())
    }

    /// SQLite database path, from configuration or the user data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join("todosync").join("todosync.db"))
                .context("Could not determine data directory"),
        }
    }

    /// Generate default configuration file
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Self::default();
        let toml_content = toml::to_string_pretty(&config).context("Failed to serialize default config")?;

        // Add header comment
        let header = format!(
            "# todosync configuration file\n# Generated on {}\n# {} overrides api.base_url\n\n",
            chrono::Local::now().format("%Y-%m-%d"),
            API_URL_ENV
        );

        let full_content = header + &toml_content;

        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
            }
        }

        std::fs::write(&path, full_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        println!("{}: {}", CONFIG_GENERATED, path.as_ref().display());
        Ok(())
    }

    /// Get the XDG config directory path
    pub fn get_xdg_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
            .map(|dir| dir.join("todosync"))
    }

    /// Get the default config file path
    pub fn get_default_config_path() -> Result<PathBuf> {
        Ok(Self::get_xdg_config_dir()?.join("config.toml"))
    }
}
