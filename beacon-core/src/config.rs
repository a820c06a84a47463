//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/beacon/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/beacon/` (~/.config/beacon/)
//! - State/Logs: `$XDG_STATE_HOME/beacon/` (~/.local/state/beacon/)
//!
//! Every recognized option is a named field with its own default. Values are
//! validated once, when a pipeline is constructed.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Event queue, dispatch and endpoint settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Touch and scroll tracking
    #[serde(default)]
    pub gestures: GestureConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Event pipeline configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Master switch; a disabled pipeline accepts and discards everything
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Collection server base URL (e.g., `https://collect.example.com`)
    pub server_url: Option<String>,

    /// API key sent with every payload
    pub api_key: Option<String>,

    /// Application identifier sent with every payload
    pub application_id: Option<String>,

    /// Milliseconds between periodic flushes
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Queue length that triggers an immediate flush
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Max times a failed entry is requeued before it is dropped
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Log dropped entries at info instead of debug
    #[serde(default)]
    pub debug: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            server_url: None,
            api_key: None,
            application_id: None,
            flush_interval_ms: default_flush_interval_ms(),
            max_queue_size: default_max_queue_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            debug: false,
        }
    }
}

impl PipelineConfig {
    /// Check if the pipeline is enabled and has everything it needs to send
    pub fn is_ready(&self) -> bool {
        self.enabled
            && self.server_url.is_some()
            && self.api_key.is_some()
            && self.application_id.is_some()
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.server_url.is_none() {
            return Err(Error::Config(
                "pipeline.server_url is required when pipeline is enabled".to_string(),
            ));
        }
        if self.api_key.is_none() {
            return Err(Error::Config(
                "pipeline.api_key is required when pipeline is enabled".to_string(),
            ));
        }
        if self.application_id.is_none() {
            return Err(Error::Config(
                "pipeline.application_id is required when pipeline is enabled".to_string(),
            ));
        }
        if self.max_queue_size == 0 {
            return Err(Error::Config(
                "pipeline.max_queue_size must be at least 1".to_string(),
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(Error::Config(
                "pipeline.flush_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Periodic flush interval
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// API key, or an empty string for a pipeline that never sends
    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    /// Application id, or an empty string for a pipeline that never sends
    pub fn application_id(&self) -> &str {
        self.application_id.as_deref().unwrap_or_default()
    }
}

fn default_enabled() -> bool {
    true
}

fn default_flush_interval_ms() -> u64 {
    5000
}

fn default_max_queue_size() -> usize {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

/// Touch, gesture and scroll tracking configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GestureConfig {
    /// Emit tap and long-press records
    #[serde(default = "default_true")]
    pub track_touches: bool,

    /// Emit scroll-depth records
    #[serde(default = "default_true")]
    pub track_scrolls: bool,

    /// Emit swipe and pinch records
    #[serde(default = "default_true")]
    pub track_gestures: bool,

    /// Probability in [0, 1] that an emitted touch record is kept
    #[serde(default = "default_touch_sampling")]
    pub touch_sampling: f64,

    /// Hold duration that resolves a press as a long-press
    #[serde(default = "default_long_press_ms")]
    pub long_press_ms: u64,

    /// A tap moves strictly less than this many pixels
    #[serde(default = "default_tap_max_distance")]
    pub tap_max_distance: f64,

    /// A swipe moves at least this many pixels
    #[serde(default = "default_swipe_min_distance")]
    pub swipe_min_distance: f64,

    /// A swipe moves at least this fast, in px/ms
    #[serde(default = "default_swipe_min_velocity")]
    pub swipe_min_velocity: f64,

    /// Local buffer length that forwards interaction records to the queue
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            track_touches: true,
            track_scrolls: true,
            track_gestures: true,
            touch_sampling: default_touch_sampling(),
            long_press_ms: default_long_press_ms(),
            tap_max_distance: default_tap_max_distance(),
            swipe_min_distance: default_swipe_min_distance(),
            swipe_min_velocity: default_swipe_min_velocity(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl GestureConfig {
    /// Validate thresholds and sampling rate
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.touch_sampling) {
            return Err(Error::Config(
                "gestures.touch_sampling must be between 0 and 1".to_string(),
            ));
        }
        if self.long_press_ms == 0 {
            return Err(Error::Config(
                "gestures.long_press_ms must be at least 1".to_string(),
            ));
        }
        if self.tap_max_distance <= 0.0
            || self.swipe_min_distance <= 0.0
            || self.swipe_min_velocity <= 0.0
        {
            return Err(Error::Config(
                "gestures distance and velocity thresholds must be positive".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(Error::Config(
                "gestures.buffer_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Long-press timer duration
    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }
}

fn default_true() -> bool {
    true
}

fn default_touch_sampling() -> f64 {
    1.0
}

fn default_long_press_ms() -> u64 {
    500
}

fn default_tap_max_distance() -> f64 {
    10.0
}

fn default_swipe_min_distance() -> f64 {
    50.0
}

fn default_swipe_min_velocity() -> f64 {
    0.3
}

fn default_buffer_size() -> usize {
    50
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,

    /// Log directory; app sandboxes without an XDG layout set this
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl LoggingConfig {
    /// Directory log files are written to
    pub fn log_dir(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(Config::state_dir)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.gestures.validate()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/beacon/config.toml` (~/.config/beacon/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("beacon").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/beacon/` (~/.local/state/beacon/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("beacon")
    }
}
