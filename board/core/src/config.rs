//! TOML Configuration File Support
//!
//! Loads dashboard settings from `~/.config/spanboard/config.toml`.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. Environment variables
//! 2. TOML configuration file
//! 3. Default values
//!
//! # XDG Base Directory Compliance
//!
//! The configuration file follows the XDG Base Directory specification:
//! - `$XDG_CONFIG_HOME/spanboard/config.toml` (typically `~/.config/spanboard/config.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [containers]
//! root_max_lines = 4
//! operation_max_lines = 4
//! detail_mode = "single_line"
//! logical_from_depth = 3
//!
//! [render]
//! max_roots = 4
//! max_children = 6
//! max_details = 12
//! progress_zero_label = "..."
//! logs_max_length = 80
//! logs_prefix = "| "
//! collapse_finished_operations = true
//!
//! [scheduler]
//! force_interval_ms = 50
//! min_update_gap_ms = 5
//! watch_poll_ms = 1
//! settle_pause_ms = 500
//! flush_pause_ms = 500
//! stdout_max_lines = 8
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::container::{ContainerConfig, DetailMode};
use crate::render::RenderOptions;

/// Environment variable overriding [`RenderOptions::max_roots`]
pub const ENV_MAX_ROOTS: &str = "SPANBOARD_MAX_ROOTS";

/// Environment variable overriding [`RenderOptions::logs_max_length`]
pub const ENV_LOGS_MAX_LENGTH: &str = "SPANBOARD_LOGS_MAX_LENGTH";

/// Environment variable overriding [`SchedulerConfig::force_interval`] (ms)
pub const ENV_FORCE_INTERVAL_MS: &str = "SPANBOARD_FORCE_INTERVAL_MS";

/// Environment variable overriding [`SchedulerConfig::stdout_max_lines`]
pub const ENV_STDOUT_MAX_LINES: &str = "SPANBOARD_STDOUT_MAX_LINES";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Tracks where the configuration came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// Scheduler Configuration
// =============================================================================

/// Timing of the render loop and size of the live capture block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Redraw at least this often while active
    pub force_interval: Duration,
    /// Minimum gap between two change-triggered redraws
    pub min_update_gap: Duration,
    /// How often the change watcher polls the tree
    pub watch_poll: Duration,
    /// Pause between `release` and cancelling the loop
    pub settle_pause: Duration,
    /// Each of the two pauses around the final stdout replay
    pub flush_pause: Duration,
    /// Captured lines kept for the live block at the top of the screen
    pub stdout_max_lines: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            force_interval: Duration::from_millis(50),
            min_update_gap: Duration::from_millis(5),
            watch_poll: Duration::from_millis(1),
            settle_pause: Duration::from_millis(500),
            flush_pause: Duration::from_millis(500),
            stdout_max_lines: 8,
        }
    }
}

impl SchedulerConfig {
    /// Create a scheduler configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the forced redraw interval
    #[must_use]
    pub fn with_force_interval(mut self, interval: Duration) -> Self {
        self.force_interval = interval;
        self
    }

    /// Set the debounce gap
    #[must_use]
    pub fn with_min_update_gap(mut self, gap: Duration) -> Self {
        self.min_update_gap = gap;
        self
    }

    /// Set the watcher poll interval
    #[must_use]
    pub fn with_watch_poll(mut self, poll: Duration) -> Self {
        self.watch_poll = poll;
        self
    }

    /// Set the pause before cancellation
    #[must_use]
    pub fn with_settle_pause(mut self, pause: Duration) -> Self {
        self.settle_pause = pause;
        self
    }

    /// Set the teardown flush pauses
    #[must_use]
    pub fn with_flush_pause(mut self, pause: Duration) -> Self {
        self.flush_pause = pause;
        self
    }

    /// Set the live capture block size
    #[must_use]
    pub fn with_stdout_max_lines(mut self, lines: usize) -> Self {
        self.stdout_max_lines = lines;
        self
    }

    /// All pauses zeroed, for tests and non-interactive embedding
    #[must_use]
    pub fn without_pauses(self) -> Self {
        self.with_settle_pause(Duration::ZERO)
            .with_flush_pause(Duration::ZERO)
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[containers]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainersToml {
    /// Ring size for root spans
    pub root_max_lines: Option<usize>,

    /// Ring size for operation spans
    pub operation_max_lines: Option<usize>,

    /// `single_line` or `discard`
    pub detail_mode: Option<DetailMode>,

    /// Depth from which spans forward their writes
    pub logical_from_depth: Option<u32>,

    /// Set to `false` to keep every span physical
    pub logical_spans: Option<bool>,
}

/// `[render]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderToml {
    /// Root spans shown per frame
    pub max_roots: Option<usize>,

    /// Operations shown per root
    pub max_children: Option<usize>,

    /// Details shown per operation
    pub max_details: Option<usize>,

    /// Label shown at 0 %
    pub progress_zero_label: Option<String>,

    /// Center-truncation length for log lines
    pub logs_max_length: Option<usize>,

    /// Prefix for log lines
    pub logs_prefix: Option<String>,

    /// Hide the children of finished operations
    pub collapse_finished_operations: Option<bool>,
}

/// `[scheduler]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerToml {
    /// Forced redraw interval in milliseconds
    pub force_interval_ms: Option<u64>,

    /// Debounce gap in milliseconds
    pub min_update_gap_ms: Option<u64>,

    /// Watcher poll interval in milliseconds
    pub watch_poll_ms: Option<u64>,

    /// Pause before cancellation in milliseconds
    pub settle_pause_ms: Option<u64>,

    /// Teardown flush pause in milliseconds
    pub flush_pause_ms: Option<u64>,

    /// Live capture block size
    pub stdout_max_lines: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardToml {
    /// Container sizing section
    pub containers: ContainersToml,

    /// Display section
    pub render: RenderToml,

    /// Render loop timing section
    pub scheduler: SchedulerToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved dashboard configuration
#[derive(Clone, Debug, Default)]
pub struct BoardConfig {
    /// Container sizing per depth tier
    pub containers: ContainerConfig,

    /// Display limits and labels
    pub render: RenderOptions,

    /// Render loop timing
    pub scheduler: SchedulerConfig,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl BoardConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the container section
    #[must_use]
    pub fn with_containers(mut self, containers: ContainerConfig) -> Self {
        self.containers = containers;
        self
    }

    /// Replace the render section
    #[must_use]
    pub fn with_render(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    /// Replace the scheduler section
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check values the render loop cannot work with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] when no root could ever be
    /// shown or the forced redraw interval is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.max_roots == 0 {
            return Err(ConfigError::ValidationError(
                "render.max_roots must be at least 1".to_string(),
            ));
        }

        if self.scheduler.force_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "scheduler.force_interval_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/spanboard/config.toml` or
/// `~/.config/spanboard/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("spanboard").join("config.toml"))
}

/// Load configuration from the default path, environment and defaults
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or the
/// result fails validation. A missing config file is not an error.
pub fn load_config() -> Result<BoardConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// `None` skips the file and only applies defaults and environment.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or the
/// result fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<BoardConfig, ConfigError> {
    load_with_env(path, |key| std::env::var(key).ok())
}

fn load_with_env(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<BoardConfig, ConfigError> {
    let mut config = BoardConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: BoardToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut BoardConfig, toml: &BoardToml) {
    // Containers
    if let Some(lines) = toml.containers.root_max_lines {
        config.containers.root_max_lines = lines;
    }
    if let Some(lines) = toml.containers.operation_max_lines {
        config.containers.operation_max_lines = lines;
    }
    if let Some(mode) = toml.containers.detail_mode {
        config.containers.detail_mode = mode;
    }
    if let Some(depth) = toml.containers.logical_from_depth {
        config.containers.logical_from_depth = Some(depth);
    }
    if toml.containers.logical_spans == Some(false) {
        config.containers.logical_from_depth = None;
    }

    // Render
    if let Some(max) = toml.render.max_roots {
        config.render.max_roots = max;
    }
    if let Some(max) = toml.render.max_children {
        config.render.max_children = max;
    }
    if let Some(max) = toml.render.max_details {
        config.render.max_details = max;
    }
    if let Some(ref label) = toml.render.progress_zero_label {
        config.render.progress_zero_label.clone_from(label);
    }
    if let Some(max) = toml.render.logs_max_length {
        config.render.logs_max_length = max;
    }
    if let Some(ref prefix) = toml.render.logs_prefix {
        config.render.logs_prefix.clone_from(prefix);
    }
    if let Some(collapse) = toml.render.collapse_finished_operations {
        config.render.collapse_finished_operations = collapse;
    }

    // Scheduler
    if let Some(ms) = toml.scheduler.force_interval_ms {
        config.scheduler.force_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.scheduler.min_update_gap_ms {
        config.scheduler.min_update_gap = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.scheduler.watch_poll_ms {
        config.scheduler.watch_poll = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.scheduler.settle_pause_ms {
        config.scheduler.settle_pause = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.scheduler.flush_pause_ms {
        config.scheduler.flush_pause = Duration::from_millis(ms);
    }
    if let Some(lines) = toml.scheduler.stdout_max_lines {
        config.scheduler.stdout_max_lines = lines;
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut BoardConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(max) = env(ENV_MAX_ROOTS).and_then(|v| v.parse::<usize>().ok()) {
        config.render.max_roots = max;
        config.source = ConfigSource::Env;
    }
    if let Some(max) = env(ENV_LOGS_MAX_LENGTH).and_then(|v| v.parse::<usize>().ok()) {
        config.render.logs_max_length = max;
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env(ENV_FORCE_INTERVAL_MS).and_then(|v| v.parse::<u64>().ok()) {
        config.scheduler.force_interval = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(lines) = env(ENV_STDOUT_MAX_LINES).and_then(|v| v.parse::<usize>().ok()) {
        config.scheduler.stdout_max_lines = lines;
        config.source = ConfigSource::Env;
    }
}
