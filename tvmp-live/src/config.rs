//! Configuration management for tvmp-live
//!
//! Bootstrap configuration comes from a TOML file; every field has a
//! built-in default, so a missing file is not an error.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--port, --channels)
//! 2. Environment variables (via clap `env`, TVMP_CONFIG for the file)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP control-surface port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Channel list file (see `catalog::ChannelListFile`)
    #[serde(default)]
    pub channels_file: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub buffer: BufferSettings,

    #[serde(default)]
    pub multiview: MultiviewSettings,

    #[serde(default)]
    pub surf: SurfSettings,

    #[serde(default)]
    pub engine: EngineSettings,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            channels_file: None,
            logging: LoggingConfig::default(),
            buffer: BufferSettings::default(),
            multiview: MultiviewSettings::default(),
            surf: SurfSettings::default(),
            engine: EngineSettings::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Adjacent-channel pre-buffering
#[derive(Debug, Clone, Deserialize)]
pub struct BufferSettings {
    /// Maximum background sessions held at once
    #[serde(default = "default_max_buffer_count")]
    pub max_buffer_count: usize,

    /// Wait after a tune before starting background loads, so the
    /// foreground session gets the bandwidth first
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Forward buffer requested for background sessions
    #[serde(default = "default_low_buffer_target_secs")]
    pub low_buffer_target_secs: u64,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            max_buffer_count: default_max_buffer_count(),
            settle_delay_ms: default_settle_delay_ms(),
            low_buffer_target_secs: default_low_buffer_target_secs(),
        }
    }
}

impl BufferSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn low_buffer_target(&self) -> Duration {
        Duration::from_secs(self.low_buffer_target_secs)
    }
}

/// Multiview grid
#[derive(Debug, Clone, Deserialize)]
pub struct MultiviewSettings {
    /// Slots created by `initialize` (clamped to 1..=2)
    #[serde(default = "default_initial_slots")]
    pub initial_slots: usize,

    /// Deepest time-shift the upstream buffer allows
    #[serde(default = "default_dvr_buffer_ceiling_secs")]
    pub dvr_buffer_ceiling_secs: u32,
}

impl Default for MultiviewSettings {
    fn default() -> Self {
        Self {
            initial_slots: default_initial_slots(),
            dvr_buffer_ceiling_secs: default_dvr_buffer_ceiling_secs(),
        }
    }
}

/// Channel surf preview
#[derive(Debug, Clone, Deserialize)]
pub struct SurfSettings {
    /// Countdown start value
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u32,

    /// Length of one countdown step
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Preload and surf over favorites instead of the full guide
    #[serde(default)]
    pub favorites_only: bool,
}

impl Default for SurfSettings {
    fn default() -> Self {
        Self {
            countdown_secs: default_countdown_secs(),
            tick_ms: default_tick_ms(),
            favorites_only: false,
        }
    }
}

impl SurfSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Simulated engine (used when no hardware pipeline is attached)
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_ready_delay_ms")]
    pub ready_delay_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ready_delay_ms: default_ready_delay_ms(),
        }
    }
}

fn default_port() -> u16 {
    5760
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_buffer_count() -> usize {
    2
}

fn default_settle_delay_ms() -> u64 {
    500
}

fn default_low_buffer_target_secs() -> u64 {
    5
}

fn default_initial_slots() -> usize {
    2
}

fn default_dvr_buffer_ceiling_secs() -> u32 {
    2 * 60 * 60
}

fn default_countdown_secs() -> u32 {
    3
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_ready_delay_ms() -> u64 {
    400
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub channels_file: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// File the settings came from (`None`: defaults only)
    pub source: Option<PathBuf>,
    pub port: u16,
    pub channels_file: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub buffer: BufferSettings,
    pub multiview: MultiviewSettings,
    pub surf: SurfSettings,
    pub engine: EngineSettings,
}

impl Config {
    /// Load configuration from `toml_path` (if any) and apply CLI overrides
    pub fn load(toml_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let toml_config: TomlConfig = tvmp_common::config::load_toml(toml_path)?;
        let config = Self::from_toml(toml_config, toml_path.map(Path::to_path_buf), overrides);

        info!(
            "Configuration: port={}, channels_file={:?}, settle_delay={}ms, max_buffer_count={}",
            config.port, config.channels_file, config.buffer.settle_delay_ms, config.buffer.max_buffer_count
        );
        Ok(config)
    }

    fn from_toml(toml_config: TomlConfig, source: Option<PathBuf>, overrides: ConfigOverrides) -> Self {
        let mut logging = toml_config.logging;
        if let Some(level) = overrides.log_level {
            logging.level = level;
        }

        Self {
            source,
            port: overrides.port.unwrap_or(toml_config.port),
            channels_file: overrides.channels_file.or(toml_config.channels_file),
            logging,
            buffer: toml_config.buffer,
            multiview: toml_config.multiview,
            surf: toml_config.surf,
            engine: toml_config.engine,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), None, ConfigOverrides::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 5760);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.buffer.max_buffer_count, 2);
        assert_eq!(config.buffer.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.buffer.low_buffer_target(), Duration::from_secs(5));
        assert_eq!(config.multiview.initial_slots, 2);
        assert_eq!(config.surf.countdown_secs, 3);
        assert_eq!(config.surf.tick(), Duration::from_secs(1));
        assert!(!config.surf.favorites_only);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "port = 6000\n\n[buffer]\nsettle_delay_ms = 250\n\n[surf]\ncountdown_secs = 5"
        )
        .unwrap();

        let config = Config::load(Some(file.path()), ConfigOverrides::default()).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.buffer.settle_delay_ms, 250);
        assert_eq!(config.buffer.max_buffer_count, 2);
        assert_eq!(config.surf.countdown_secs, 5);
        assert_eq!(config.surf.tick_ms, 1000);
        assert_eq!(config.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 6000\nchannels_file = \"/etc/tvmp/channels.toml\"").unwrap();

        let overrides = ConfigOverrides {
            port: Some(7000),
            channels_file: Some(PathBuf::from("/tmp/channels.toml")),
            log_level: Some("debug".into()),
        };
        let config = Config::load(Some(file.path()), overrides).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.channels_file, Some(PathBuf::from("/tmp/channels.toml")));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[buffer]\nmax_buffer_count = \"two\"").unwrap();

        let result = Config::load(Some(file.path()), ConfigOverrides::default());
        assert!(matches!(result, Err(crate::error::Error::Config(_))));
    }
}
