//! Configuration for the wxconv command line

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "WXCONV_CONFIG";

/// Config file used when [`CONFIG_ENV`] is unset
pub const DEFAULT_CONFIG_PATH: &str = "wxconv.toml";

/// Largest accepted fixed offset, in seconds either side of UTC
const MAX_UTC_OFFSET: u32 = 18 * 3600;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TimeConfig {
    /// Use `T` between date and time
    pub iso_separator: Option<bool>,
    /// Format and parse in UTC
    pub utc: Option<bool>,
    /// Fixed local offset in seconds east of UTC, replacing the system zone
    pub utc_offset: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OutputConfig {
    /// Decimal places for converted values
    pub precision: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    pub time: Option<TimeConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("utc_offset {0} is outside +/-{} seconds", MAX_UTC_OFFSET)]
    OffsetOutOfRange(i32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl AppConfig {
    /// Load from the WXCONV_CONFIG path (TOML) if present, with defaults otherwise
    pub fn load() -> ConfigResult<Self> {
        let path =
            std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(AppConfig::default());
        }
        let s = fs::read_to_string(path)?;
        let cfg = Self::from_toml(&s)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(cfg)
    }

    pub fn from_toml(s: &str) -> ConfigResult<Self> {
        let cfg = toml::from_str::<AppConfig>(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> ConfigResult<()> {
        match self.utc_offset() {
            Some(offset) if offset.unsigned_abs() > MAX_UTC_OFFSET => {
                Err(ConfigError::OffsetOutOfRange(offset))
            }
            _ => Ok(()),
        }
    }

    /// `T` separator for formatted timestamps (default false)
    pub fn iso_separator(&self) -> bool {
        self.time
            .as_ref()
            .and_then(|t| t.iso_separator)
            .unwrap_or(false)
    }

    /// Work in UTC rather than local time (default false)
    pub fn utc(&self) -> bool {
        self.time.as_ref().and_then(|t| t.utc).unwrap_or(false)
    }

    /// Fixed offset replacing the system zone, if configured
    pub fn utc_offset(&self) -> Option<i32> {
        self.time.as_ref().and_then(|t| t.utc_offset)
    }

    /// Decimal places for converted values; `None` prints the full value
    pub fn precision(&self) -> Option<usize> {
        self.output.as_ref().and_then(|o| o.precision)
    }
}
