//! Configuration loading and parsing.
//!
//! Parses `mapper.toml` (or an override path supplied by the binary):
//! the data directory, the persistence directory, the loader's progress
//! throttle, and a fallback log filter. Unknown fields are ignored (TOML
//! deserialization tolerance) so the file can grow without breaking older
//! builds, and a malformed file degrades to defaults rather than aborting
//! startup.
//!
//! The raw parsed throttle is retained; the clamped effective value is
//! computed in `Config::apply_limits` so later re-clamps (e.g. a changed
//! ceiling) can start from the original number.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};
use tracing::info;

/// Upper bound for the progress throttle: beyond one second a progress
/// bar reads as stalled.
pub const MAX_PROGRESS_THROTTLE_MS: u64 = 1000;

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "DataConfig::default_dir")]
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
        }
    }
}

impl DataConfig {
    fn default_dir() -> PathBuf {
        PathBuf::from("data")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "StorageConfig::default_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
        }
    }
}

impl StorageConfig {
    fn default_dir() -> PathBuf {
        PathBuf::from(".mapper")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    #[serde(default = "LoaderConfig::default_throttle_ms")]
    pub progress_throttle_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            progress_throttle_ms: Self::default_throttle_ms(),
        }
    }
}

impl LoaderConfig {
    const fn default_throttle_ms() -> u64 {
        100
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct LogConfig {
    /// EnvFilter directive used when `RUST_LOG` is unset.
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>,          // original file string (optional)
    pub file: ConfigFile,             // parsed (or default) data
    pub effective_throttle_ms: u64,   // clamped loader throttle
}

/// Best-effort config path: working directory first, then the platform
/// config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("mapper.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("mapper").join("mapper.toml");
    }
    // Final fallback relative filename.
    PathBuf::from("mapper.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let mut config = if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Config {
                raw: Some(content),
                file,
                effective_throttle_ms: 0, // computed below
            },
            // On parse error fall back to defaults; the session must start.
            Err(_e) => Config::default(),
        }
    } else {
        Config::default()
    };
    config.apply_limits();
    Ok(config)
}

impl Config {
    /// Clamp raw values into their operating bands. Returns the effective
    /// throttle in milliseconds.
    pub fn apply_limits(&mut self) -> u64 {
        let raw = self.file.loader.progress_throttle_ms;
        let clamped = raw.min(MAX_PROGRESS_THROTTLE_MS);
        if clamped != raw {
            info!(
                target: "config",
                raw,
                clamped,
                max = MAX_PROGRESS_THROTTLE_MS,
                "progress_throttle_clamped"
            );
        }
        self.effective_throttle_ms = clamped;
        clamped
    }

    pub fn progress_throttle(&self) -> Duration {
        Duration::from_millis(self.effective_throttle_ms)
    }
}
