//! Analysis configuration.
//!
//! Settings live in a TOML file with kebab-case keys, all optional:
//!
//! ```toml
//! duration-ceiling-us = 60000000
//! window-secs = 900
//! runs = 3
//! protocols = ["rest", "grpc", "RabbitMQ async"]
//! output-dir = "results"
//! ```
//!
//! The file is located, in order, from the `--config` flag, the
//! `TRACELAT_CONFIG_PATH` environment variable, or the platform config
//! directory (`~/.config/tracelat/config.toml` on Linux and macOS).

use std::path::{Path, PathBuf};
use std::time::Duration;

use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};
use serde::{Deserialize, Serialize};

use crate::trace::{DEFAULT_DURATION_CEILING, Protocol};

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "TRACELAT_CONFIG_PATH";

/// Length of one benchmark run's measurement window, in seconds.
pub const DEFAULT_WINDOW_SECS: u64 = 900;

pub const DEFAULT_RUNS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Requests slower than this many microseconds are failures.
    pub duration_ceiling_us: u64,
    /// Measurement window used for requests/sec.
    pub window_secs: u64,
    /// Runs per experiment, numbered from 1.
    pub runs: u32,
    /// Protocols processed by `tracelat run` when none are given.
    pub protocols: Vec<Protocol>,
    /// Where per-run bucket files go; defaults to the working directory.
    pub output_dir: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            duration_ceiling_us: DEFAULT_DURATION_CEILING,
            window_secs: DEFAULT_WINDOW_SECS,
            runs: DEFAULT_RUNS,
            protocols: Protocol::ALL.to_vec(),
            output_dir: None,
        }
    }
}

impl AnalysisConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Load configuration, falling back to defaults when no file exists.
    ///
    /// An explicitly passed path must exist; the environment and platform
    /// locations are optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }
        let env_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        match env_path.or_else(default_config_path) {
            Some(path) if path.exists() => Self::load_from_path(&path),
            Some(path) => {
                log::debug!("No config at {}; using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AnalysisConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Platform config location: XDG on Linux and macOS, `%APPDATA%` on Windows.
pub fn default_config_path() -> Option<PathBuf> {
    let strategy = choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("tracelat").join("config.toml"))
}
