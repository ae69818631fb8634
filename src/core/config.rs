use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::analyzers::traits::AnalyzerOptions;
use crate::utils::fs::find_upwards;

pub const CONFIG_FILE: &str = ".editguard.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analyzers: AnalyzersConfig,
    pub autofix: bool,
    pub unsafe_fixes: bool,
    pub verify: bool,
    pub rollback_on_regression: bool,
    pub timeout_ms: u64,
    pub biome: BiomeConfig,
    pub typescript: TypeScriptConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzersConfig {
    pub biome: bool,
    pub typescript: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeConfig {
    pub binary: String,
    pub config_path: Option<PathBuf>,
    /// Pins the major version instead of probing, e.g. `"1"` or `"2.0.0"`.
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeScriptConfig {
    pub binary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analyzers: AnalyzersConfig::default(),
            autofix: false,
            unsafe_fixes: false,
            verify: true,
            rollback_on_regression: false,
            timeout_ms: 5_000,
            biome: BiomeConfig::default(),
            typescript: TypeScriptConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for AnalyzersConfig {
    fn default() -> Self {
        Self {
            biome: true,
            typescript: true,
        }
    }
}

impl Default for BiomeConfig {
    fn default() -> Self {
        Self {
            binary: "biome".to_string(),
            config_path: None,
            version: None,
        }
    }
}

impl Default for TypeScriptConfig {
    fn default() -> Self {
        Self {
            binary: "tsc".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_entries: 100,
        }
    }
}

impl Config {
    /// Finds `.editguard.yml` next to `start` or in any ancestor. A missing
    /// file gives the defaults; a broken one is reported and ignored.
    pub fn discover(start: &Path) -> Self {
        let Some(path) = find_upwards(start, CONFIG_FILE) else {
            return Config::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!(target: "editguard::config", error = %err, "using default configuration");
                Config::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn analyzer_options(&self) -> AnalyzerOptions {
        AnalyzerOptions {
            auto_fix: self.autofix,
            config_path: self.biome.config_path.clone(),
            unsafe_fixes: self.unsafe_fixes,
        }
    }
}
