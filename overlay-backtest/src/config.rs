//! Application configuration.
//!
//! TOML file with `[backtest]`, `[output]` and `[sweep]` tables. Every field
//! has a default, so an empty file is valid. Dates are quoted strings
//! (`start_date = "2024-01-02"`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backtest::BacktestConfig;
use crate::sweep::SweepGrid;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Where the output tables go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub levels_path: PathBuf,
    pub decomposition_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            levels_path: PathBuf::from("strategy_levels.csv"),
            decomposition_path: PathBuf::from("portfolio_decomposition.csv"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backtest: BacktestConfig,
    pub output: OutputConfig,
    pub sweep: SweepGrid,
}

impl AppConfig {
    /// Load config from TOML file.
    pub fn from_toml(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
