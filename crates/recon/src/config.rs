use std::path::{Path, PathBuf};

use interco_match::{ConfigError, MatchConfig};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A relationship an operator declares up front, in addition to the ones
/// found in the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualPair {
    pub lender: String,
    pub borrower: String,
}

/// Service configuration, read from TOML.
///
/// ```toml
/// database_path = "interco.db"
///
/// [matching]
/// amount_tolerance = "0.50"
/// date_window_days = 30
///
/// [matching.weights]
/// amount = 0.5
/// date = 0.2
/// text = 0.3
///
/// [[manual_pairs]]
/// lender = "Steel"
/// borrower = "GeoTex"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub database_path: PathBuf,
    pub matching: MatchConfig,
    pub manual_pairs: Vec<ManualPair>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("interco.db"),
            matching: MatchConfig::default(),
            manual_pairs: Vec::new(),
        }
    }
}

impl ReconConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: ReconConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_toml(&content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.matching.validate()?;
        for pair in &self.manual_pairs {
            let lender = pair.lender.trim();
            let borrower = pair.borrower.trim();
            if lender.is_empty() || borrower.is_empty() {
                return Err(ConfigError::Invalid(
                    "manual pair company names cannot be blank".to_string(),
                ));
            }
            if lender == borrower {
                return Err(ConfigError::Invalid(format!(
                    "manual pair pairs '{lender}' with itself"
                )));
            }
        }
        Ok(())
    }
}
