use interco_core::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse matching config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid matching config: {0}")]
    Invalid(String),
}

/// Relative weight of each score component. Normalised by their sum, so
/// `{1, 1, 1}` means equal thirds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub amount: f64,
    pub date: f64,
    pub text: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            amount: 0.5,
            date: 0.2,
            text: 0.3,
        }
    }
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.amount + self.date + self.text
    }

    pub fn normalized(&self) -> Weights {
        let sum = self.sum();
        Weights {
            amount: self.amount / sum,
            date: self.date / sum,
            text: self.text / sum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Largest |debit - credit| still treated as the same transfer.
    pub amount_tolerance: Decimal,
    /// Pairs further apart than this are never candidates.
    pub date_window_days: i64,
    pub weights: Weights,
    /// Pairs scoring below this are dropped before assignment.
    pub min_score: f64,
    /// Only pair rows whose ledgers mirror each other (A's ledger against B
    /// with B's ledger against A). When off, any two different companies pair.
    pub strict_counterparty: bool,
    /// Never propose a lender/borrower pairing an operator already rejected.
    pub suppress_rejected_pairs: bool,
    pub extra_stop_words: Vec<String>,
    pub boost_keywords: Vec<String>,
    pub boost_per_keyword: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: Decimal::ZERO,
            date_window_days: 45,
            weights: Weights::default(),
            min_score: 0.0,
            strict_counterparty: false,
            suppress_rejected_pairs: false,
            extra_stop_words: Vec::new(),
            boost_keywords: Vec::new(),
            boost_per_keyword: 0.1,
        }
    }
}

impl MatchConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: MatchConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn tolerance(&self) -> Money {
        Money::from_decimal(self.amount_tolerance)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.weights;
        for (name, value) in [("amount", w.amount), ("date", w.date), ("text", w.text)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "weight '{name}' must be a non-negative number, got {value}"
                )));
            }
        }
        if w.sum() <= 0.0 {
            return Err(ConfigError::Invalid(
                "at least one weight must be positive".to_string(),
            ));
        }
        if !w.sum().is_finite() {
            return Err(ConfigError::Invalid(format!(
                "weights must have a finite sum, got {}",
                w.sum()
            )));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(ConfigError::Invalid(format!(
                "min_score must be within [0, 1], got {}",
                self.min_score
            )));
        }
        if self.amount_tolerance < Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "amount_tolerance cannot be negative, got {}",
                self.amount_tolerance
            )));
        }
        if self.date_window_days < 0 {
            return Err(ConfigError::Invalid(format!(
                "date_window_days cannot be negative, got {}",
                self.date_window_days
            )));
        }
        if !self.boost_per_keyword.is_finite() || self.boost_per_keyword < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "boost_per_keyword must be a non-negative number, got {}",
                self.boost_per_keyword
            )));
        }
        Ok(())
    }
}
