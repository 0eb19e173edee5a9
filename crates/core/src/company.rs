use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ReconError;
use super::period::Period;
use super::transaction::Transaction;

/// Where a company pair listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairSource {
    /// Canonical pair derived from stored rows.
    Stored,
    /// Directional pair found by scanning ledger owners and counterparties.
    Detected,
    /// Declared by an operator.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyPair {
    pub lender_company: String,
    pub borrower_company: String,
    pub month: u32,
    pub year: i32,
    pub description: String,
    pub transaction_count: i64,
    pub source: PairSource,
    /// The same relationship seen from the other ledger, for detected pairs.
    pub opposite: Option<Box<CompanyPair>>,
}

impl CompanyPair {
    pub fn new(
        lender_company: &str,
        borrower_company: &str,
        period: Period,
        transaction_count: i64,
        source: PairSource,
    ) -> Self {
        CompanyPair {
            lender_company: lender_company.to_string(),
            borrower_company: borrower_company.to_string(),
            month: period.month,
            year: period.year,
            description: format!("{lender_company} ↔ {borrower_company} ({period})"),
            transaction_count,
            source,
            opposite: None,
        }
    }

    /// Run scope covering this pair.
    pub fn scope(&self) -> PairScope {
        PairScope {
            lender_company: self.lender_company.clone(),
            borrower_company: self.borrower_company.clone(),
            period: Period {
                year: self.year,
                month: self.month,
            },
        }
    }
}

/// A fully specified company pair and statement period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairScope {
    pub lender_company: String,
    pub borrower_company: String,
    pub period: Period,
}

impl fmt::Display for PairScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ↔ {} ({})",
            self.lender_company, self.borrower_company, self.period
        )
    }
}

impl PairScope {
    /// Whether a row belongs to this relationship (either ledger) and period.
    pub fn covers(&self, tx: &Transaction) -> bool {
        let forward = tx.company == self.lender_company && tx.counterparty == self.borrower_company;
        let reverse = tx.company == self.borrower_company && tx.counterparty == self.lender_company;
        (forward || reverse) && tx.period == self.period
    }
}

/// Scope of a reconciliation run or listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    /// The whole store.
    #[default]
    All,
    Pair(PairScope),
    /// Rows ingested under one upload pair id.
    Upload { pair_id: String },
}

impl Scope {
    pub fn covers(&self, tx: &Transaction) -> bool {
        match self {
            Scope::All => true,
            Scope::Pair(pair) => pair.covers(tx),
            Scope::Upload { pair_id } => tx.upload_pair_id.as_deref() == Some(pair_id.as_str()),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => write!(f, "all company pairs"),
            Scope::Pair(pair) => write!(f, "{pair}"),
            Scope::Upload { pair_id } => write!(f, "upload {pair_id}"),
        }
    }
}

/// Loosely typed scope as it arrives from a caller. Either every field is
/// present or none is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRequest {
    pub lender_company: Option<String>,
    pub borrower_company: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl ScopeRequest {
    pub fn pair(lender_company: &str, borrower_company: &str, month: u32, year: i32) -> Self {
        ScopeRequest {
            lender_company: Some(lender_company.to_string()),
            borrower_company: Some(borrower_company.to_string()),
            month: Some(month),
            year: Some(year),
        }
    }

    pub fn validate(self) -> Result<Scope, ReconError> {
        let ScopeRequest {
            lender_company,
            borrower_company,
            month,
            year,
        } = self;
        match (lender_company, borrower_company, month, year) {
            (None, None, None, None) => Ok(Scope::All),
            (Some(lender), Some(borrower), Some(month), Some(year)) => {
                let lender = lender.trim().to_string();
                let borrower = borrower.trim().to_string();
                if lender.is_empty() || borrower.is_empty() {
                    return Err(ReconError::validation("company names cannot be blank"));
                }
                if lender == borrower {
                    return Err(ReconError::validation(format!(
                        "lender and borrower company are both '{lender}'"
                    )));
                }
                let period = Period::new(month, year).ok_or_else(|| {
                    ReconError::validation(format!("month must be 1-12, got {month}"))
                })?;
                Ok(Scope::Pair(PairScope {
                    lender_company: lender,
                    borrower_company: borrower,
                    period,
                }))
            }
            (lender, borrower, month, year) => {
                let missing: Vec<&str> = [
                    ("lender_company", lender.is_none()),
                    ("borrower_company", borrower.is_none()),
                    ("month", month.is_none()),
                    ("year", year.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(ReconError::validation(format!(
                    "partial scope: missing {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

/// Two ledger files ingested together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadPair {
    pub pair_id: String,
    pub filenames: [String; 2],
    pub upload_date: DateTime<Utc>,
    pub record_count: i64,
}
