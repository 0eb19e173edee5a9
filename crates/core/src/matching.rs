use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ReconError;
use super::transaction::{Role, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchId(pub i64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Suggested,
    Confirmed,
    Rejected,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Suggested => "suggested",
            MatchStatus::Confirmed => "confirmed",
            MatchStatus::Rejected => "rejected",
        }
    }

    /// Active matches hold both member transactions out of candidacy.
    pub fn is_active(self) -> bool {
        matches!(self, MatchStatus::Suggested | MatchStatus::Confirmed)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "suggested" => Ok(MatchStatus::Suggested),
            "confirmed" => Ok(MatchStatus::Confirmed),
            "rejected" => Ok(MatchStatus::Rejected),
            other => Err(format!("Unknown match status: '{other}'")),
        }
    }
}

/// Operator verdict on a suggested match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    pub fn target(self) -> MatchStatus {
        match self {
            Decision::Accept => MatchStatus::Confirmed,
            Decision::Reject => MatchStatus::Rejected,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Accept => write!(f, "accept"),
            Decision::Reject => write!(f, "reject"),
        }
    }
}

/// Per-component breakdown of a pair's confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub total: f64,
    pub amount: f64,
    pub date: f64,
    pub text: f64,
    pub date_gap_days: i64,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: Option<MatchId>,
    pub lender_uid: String,
    pub borrower_uid: String,
    pub match_score: f64,
    pub amount_score: f64,
    pub date_score: f64,
    pub text_score: f64,
    pub date_gap_days: i64,
    pub matched_keywords: Vec<String>,
    pub status: MatchStatus,
    pub confirmed_by: Option<String>,
    pub run_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn suggested(
        lender_uid: &str,
        borrower_uid: &str,
        score: ScoreBreakdown,
        run_id: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Match {
            id: None,
            lender_uid: lender_uid.to_string(),
            borrower_uid: borrower_uid.to_string(),
            match_score: score.total,
            amount_score: score.amount,
            date_score: score.date,
            text_score: score.text,
            date_gap_days: score.date_gap_days,
            matched_keywords: score.keywords,
            status: MatchStatus::Suggested,
            confirmed_by: None,
            run_id,
            created_at,
            decided_at: None,
        }
    }

    /// Applies an operator decision made through `uid`, either leg of the
    /// match. Only suggested matches move; every other state is terminal.
    pub fn decide(
        &mut self,
        uid: &str,
        decision: Decision,
        confirmed_by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ReconError> {
        let confirmed_by = confirmed_by.trim();
        if confirmed_by.is_empty() {
            return Err(ReconError::validation("confirmed_by is required"));
        }
        if self.status != MatchStatus::Suggested {
            return Err(ReconError::InvalidState {
                uid: uid.to_string(),
                match_id: self.id.map(|id| id.0).unwrap_or_default(),
                status: self.status,
            });
        }
        self.status = decision.target();
        self.confirmed_by = Some(confirmed_by.to_string());
        self.decided_at = Some(at);
        Ok(())
    }
}

/// A member transaction tagged with its role in the match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchLeg {
    pub role: Role,
    pub transaction: Transaction,
}

/// A match joined with both of its transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchView {
    #[serde(rename = "match")]
    pub record: Match,
    pub lender: MatchLeg,
    pub borrower: MatchLeg,
}

impl MatchView {
    pub fn new(record: Match, lender: Transaction, borrower: Transaction) -> Self {
        MatchView {
            record,
            lender: MatchLeg {
                role: Role::Lender,
                transaction: lender,
            },
            borrower: MatchLeg {
                role: Role::Borrower,
                transaction: borrower,
            },
        }
    }
}
