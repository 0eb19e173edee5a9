use thiserror::Error;

use crate::matching::MatchStatus;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Match {match_id} for {uid} is {status}; only suggested matches can be decided")]
    InvalidState {
        uid: String,
        match_id: i64,
        status: MatchStatus,
    },
    #[error("Transaction {uid} failed integrity check: {reason}")]
    DataIntegrity { uid: String, reason: String },
}

impl ReconError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ReconError::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ReconError::NotFound(what.into())
    }
}
