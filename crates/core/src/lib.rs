pub mod company;
pub mod error;
pub mod matching;
pub mod money;
pub mod period;
pub mod transaction;

pub use company::{CompanyPair, PairScope, PairSource, Scope, ScopeRequest, UploadPair};
pub use error::ReconError;
pub use matching::{
    Decision, Match, MatchId, MatchLeg, MatchStatus, MatchView, ScoreBreakdown,
};
pub use money::Money;
pub use period::{parse_month, Period};
pub use transaction::{Role, Transaction, TRANSACTION_COLUMNS};
