pub mod assign;
pub mod candidate;
pub mod config;
pub mod engine;
pub mod scorer;
pub mod tokens;

pub use candidate::{CandidateGroup, Candidates, PairingRules};
pub use config::{ConfigError, MatchConfig, Weights};
pub use engine::{EngineOutcome, MatchEngine};
pub use scorer::{ScoredPair, Scorer};
pub use tokens::Tokenizer;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use interco_core::{Money, Period, Transaction};

    pub fn row(
        uid: &str,
        company: &str,
        counterparty: &str,
        debit_cents: i64,
        credit_cents: i64,
        date: (i32, u32, u32),
        particulars: &str,
    ) -> Transaction {
        let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        Transaction {
            uid: uid.to_string(),
            company: company.to_string(),
            counterparty: counterparty.to_string(),
            date,
            particulars: particulars.to_string(),
            voucher_type: None,
            voucher_no: None,
            debit: Money::from_cents(debit_cents),
            credit: Money::from_cents(credit_cents),
            period: Period::of(date),
            entered_by: None,
            upload_pair_id: None,
        }
    }
}
