use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use interco_core::{
    CompanyPair, Decision, Match, MatchStatus, MatchView, Period, ReconError, Scope,
    ScopeRequest, Transaction, UploadPair,
};
use interco_match::{MatchConfig, MatchEngine};
use interco_storage::{DbPool, StoreError};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{ManualPair, ReconConfig};
use crate::error::Error;
use crate::{lifecycle, pairs};

/// Counts describing what a run looked at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// In-scope transactions without an active match.
    pub processed: usize,
    /// Transactions newly placed in a suggested match, two per match.
    pub matched: usize,
    /// Transactions with neither a debit nor a credit.
    pub unqualified: usize,
    /// Transactions that failed the integrity check.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub scope: Scope,
    pub new_match_count: usize,
    pub summary: RunSummary,
    /// The suggestions this run created, best first.
    pub matches: Vec<Match>,
}

/// Entry point for every reconciliation operation.
///
/// Cheap to clone; clones share the pool and the write lock. Runs and
/// decisions are serialized by that lock, reads go straight to the pool.
#[derive(Clone)]
pub struct Reconciler {
    pool: DbPool,
    engine: Arc<MatchEngine>,
    manual_pairs: Arc<[ManualPair]>,
    write_lock: Arc<Mutex<()>>,
}

impl Reconciler {
    /// Expects a validated config.
    pub fn new(pool: DbPool, matching: MatchConfig) -> Self {
        Self {
            pool,
            engine: Arc::new(MatchEngine::new(matching)),
            manual_pairs: Arc::from(Vec::new()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_manual_pairs(mut self, manual_pairs: Vec<ManualPair>) -> Self {
        self.manual_pairs = Arc::from(manual_pairs);
        self
    }

    /// Opens the store named by `config` and builds a reconciler over it.
    pub async fn open(config: &ReconConfig) -> Result<Self, Error> {
        config.validate()?;
        let pool = interco_storage::create_db(&config.database_path)
            .await
            .map_err(StoreError::from)?;
        Ok(Self::new(pool, config.matching.clone()).with_manual_pairs(config.manual_pairs.clone()))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn config(&self) -> &MatchConfig {
        self.engine.config()
    }

    /// Reconciles everything, or one company pair and period when the
    /// request names all four scope fields.
    pub async fn run_reconciliation(&self, request: ScopeRequest) -> Result<RunReport, Error> {
        let scope = request.validate()?;
        self.run(scope).await
    }

    /// Reconciles the rows ingested under one upload pair.
    pub async fn run_upload_pair(&self, pair_id: &str) -> Result<RunReport, Error> {
        let scope = self.upload_scope(pair_id).await?;
        self.run(scope).await
    }

    async fn upload_scope(&self, pair_id: &str) -> Result<Scope, Error> {
        let pair = self.get_upload_pair(pair_id).await?;
        Ok(Scope::Upload {
            pair_id: pair.pair_id,
        })
    }

    async fn run(&self, scope: Scope) -> Result<RunReport, Error> {
        let _guard = self.write_lock.lock().await;
        let run_id = Uuid::new_v4().to_string();

        let transactions = interco_storage::list_transactions(&self.pool, &scope).await?;
        let active = interco_storage::active_uids(&self.pool).await?;
        let rejected = if self.engine.config().suppress_rejected_pairs {
            interco_storage::rejected_pairs(&self.pool).await?
        } else {
            HashSet::new()
        };

        let outcome = self
            .engine
            .reconcile(&transactions, &scope, &active, &rejected);
        for (tx, err) in &outcome.skipped {
            warn!(run_id = %run_id, uid = %tx.uid, error = %err, "skipping transaction");
        }

        let created_at = Utc::now();
        let suggestions: Vec<Match> = outcome
            .assignments
            .iter()
            .map(|p| {
                Match::suggested(
                    &p.lender.uid,
                    &p.borrower.uid,
                    p.score.clone(),
                    Some(run_id.clone()),
                    created_at,
                )
            })
            .collect();
        let stored = interco_storage::insert_matches(&self.pool, &suggestions).await?;

        let summary = RunSummary {
            processed: outcome.processed,
            matched: outcome.matched(),
            unqualified: outcome.unqualified.len(),
            skipped: outcome.skipped.len(),
        };
        info!(
            run_id = %run_id,
            scope = %scope,
            new_matches = stored.len(),
            processed = summary.processed,
            unqualified = summary.unqualified,
            skipped = summary.skipped,
            "reconciliation run finished"
        );

        Ok(RunReport {
            run_id,
            scope,
            new_match_count: stored.len(),
            summary,
            matches: stored,
        })
    }

    /// Matches in scope, optionally filtered by status, highest score first.
    pub async fn list_matches(
        &self,
        request: ScopeRequest,
        status: Option<MatchStatus>,
    ) -> Result<Vec<MatchView>, Error> {
        let scope = request.validate()?;
        Ok(interco_storage::list_match_views(&self.pool, &scope, status).await?)
    }

    /// Transactions in scope that no suggested or confirmed match holds.
    pub async fn list_unmatched(&self, request: ScopeRequest) -> Result<Vec<Transaction>, Error> {
        let scope = request.validate()?;
        Ok(interco_storage::list_unmatched(&self.pool, &scope).await?)
    }

    /// Matches with at least one leg ingested under the upload pair.
    pub async fn list_upload_pair_matches(
        &self,
        pair_id: &str,
        status: Option<MatchStatus>,
    ) -> Result<Vec<MatchView>, Error> {
        let scope = self.upload_scope(pair_id).await?;
        Ok(interco_storage::list_match_views(&self.pool, &scope, status).await?)
    }

    /// Every row ingested under the upload pair, ordered by uid.
    pub async fn list_upload_pair_transactions(&self, pair_id: &str) -> Result<Vec<Transaction>, Error> {
        let scope = self.upload_scope(pair_id).await?;
        Ok(interco_storage::list_transactions(&self.pool, &scope).await?)
    }

    pub async fn list_unmatched_by_upload_pair(&self, pair_id: &str) -> Result<Vec<Transaction>, Error> {
        let scope = self.upload_scope(pair_id).await?;
        Ok(interco_storage::list_unmatched(&self.pool, &scope).await?)
    }

    pub async fn accept_match(&self, uid: &str, confirmed_by: &str) -> Result<Match, Error> {
        let _guard = self.write_lock.lock().await;
        lifecycle::decide(&self.pool, uid, Decision::Accept, confirmed_by).await
    }

    /// Rejecting frees both transactions for later runs.
    pub async fn reject_match(&self, uid: &str, confirmed_by: &str) -> Result<Match, Error> {
        let _guard = self.write_lock.lock().await;
        lifecycle::decide(&self.pool, uid, Decision::Reject, confirmed_by).await
    }

    pub async fn list_company_pairs(&self) -> Result<Vec<CompanyPair>, Error> {
        pairs::company_pairs(&self.pool).await
    }

    pub async fn list_detected_pairs(&self) -> Result<Vec<CompanyPair>, Error> {
        pairs::detected_pairs(&self.pool).await
    }

    pub async fn list_manual_pairs(&self) -> Result<Vec<CompanyPair>, Error> {
        pairs::manual_pairs(&self.pool, &self.manual_pairs).await
    }

    /// Persists a declared relationship. Returns `false` if it was already
    /// declared.
    pub async fn declare_company_pair(&self, lender: &str, borrower: &str) -> Result<bool, Error> {
        let (lender, borrower) = (lender.trim(), borrower.trim());
        if lender.is_empty() || borrower.is_empty() {
            return Err(ReconError::validation("company names cannot be blank").into());
        }
        if lender == borrower {
            return Err(ReconError::validation(format!(
                "cannot pair '{lender}' with itself"
            ))
            .into());
        }
        let added = interco_storage::insert_declared_pair(&self.pool, lender, borrower).await?;
        info!(lender, borrower, added, "company pair declared");
        Ok(added)
    }

    /// Stores normalized ledger rows, optionally tagging them with an upload
    /// pair. Any invalid or duplicate row rejects the whole batch.
    pub async fn ingest_transactions(
        &self,
        mut records: Vec<Transaction>,
        upload_pair: Option<&str>,
    ) -> Result<u64, Error> {
        if let Some(pair_id) = upload_pair {
            let pair = self.get_upload_pair(pair_id).await?;
            for record in &mut records {
                record.upload_pair_id = Some(pair.pair_id.clone());
            }
        }
        for record in &records {
            validate_record(record)?;
        }

        let count = interco_storage::insert_transactions(&self.pool, &records).await?;
        info!(count, upload_pair = upload_pair.unwrap_or("-"), "transactions ingested");
        Ok(count)
    }

    /// Registers two ledger files as one upload and returns its new id.
    pub async fn register_upload_pair(&self, filenames: [String; 2]) -> Result<UploadPair, Error> {
        if filenames.iter().any(|f| f.trim().is_empty()) {
            return Err(ReconError::validation("upload pair needs two file names").into());
        }
        let upload_date = Utc::now();
        let pair = UploadPair {
            pair_id: new_pair_id(upload_date),
            filenames,
            upload_date,
            record_count: 0,
        };
        interco_storage::insert_upload_pair(&self.pool, &pair).await?;
        info!(pair_id = %pair.pair_id, "upload pair registered");
        Ok(pair)
    }

    pub async fn list_upload_pairs(&self) -> Result<Vec<UploadPair>, Error> {
        Ok(interco_storage::list_upload_pairs(&self.pool).await?)
    }

    pub async fn get_upload_pair(&self, pair_id: &str) -> Result<UploadPair, Error> {
        interco_storage::get_upload_pair(&self.pool, pair_id.trim())
            .await?
            .ok_or_else(|| ReconError::not_found(format!("upload pair {pair_id}")).into())
    }
}

fn new_pair_id(at: chrono::DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("pair_{}_{}", at.format("%Y%m%d_%H%M%S"), &suffix[..8])
}

fn validate_record(record: &Transaction) -> Result<(), ReconError> {
    if record.uid.trim().is_empty() {
        return Err(ReconError::validation("transaction uid is required"));
    }
    if record.company.trim().is_empty() || record.counterparty.trim().is_empty() {
        return Err(ReconError::validation(format!(
            "transaction {} needs both company and counterparty",
            record.uid
        )));
    }
    for (side, amount) in [("debit", record.debit), ("credit", record.credit)] {
        if amount.checked_cents().is_none() {
            return Err(ReconError::validation(format!(
                "transaction {} has an out-of-range {side} of {amount}",
                record.uid
            )));
        }
    }
    if Period::new(record.period.month, record.period.year).is_none() {
        return Err(ReconError::validation(format!(
            "transaction {} has invalid period {}/{}",
            record.uid, record.period.month, record.period.year
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_ids_follow_upload_format() {
        let at = chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
            .and_utc();
        let id = new_pair_id(at);
        assert!(id.starts_with("pair_20240115_093000_"), "{id}");
        assert_eq!(id.len(), "pair_20240115_093000_".len() + 8);
        assert!(id[21..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
