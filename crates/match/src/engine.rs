use std::collections::HashSet;

use interco_core::{ReconError, Scope, Transaction};
use tracing::debug;

use crate::assign::resolve;
use crate::candidate::{generate, Candidates, PairingRules};
use crate::config::MatchConfig;
use crate::scorer::{ScoredPair, Scorer};

/// Result of one pass of the engine over a batch of transactions.
#[derive(Debug, Clone, Default)]
pub struct EngineOutcome<'a> {
    /// One-to-one assignment, best pair first.
    pub assignments: Vec<ScoredPair<'a>>,
    pub processed: usize,
    /// Lender/borrower combinations that reached the scorer.
    pub candidate_pairs: usize,
    /// Combinations that survived the amount and date filters.
    pub scored_pairs: usize,
    pub unqualified: Vec<&'a Transaction>,
    pub skipped: Vec<(&'a Transaction, ReconError)>,
}

impl EngineOutcome<'_> {
    /// Transactions newly paired by this pass.
    pub fn matched(&self) -> usize {
        self.assignments.len() * 2
    }
}

/// Candidate generation, scoring and assignment wired together. Holds no
/// state between calls.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    config: MatchConfig,
    scorer: Scorer,
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(MatchConfig::default())
    }
}

impl MatchEngine {
    /// Expects a validated config.
    pub fn new(config: MatchConfig) -> Self {
        let scorer = Scorer::new(&config);
        Self { config, scorer }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    fn rules(&self, rejected: &HashSet<(String, String)>) -> PairingRules {
        PairingRules {
            strict_counterparty: self.config.strict_counterparty,
            blocked: if self.config.suppress_rejected_pairs {
                rejected.clone()
            } else {
                HashSet::new()
            },
        }
    }

    pub fn candidates<'a>(
        &self,
        transactions: &'a [Transaction],
        scope: &Scope,
        active: &HashSet<String>,
        rejected: &HashSet<(String, String)>,
    ) -> Candidates<'a> {
        generate(transactions, scope, active, &self.rules(rejected))
    }

    /// Every pair that passes the hard filters, unordered.
    pub fn scored_candidates<'a>(&self, candidates: &Candidates<'a>) -> Vec<ScoredPair<'a>> {
        candidates
            .groups
            .iter()
            .flat_map(|group| {
                group
                    .borrowers
                    .iter()
                    .filter_map(move |borrower| self.scorer.score_pair(group.lender, borrower))
            })
            .collect()
    }

    /// Runs generation, scoring and assignment over `transactions`.
    ///
    /// `active` holds uids that already sit in a suggested or confirmed
    /// match; `rejected` holds (lender, borrower) pairings an operator turned
    /// down, used only when `suppress_rejected_pairs` is set.
    pub fn reconcile<'a>(
        &self,
        transactions: &'a [Transaction],
        scope: &Scope,
        active: &HashSet<String>,
        rejected: &HashSet<(String, String)>,
    ) -> EngineOutcome<'a> {
        let candidates = self.candidates(transactions, scope, active, rejected);
        let candidate_pairs = candidates.pair_count();
        let scored = self.scored_candidates(&candidates);
        let scored_pairs = scored.len();
        debug!(
            lenders = candidates.groups.len(),
            candidate_pairs,
            scored_pairs,
            "scored candidate pairs"
        );
        let assignments = resolve(scored);

        EngineOutcome {
            assignments,
            processed: candidates.processed,
            candidate_pairs,
            scored_pairs,
            unqualified: candidates.unqualified,
            skipped: candidates.skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::row;

    fn none() -> (HashSet<String>, HashSet<(String, String)>) {
        (HashSet::new(), HashSet::new())
    }

    #[test]
    fn suggests_obvious_pair() {
        let engine = MatchEngine::default();
        let txs = vec![
            row("A1", "Steel", "GeoTex", 100_000, 0, (2024, 1, 10), "loan transfer"),
            row("B1", "GeoTex", "Steel", 0, 100_000, (2024, 1, 11), "loan transfer"),
        ];
        let (active, rejected) = none();
        let out = engine.reconcile(&txs, &Scope::All, &active, &rejected);
        assert_eq!(out.assignments.len(), 1);
        assert!(out.assignments[0].score.total >= 0.9);
        assert_eq!(out.matched(), 2);
        assert_eq!(out.processed, 2);
    }

    #[test]
    fn off_by_one_unit_is_never_a_candidate() {
        let engine = MatchEngine::default();
        let txs = vec![
            row("A1", "Steel", "GeoTex", 100_000, 0, (2024, 1, 10), "loan transfer"),
            row("B1", "GeoTex", "Steel", 0, 99_900, (2024, 1, 10), "loan transfer"),
        ];
        let (active, rejected) = none();
        let candidates = engine.candidates(&txs, &Scope::All, &active, &rejected);
        assert!(engine.scored_candidates(&candidates).is_empty());

        let out = engine.reconcile(&txs, &Scope::All, &active, &rejected);
        assert!(out.assignments.is_empty());
        assert_eq!(out.candidate_pairs, 1);
        assert_eq!(out.scored_pairs, 0);
    }

    #[test]
    fn rejected_pairings_only_suppressed_when_configured() {
        let txs = vec![
            row("A1", "Steel", "GeoTex", 100_000, 0, (2024, 1, 10), "loan"),
            row("B1", "GeoTex", "Steel", 0, 100_000, (2024, 1, 10), "loan"),
        ];
        let active = HashSet::new();
        let rejected: HashSet<(String, String)> = [("A1".to_string(), "B1".to_string())].into();

        let default_engine = MatchEngine::default();
        assert_eq!(
            default_engine
                .reconcile(&txs, &Scope::All, &active, &rejected)
                .assignments
                .len(),
            1
        );

        let suppressing = MatchEngine::new(MatchConfig {
            suppress_rejected_pairs: true,
            ..Default::default()
        });
        assert!(suppressing
            .reconcile(&txs, &Scope::All, &active, &rejected)
            .assignments
            .is_empty());
    }

    #[test]
    fn malformed_rows_are_counted_not_fatal() {
        let engine = MatchEngine::default();
        let txs = vec![
            row("A1", "Steel", "GeoTex", 500, 0, (2024, 1, 10), "loan"),
            row("B1", "GeoTex", "Steel", 0, 500, (2024, 1, 10), "loan"),
            row("X1", "GeoTex", "Steel", 500, 500, (2024, 1, 10), "loan"),
            row("X2", "GeoTex", "Steel", 0, 0, (2024, 1, 10), "narration only"),
        ];
        let (active, rejected) = none();
        let out = engine.reconcile(&txs, &Scope::All, &active, &rejected);
        assert_eq!(out.assignments.len(), 1);
        assert_eq!(out.processed, 4);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.unqualified.len(), 1);
    }

    #[test]
    fn second_pass_over_leftovers_finds_nothing() {
        let engine = MatchEngine::default();
        let txs = vec![
            row("A1", "Steel", "GeoTex", 500, 0, (2024, 1, 10), "loan"),
            row("A2", "Steel", "GeoTex", 500, 0, (2024, 1, 10), "loan"),
            row("B1", "GeoTex", "Steel", 0, 500, (2024, 1, 10), "loan"),
        ];
        let (mut active, rejected) = none();
        let first = engine.reconcile(&txs, &Scope::All, &active, &rejected);
        assert_eq!(first.assignments.len(), 1);
        for p in &first.assignments {
            active.insert(p.lender.uid.clone());
            active.insert(p.borrower.uid.clone());
        }
        let second = engine.reconcile(&txs, &Scope::All, &active, &rejected);
        assert!(second.assignments.is_empty());
        assert_eq!(second.processed, 1);
    }
}
