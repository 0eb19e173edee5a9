use std::collections::{BTreeSet, HashSet};

use interco_core::{Money, ScoreBreakdown, Transaction};

use crate::config::{MatchConfig, Weights};
use crate::tokens::{jaccard, normalize, references, Tokenizer};

/// A lender/borrower pair that survived the hard filters.
#[derive(Debug, Clone)]
pub struct ScoredPair<'a> {
    pub lender: &'a Transaction,
    pub borrower: &'a Transaction,
    pub score: ScoreBreakdown,
}

/// Scores candidate pairs. Amount and date act as hard filters; only pairs
/// passing both get a weighted confidence.
#[derive(Debug, Clone)]
pub struct Scorer {
    tolerance: Money,
    date_window_days: i64,
    weights: Weights,
    min_score: f64,
    tokenizer: Tokenizer,
    boost_keywords: HashSet<String>,
    boost_per_keyword: f64,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(&MatchConfig::default())
    }
}

impl Scorer {
    /// Expects a validated config.
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            tolerance: config.tolerance(),
            date_window_days: config.date_window_days,
            weights: config.weights.normalized(),
            min_score: config.min_score,
            tokenizer: Tokenizer::new(&config.extra_stop_words),
            boost_keywords: config
                .boost_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .collect(),
            boost_per_keyword: config.boost_per_keyword,
        }
    }

    pub fn score_pair<'a>(
        &self,
        lender: &'a Transaction,
        borrower: &'a Transaction,
    ) -> Option<ScoredPair<'a>> {
        self.score(lender, borrower).map(|score| ScoredPair {
            lender,
            borrower,
            score,
        })
    }

    /// Returns `None` when the pair fails the amount tolerance, the date
    /// window or the minimum score.
    pub fn score(&self, lender: &Transaction, borrower: &Transaction) -> Option<ScoreBreakdown> {
        if lender.debit.abs_diff(borrower.credit) > self.tolerance {
            return None;
        }

        let date_gap_days = (lender.date - borrower.date).num_days().abs();
        if date_gap_days > self.date_window_days {
            return None;
        }

        let amount = 1.0;
        let date = if self.date_window_days == 0 {
            1.0
        } else {
            1.0 - date_gap_days as f64 / self.date_window_days as f64
        };
        let (text, keywords) = self.text_score(&lender.particulars, &borrower.particulars);

        let total = (self.weights.amount * amount + self.weights.date * date + self.weights.text * text)
            .clamp(0.0, 1.0);
        if total < self.min_score {
            return None;
        }

        Some(ScoreBreakdown {
            total,
            amount,
            date,
            text,
            date_gap_days,
            keywords,
        })
    }

    /// Keyword overlap between two narrations, plus the shared keywords.
    ///
    /// A shared purchase-order or letter-of-credit reference, or identical
    /// narrations, count as a full text match.
    pub fn text_score(&self, a: &str, b: &str) -> (f64, Vec<String>) {
        let tokens_a = self.tokenizer.tokens(a);
        let tokens_b = self.tokenizer.tokens(b);
        let shared: BTreeSet<String> = tokens_a.intersection(&tokens_b).cloned().collect();

        let shared_refs: BTreeSet<String> = references(a)
            .intersection(&references(b))
            .cloned()
            .collect();
        if !shared_refs.is_empty() {
            let keywords = shared_refs.into_iter().chain(shared).collect();
            return (1.0, keywords);
        }

        let norm_a = normalize(a);
        if !norm_a.is_empty() && norm_a == normalize(b) {
            return (1.0, shared.into_iter().collect());
        }

        let mut score = jaccard(&tokens_a, &tokens_b);
        let boosted = shared
            .iter()
            .filter(|k| self.boost_keywords.contains(*k))
            .count();
        if boosted > 0 {
            score = (score + boosted as f64 * self.boost_per_keyword).min(1.0);
        }
        (score, shared.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::row;

    fn lender(cents: i64, date: (i32, u32, u32), text: &str) -> Transaction {
        row("A1", "Steel", "GeoTex", cents, 0, date, text)
    }

    fn borrower(cents: i64, date: (i32, u32, u32), text: &str) -> Transaction {
        row("B1", "GeoTex", "Steel", 0, cents, date, text)
    }

    #[test]
    fn perfect_pair_scores_one() {
        let s = Scorer::default();
        let score = s
            .score(
                &lender(100_000, (2024, 1, 10), "loan transfer"),
                &borrower(100_000, (2024, 1, 10), "loan transfer"),
            )
            .unwrap();
        assert!((score.total - 1.0).abs() < 1e-9, "score was {}", score.total);
        assert_eq!(score.date_gap_days, 0);
        assert_eq!(score.keywords, vec!["loan", "transfer"]);
    }

    #[test]
    fn one_day_apart_scores_above_point_nine() {
        let s = Scorer::default();
        let score = s
            .score(
                &lender(100_000, (2024, 1, 10), "loan transfer"),
                &borrower(100_000, (2024, 1, 11), "loan transfer"),
            )
            .unwrap();
        assert!(score.total >= 0.9, "score was {}", score.total);
        assert!(score.total < 1.0);
        assert_eq!(score.date_gap_days, 1);
    }

    #[test]
    fn amount_mismatch_is_dropped() {
        let s = Scorer::default();
        assert!(s
            .score(
                &lender(100_000, (2024, 1, 10), "loan transfer"),
                &borrower(99_900, (2024, 1, 10), "loan transfer"),
            )
            .is_none());
    }

    #[test]
    fn tolerance_admits_small_differences() {
        let config = MatchConfig {
            amount_tolerance: rust_decimal::Decimal::ONE,
            ..Default::default()
        };
        let s = Scorer::new(&config);
        assert!(s
            .score(
                &lender(100_000, (2024, 1, 10), "loan"),
                &borrower(99_900, (2024, 1, 10), "loan"),
            )
            .is_some());
        assert!(s
            .score(
                &lender(100_000, (2024, 1, 10), "loan"),
                &borrower(99_899, (2024, 1, 10), "loan"),
            )
            .is_none());
    }

    #[test]
    fn date_window_is_a_hard_filter() {
        let s = Scorer::default();
        let at_edge = s
            .score(
                &lender(500, (2024, 1, 1), "loan"),
                &borrower(500, (2024, 2, 15), "loan"),
            )
            .unwrap();
        assert_eq!(at_edge.date_gap_days, 45);
        assert_eq!(at_edge.date, 0.0);

        assert!(s
            .score(
                &lender(500, (2024, 1, 1), "loan"),
                &borrower(500, (2024, 2, 16), "loan"),
            )
            .is_none());
    }

    #[test]
    fn zero_window_only_allows_same_day() {
        let config = MatchConfig {
            date_window_days: 0,
            ..Default::default()
        };
        let s = Scorer::new(&config);
        let same = s
            .score(&lender(500, (2024, 1, 1), "x"), &borrower(500, (2024, 1, 1), "y"))
            .unwrap();
        assert_eq!(same.date, 1.0);
        assert!(s
            .score(&lender(500, (2024, 1, 1), "x"), &borrower(500, (2024, 1, 2), "x"))
            .is_none());
    }

    #[test]
    fn shared_reference_is_full_text_match() {
        let s = Scorer::default();
        let (score, keywords) = s.text_score(
            "Advance against FOB/PO/2023/8/5023 Steel",
            "Recd for fob/po/2023/8/5023-B",
        );
        assert_eq!(score, 1.0);
        assert_eq!(keywords[0], "FOB/PO/2023/8/5023");
    }

    #[test]
    fn partial_overlap_uses_jaccard() {
        let s = Scorer::default();
        let (score, keywords) = s.text_score("loan transfer march", "loan repayment");
        assert!((score - 0.25).abs() < 1e-9);
        assert_eq!(keywords, vec!["loan"]);
    }

    #[test]
    fn boost_keywords_raise_score() {
        let config = MatchConfig {
            boost_keywords: vec!["Loan".into()],
            ..Default::default()
        };
        let s = Scorer::new(&config);
        let (score, _) = s.text_score("loan transfer march", "loan repayment");
        assert!((score - 0.35).abs() < 1e-9);
    }

    #[test]
    fn boosted_text_score_is_capped_at_one() {
        let config = MatchConfig {
            boost_keywords: vec!["loan".into(), "transfer".into()],
            boost_per_keyword: 0.3,
            ..Default::default()
        };
        let s = Scorer::new(&config);
        // jaccard 0.5, plus 2 * 0.3
        let (score, keywords) = s.text_score("loan transfer march", "loan transfer april");
        assert_eq!(score, 1.0);
        assert_eq!(keywords, vec!["loan", "transfer"]);

        let total = s
            .score(
                &lender(500, (2024, 1, 1), "loan transfer march"),
                &borrower(500, (2024, 1, 1), "loan transfer april"),
            )
            .unwrap();
        assert!(total.total <= 1.0);
        assert_eq!(total.text, 1.0);
    }

    #[test]
    fn min_score_drops_weak_pairs() {
        let config = MatchConfig {
            min_score: 0.95,
            ..Default::default()
        };
        let s = Scorer::new(&config);
        assert!(s
            .score(
                &lender(500, (2024, 1, 1), "loan"),
                &borrower(500, (2024, 1, 20), "freight"),
            )
            .is_none());
    }

    #[test]
    fn scoring_is_deterministic() {
        let s = Scorer::default();
        let a = lender(500, (2024, 1, 1), "interunit loan GeoTex");
        let b = borrower(500, (2024, 1, 3), "loan from Steel interunit");
        assert_eq!(s.score(&a, &b), s.score(&a, &b));
    }
}
