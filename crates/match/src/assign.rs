use std::cmp::Ordering;
use std::collections::HashSet;

use crate::scorer::ScoredPair;

/// Preference order between two scored pairs: higher score, then smaller
/// date gap, then higher text score, then smaller lender uid, then smaller
/// borrower uid. Total, so the result never depends on input order.
pub fn rank(a: &ScoredPair<'_>, b: &ScoredPair<'_>) -> Ordering {
    b.score
        .total
        .total_cmp(&a.score.total)
        .then_with(|| a.score.date_gap_days.cmp(&b.score.date_gap_days))
        .then_with(|| b.score.text.total_cmp(&a.score.text))
        .then_with(|| a.lender.uid.cmp(&b.lender.uid))
        .then_with(|| a.borrower.uid.cmp(&b.borrower.uid))
}

/// Greedy one-to-one assignment: walk pairs best-first and keep a pair only
/// when neither side has been taken yet. Deterministic, not globally optimal.
pub fn resolve<'a>(mut pairs: Vec<ScoredPair<'a>>) -> Vec<ScoredPair<'a>> {
    pairs.sort_by(rank);

    let mut taken: HashSet<&'a str> = HashSet::new();
    let mut assigned = Vec::new();
    for pair in pairs {
        let lender = pair.lender.uid.as_str();
        let borrower = pair.borrower.uid.as_str();
        if taken.contains(lender) || taken.contains(borrower) {
            continue;
        }
        taken.insert(lender);
        taken.insert(borrower);
        assigned.push(pair);
    }
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::Scorer;
    use crate::test_support::row;
    use interco_core::Transaction;

    fn score_all<'a>(lenders: &'a [Transaction], borrowers: &'a [Transaction]) -> Vec<ScoredPair<'a>> {
        let scorer = Scorer::default();
        lenders
            .iter()
            .flat_map(|l| borrowers.iter().filter_map(|b| scorer.score_pair(l, b)))
            .collect()
    }

    fn uids(pairs: &[ScoredPair<'_>]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|p| (p.lender.uid.clone(), p.borrower.uid.clone()))
            .collect()
    }

    #[test]
    fn three_lenders_compete_for_one_borrower() {
        let lenders = vec![
            row("A3", "Steel", "GeoTex", 1000, 0, (2024, 1, 10), "loan transfer"),
            row("A1", "Steel", "GeoTex", 1000, 0, (2024, 1, 10), "loan transfer"),
            row("A2", "Steel", "GeoTex", 1000, 0, (2024, 1, 10), "loan transfer"),
        ];
        let borrowers = vec![row("B1", "GeoTex", "Steel", 0, 1000, (2024, 1, 10), "loan transfer")];
        let assigned = resolve(score_all(&lenders, &borrowers));
        assert_eq!(uids(&assigned), vec![("A1".to_string(), "B1".to_string())]);
    }

    #[test]
    fn closer_date_wins_over_uid() {
        let lenders = vec![
            row("A1", "Steel", "GeoTex", 1000, 0, (2024, 1, 1), "loan"),
            row("A2", "Steel", "GeoTex", 1000, 0, (2024, 1, 9), "loan"),
        ];
        let borrowers = vec![row("B1", "GeoTex", "Steel", 0, 1000, (2024, 1, 10), "loan")];
        let assigned = resolve(score_all(&lenders, &borrowers));
        assert_eq!(assigned[0].lender.uid, "A2");
    }

    #[test]
    fn no_transaction_is_assigned_twice() {
        let lenders = vec![
            row("A1", "Steel", "GeoTex", 1000, 0, (2024, 1, 10), "loan"),
            row("A2", "Steel", "GeoTex", 1000, 0, (2024, 1, 12), "loan"),
            row("A3", "Steel", "GeoTex", 1000, 0, (2024, 1, 14), "freight"),
        ];
        let borrowers = vec![
            row("B1", "GeoTex", "Steel", 0, 1000, (2024, 1, 11), "loan"),
            row("B2", "GeoTex", "Steel", 0, 1000, (2024, 1, 13), "loan"),
        ];
        let assigned = resolve(score_all(&lenders, &borrowers));
        assert_eq!(assigned.len(), 2);

        let mut seen = HashSet::new();
        for p in &assigned {
            assert!(seen.insert(p.lender.uid.clone()));
            assert!(seen.insert(p.borrower.uid.clone()));
        }
    }

    #[test]
    fn input_order_does_not_change_result() {
        let lenders = vec![
            row("A1", "Steel", "GeoTex", 1000, 0, (2024, 1, 10), "loan transfer"),
            row("A2", "Steel", "GeoTex", 1000, 0, (2024, 1, 11), "loan"),
            row("A3", "Steel", "GeoTex", 2000, 0, (2024, 1, 10), "loan"),
        ];
        let borrowers = vec![
            row("B1", "GeoTex", "Steel", 0, 1000, (2024, 1, 10), "loan transfer"),
            row("B2", "GeoTex", "Steel", 0, 1000, (2024, 1, 10), "loan"),
            row("B3", "GeoTex", "Steel", 0, 2000, (2024, 1, 12), "loan"),
        ];
        let forward = uids(&resolve(score_all(&lenders, &borrowers)));

        let mut reversed = score_all(&lenders, &borrowers);
        reversed.reverse();
        assert_eq!(uids(&resolve(reversed)), forward);

        let mut rotated = score_all(&lenders, &borrowers);
        rotated.rotate_left(2);
        assert_eq!(uids(&resolve(rotated)), forward);
    }

    #[test]
    fn empty_input_assigns_nothing() {
        assert!(resolve(Vec::new()).is_empty());
    }
}
