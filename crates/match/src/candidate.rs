use std::collections::HashSet;

use interco_core::{ReconError, Role, Scope, Transaction};

/// Constraints on which lender/borrower rows may face each other.
#[derive(Debug, Clone, Default)]
pub struct PairingRules {
    pub strict_counterparty: bool,
    /// (lender uid, borrower uid) pairings that must not be proposed again.
    pub blocked: HashSet<(String, String)>,
}

impl PairingRules {
    pub fn allows(&self, lender: &Transaction, borrower: &Transaction) -> bool {
        let related = if self.strict_counterparty {
            lender.mirrors(borrower)
        } else {
            lender.company != borrower.company
        };
        related
            && !self
                .blocked
                .contains(&(lender.uid.clone(), borrower.uid.clone()))
    }
}

/// One lender leg and every borrower leg it may be paired with.
#[derive(Debug, Clone)]
pub struct CandidateGroup<'a> {
    pub lender: &'a Transaction,
    pub borrowers: Vec<&'a Transaction>,
}

#[derive(Debug, Clone, Default)]
pub struct Candidates<'a> {
    pub groups: Vec<CandidateGroup<'a>>,
    /// In-scope rows without an active match.
    pub processed: usize,
    /// Rows with neither a debit nor a credit.
    pub unqualified: Vec<&'a Transaction>,
    /// Rows that failed the integrity check, with the reason.
    pub skipped: Vec<(&'a Transaction, ReconError)>,
}

impl Candidates<'_> {
    pub fn pair_count(&self) -> usize {
        self.groups.iter().map(|g| g.borrowers.len()).sum()
    }
}

/// Groups in-scope, unmatched rows into lender legs and the borrower legs
/// each may pair with. Rows listed in `active` are ignored entirely.
pub fn generate<'a>(
    transactions: &'a [Transaction],
    scope: &Scope,
    active: &HashSet<String>,
    rules: &PairingRules,
) -> Candidates<'a> {
    let mut out = Candidates::default();
    let mut lenders = Vec::new();
    let mut borrowers = Vec::new();

    for tx in transactions {
        if !scope.covers(tx) || active.contains(&tx.uid) {
            continue;
        }
        out.processed += 1;
        match tx.role() {
            Ok(Some(Role::Lender)) => lenders.push(tx),
            Ok(Some(Role::Borrower)) => borrowers.push(tx),
            Ok(None) => out.unqualified.push(tx),
            Err(e) => out.skipped.push((tx, e)),
        }
    }

    lenders.sort_by(|a, b| a.uid.cmp(&b.uid));
    borrowers.sort_by(|a, b| a.uid.cmp(&b.uid));

    out.groups = lenders
        .into_iter()
        .map(|lender| CandidateGroup {
            lender,
            borrowers: borrowers
                .iter()
                .copied()
                .filter(|borrower| rules.allows(lender, borrower))
                .collect(),
        })
        .collect();

    out
}
