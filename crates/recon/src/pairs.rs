use std::collections::{BTreeSet, HashMap};

use interco_core::{CompanyPair, PairSource, Period};
use interco_storage::DbPool;

use crate::config::ManualPair;
use crate::error::Error;

/// A relationship needs at least this many rows in a period to be listed.
const MIN_PAIR_ROWS: i64 = 2;

/// Relationships found in the stored rows, one per unordered company pair
/// and period, names in alphabetical order.
pub(crate) async fn company_pairs(pool: &DbPool) -> Result<Vec<CompanyPair>, Error> {
    Ok(interco_storage::canonical_pair_counts(pool, MIN_PAIR_ROWS)
        .await?
        .into_iter()
        .map(|p| CompanyPair::new(&p.company_a, &p.company_b, p.period, p.count, PairSource::Stored))
        .collect())
}

/// Relationships as the ledgers state them. The first direction seen for a
/// company pair and period is listed, with the reverse direction attached.
pub(crate) async fn detected_pairs(pool: &DbPool) -> Result<Vec<CompanyPair>, Error> {
    let counts = interco_storage::directional_pair_counts(pool).await?;
    let by_key: HashMap<(&str, &str, Period), i64> = counts
        .iter()
        .map(|c| ((c.company_a.as_str(), c.company_b.as_str(), c.period), c.count))
        .collect();

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for c in &counts {
        let (owner, counterparty) = (c.company_a.as_str(), c.company_b.as_str());
        if seen.contains(&(counterparty, owner, c.period)) {
            continue;
        }
        seen.insert((owner, counterparty, c.period));

        let reverse_count = by_key
            .get(&(counterparty, owner, c.period))
            .copied()
            .unwrap_or(0);
        let mut pair = CompanyPair::new(owner, counterparty, c.period, c.count, PairSource::Detected);
        pair.opposite = Some(Box::new(CompanyPair::new(
            counterparty,
            owner,
            c.period,
            reverse_count,
            PairSource::Detected,
        )));
        out.push(pair);
    }
    Ok(out)
}

/// Declared relationships in both directions, listed for every period in
/// which either company has rows. Config and stored declarations are merged.
pub(crate) async fn manual_pairs(pool: &DbPool, configured: &[ManualPair]) -> Result<Vec<CompanyPair>, Error> {
    let mut declared: BTreeSet<(String, String)> = interco_storage::list_declared_pairs(pool)
        .await?
        .into_iter()
        .collect();
    declared.extend(
        configured
            .iter()
            .map(|p| (p.lender.trim().to_string(), p.borrower.trim().to_string())),
    );

    let mut directions = BTreeSet::new();
    for (a, b) in declared {
        if a == b {
            continue;
        }
        directions.insert((b.clone(), a.clone()));
        directions.insert((a, b));
    }

    let mut out = Vec::new();
    for (lender, borrower) in &directions {
        for (period, count) in interco_storage::company_activity(pool, lender, borrower).await? {
            out.push(CompanyPair::new(lender, borrower, period, count, PairSource::Manual));
        }
    }
    out.sort_by(|a, b| {
        (b.year, b.month)
            .cmp(&(a.year, a.month))
            .then_with(|| a.lender_company.cmp(&b.lender_company))
            .then_with(|| a.borrower_company.cmp(&b.borrower_company))
    });
    Ok(out)
}
