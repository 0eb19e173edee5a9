use chrono::Utc;
use interco_core::{Decision, Match, MatchStatus, ReconError};
use interco_storage::DbPool;
use tracing::info;

use crate::error::Error;

/// Applies an operator decision to the latest match of `uid`.
///
/// Only a suggested match can move. The store update is guarded on the
/// suggested status, so a decision that lost a race against another one is
/// reported as [`ReconError::InvalidState`] with the status that won.
pub(crate) async fn decide(
    pool: &DbPool,
    uid: &str,
    decision: Decision,
    confirmed_by: &str,
) -> Result<Match, Error> {
    let uid = uid.trim();
    if uid.is_empty() {
        return Err(ReconError::validation("transaction uid is required").into());
    }
    let confirmed_by = confirmed_by.trim();
    if confirmed_by.is_empty() {
        return Err(ReconError::validation("confirmed_by is required").into());
    }

    let latest = interco_storage::matches_for_uid(pool, uid)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ReconError::not_found(format!("no match for transaction {uid}")))?;
    let Some(id) = latest.id else {
        return Err(ReconError::not_found(format!("no match for transaction {uid}")).into());
    };

    if latest.status != MatchStatus::Suggested {
        return Err(invalid_state(uid, &latest).into());
    }

    let now = Utc::now();
    let mut decided = latest;
    decided.decide(uid, decision, confirmed_by, now)?;

    let applied =
        interco_storage::update_match_status(pool, id, decided.status, confirmed_by, now).await?;
    if !applied {
        let current = interco_storage::get_match(pool, id)
            .await?
            .ok_or_else(|| ReconError::not_found(format!("match {id}")))?;
        return Err(invalid_state(uid, &current).into());
    }

    info!(
        match_id = id.0,
        uid,
        lender_uid = %decided.lender_uid,
        borrower_uid = %decided.borrower_uid,
        status = %decided.status,
        confirmed_by,
        "match decided"
    );
    Ok(decided)
}

fn invalid_state(uid: &str, m: &Match) -> ReconError {
    ReconError::InvalidState {
        uid: uid.to_string(),
        match_id: m.id.map(|id| id.0).unwrap_or_default(),
        status: m.status,
    }
}
