use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use interco_core::{Match, MatchId, MatchStatus, MatchView, Scope};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;

use crate::db::DbPool;
use crate::error::{is_unique_violation, StoreError};
use crate::transactions::get_transactions;

const SELECT_MATCHES: &str = "SELECT id, lender_uid, borrower_uid, match_score, amount_score, date_score, text_score, date_gap_days, matched_keywords, status, confirmed_by, run_id, created_at, decided_at FROM matches";

fn parse_timestamp(id: i64, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt(format!("match {id}: timestamp '{value}': {e}")))
}

fn match_from_row(row: &SqliteRow) -> Result<Match, StoreError> {
    let id: i64 = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<MatchStatus>()
        .map_err(|e| StoreError::corrupt(format!("match {id}: {e}")))?;
    let keywords: String = row.try_get("matched_keywords")?;
    let matched_keywords: Vec<String> = serde_json::from_str(&keywords)
        .map_err(|e| StoreError::corrupt(format!("match {id}: keywords: {e}")))?;
    let created_at: String = row.try_get("created_at")?;
    let decided_at: Option<String> = row.try_get("decided_at")?;

    Ok(Match {
        id: Some(MatchId(id)),
        lender_uid: row.try_get("lender_uid")?,
        borrower_uid: row.try_get("borrower_uid")?,
        match_score: row.try_get("match_score")?,
        amount_score: row.try_get("amount_score")?,
        date_score: row.try_get("date_score")?,
        text_score: row.try_get("text_score")?,
        date_gap_days: row.try_get("date_gap_days")?,
        matched_keywords,
        status,
        confirmed_by: row.try_get("confirmed_by")?,
        run_id: row.try_get("run_id")?,
        created_at: parse_timestamp(id, &created_at)?,
        decided_at: decided_at.map(|d| parse_timestamp(id, &d)).transpose()?,
    })
}

/// Uids held by a suggested or confirmed match.
pub async fn active_uids(pool: &DbPool) -> Result<HashSet<String>, StoreError> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT lender_uid, borrower_uid FROM matches WHERE status IN ('suggested', 'confirmed')",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().flat_map(|(l, b)| [l, b]).collect())
}

/// (lender uid, borrower uid) pairings an operator has rejected.
pub async fn rejected_pairs(pool: &DbPool) -> Result<HashSet<(String, String)>, StoreError> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT lender_uid, borrower_uid FROM matches WHERE status = 'rejected'",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Writes a run's suggestions in one transaction and returns them with ids.
///
/// If any member transaction already has an active match the whole batch is
/// rolled back and [`StoreError::Conflict`] names the offending pair.
pub async fn insert_matches(pool: &DbPool, matches: &[Match]) -> Result<Vec<Match>, StoreError> {
    let mut tx = pool.begin().await?;
    let mut stored = Vec::with_capacity(matches.len());

    for m in matches {
        let keywords = serde_json::to_string(&m.matched_keywords)
            .map_err(|e| StoreError::corrupt(format!("keywords: {e}")))?;
        let result = sqlx::query(
            "INSERT INTO matches (lender_uid, borrower_uid, match_score, amount_score, date_score, text_score, date_gap_days, matched_keywords, status, confirmed_by, run_id, created_at, decided_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id"
        )
        .bind(&m.lender_uid)
        .bind(&m.borrower_uid)
        .bind(m.match_score)
        .bind(m.amount_score)
        .bind(m.date_score)
        .bind(m.text_score)
        .bind(m.date_gap_days)
        .bind(keywords)
        .bind(m.status.as_str())
        .bind(&m.confirmed_by)
        .bind(&m.run_id)
        .bind(m.created_at.to_rfc3339())
        .bind(m.decided_at.map(|d| d.to_rfc3339()))
        .fetch_one(&mut *tx)
        .await;

        let row = match result {
            Ok(row) => row,
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::Conflict(format!(
                    "{} / {}",
                    m.lender_uid, m.borrower_uid
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let mut m = m.clone();
        m.id = Some(MatchId(row.try_get("id")?));
        stored.push(m);
    }

    tx.commit().await?;
    debug!(count = stored.len(), "stored matches");
    Ok(stored)
}

pub async fn get_match(pool: &DbPool, id: MatchId) -> Result<Option<Match>, StoreError> {
    let row = sqlx::query(&format!("{SELECT_MATCHES} WHERE id = ?"))
        .bind(id.0)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(match_from_row).transpose()
}

/// Every match a transaction has been part of, newest first.
pub async fn matches_for_uid(pool: &DbPool, uid: &str) -> Result<Vec<Match>, StoreError> {
    sqlx::query(&format!(
        "{SELECT_MATCHES} WHERE lender_uid = ? OR borrower_uid = ? ORDER BY id DESC"
    ))
    .bind(uid)
    .bind(uid)
    .fetch_all(pool)
    .await?
    .iter()
    .map(match_from_row)
    .collect()
}

/// Moves a suggested match to `status`. Returns `false` when the match is
/// no longer suggested, leaving it untouched.
pub async fn update_match_status(
    pool: &DbPool,
    id: MatchId,
    status: MatchStatus,
    confirmed_by: &str,
    decided_at: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE matches SET status = ?, confirmed_by = ?, decided_at = ? WHERE id = ? AND status = 'suggested'",
    )
    .bind(status.as_str())
    .bind(confirmed_by)
    .bind(decided_at.to_rfc3339())
    .bind(id.0)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Matches joined with both transactions, highest score first. A match is in
/// scope when either of its legs is.
pub async fn list_match_views(
    pool: &DbPool,
    scope: &Scope,
    status: Option<MatchStatus>,
) -> Result<Vec<MatchView>, StoreError> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_MATCHES);
    if let Some(status) = status {
        qb.push(" WHERE status = ").push_bind(status.as_str());
    }
    qb.push(" ORDER BY match_score DESC, id");
    let matches = qb
        .build()
        .fetch_all(pool)
        .await?
        .iter()
        .map(match_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    let uids: Vec<String> = matches
        .iter()
        .flat_map(|m| [m.lender_uid.clone(), m.borrower_uid.clone()])
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let by_uid: HashMap<String, _> = get_transactions(pool, &uids)
        .await?
        .into_iter()
        .map(|t| (t.uid.clone(), t))
        .collect();

    let mut views = Vec::with_capacity(matches.len());
    for m in matches {
        let lender = by_uid
            .get(&m.lender_uid)
            .cloned()
            .ok_or_else(|| StoreError::corrupt(format!("match {:?}: missing {}", m.id, m.lender_uid)))?;
        let borrower = by_uid
            .get(&m.borrower_uid)
            .cloned()
            .ok_or_else(|| StoreError::corrupt(format!("match {:?}: missing {}", m.id, m.borrower_uid)))?;
        if scope.covers(&lender) || scope.covers(&borrower) {
            views.push(MatchView::new(m, lender, borrower));
        }
    }
    Ok(views)
}
