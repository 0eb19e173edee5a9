use std::collections::HashSet;

use chrono::NaiveDate;
use interco_core::{Money, Period, Scope, Transaction};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;

use crate::db::DbPool;
use crate::error::{is_unique_violation, StoreError};

const SELECT_TRANSACTIONS: &str = "SELECT t.uid, t.company, t.counterparty, t.period_month, t.period_year, t.date, t.particulars, t.voucher_type, t.voucher_no, t.debit_cents, t.credit_cents, t.entered_by, t.upload_pair_id FROM transactions t WHERE 1 = 1";

/// Restricts a query over `transactions t` to `scope`.
pub(crate) fn push_scope(qb: &mut QueryBuilder<'_, Sqlite>, scope: &Scope) {
    match scope {
        Scope::All => {}
        Scope::Pair(pair) => {
            qb.push(" AND ((t.company = ")
                .push_bind(pair.lender_company.clone())
                .push(" AND t.counterparty = ")
                .push_bind(pair.borrower_company.clone())
                .push(") OR (t.company = ")
                .push_bind(pair.borrower_company.clone())
                .push(" AND t.counterparty = ")
                .push_bind(pair.lender_company.clone())
                .push(")) AND t.period_month = ")
                .push_bind(pair.period.month as i64)
                .push(" AND t.period_year = ")
                .push_bind(pair.period.year as i64);
        }
        Scope::Upload { pair_id } => {
            qb.push(" AND t.upload_pair_id = ").push_bind(pair_id.clone());
        }
    }
}

pub(crate) fn transaction_from_row(row: &SqliteRow) -> Result<Transaction, StoreError> {
    let uid: String = row.try_get("uid")?;
    let date: String = row.try_get("date")?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|e| StoreError::corrupt(format!("transaction {uid}: date '{date}': {e}")))?;
    let month: i64 = row.try_get("period_month")?;
    let year: i64 = row.try_get("period_year")?;
    let period = u32::try_from(month)
        .ok()
        .zip(i32::try_from(year).ok())
        .and_then(|(m, y)| Period::new(m, y))
        .ok_or_else(|| StoreError::corrupt(format!("transaction {uid}: period {month}/{year}")))?;

    Ok(Transaction {
        company: row.try_get("company")?,
        counterparty: row.try_get("counterparty")?,
        date,
        particulars: row.try_get("particulars")?,
        voucher_type: row.try_get("voucher_type")?,
        voucher_no: row.try_get("voucher_no")?,
        debit: Money::from_cents(row.try_get("debit_cents")?),
        credit: Money::from_cents(row.try_get("credit_cents")?),
        period,
        entered_by: row.try_get("entered_by")?,
        upload_pair_id: row.try_get("upload_pair_id")?,
        uid,
    })
}

/// Stores a batch of normalized rows. The batch is all or nothing: a uid
/// repeated within the batch or already stored rejects every row.
pub async fn insert_transactions(pool: &DbPool, rows: &[Transaction]) -> Result<u64, StoreError> {
    let mut seen = HashSet::new();
    for row in rows {
        if !seen.insert(row.uid.as_str()) {
            return Err(StoreError::Duplicate(row.uid.clone()));
        }
    }

    let mut tx = pool.begin().await?;
    for row in rows {
        let result = sqlx::query(
            "INSERT INTO transactions (uid, company, counterparty, period_month, period_year, date, particulars, voucher_type, voucher_no, debit_cents, credit_cents, entered_by, upload_pair_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&row.uid)
        .bind(&row.company)
        .bind(&row.counterparty)
        .bind(row.period.month as i64)
        .bind(row.period.year as i64)
        .bind(row.date.format("%Y-%m-%d").to_string())
        .bind(&row.particulars)
        .bind(&row.voucher_type)
        .bind(&row.voucher_no)
        .bind(row.debit.to_cents())
        .bind(row.credit.to_cents())
        .bind(&row.entered_by)
        .bind(&row.upload_pair_id)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(StoreError::Duplicate(row.uid.clone())),
            Err(e) => return Err(e.into()),
        }
    }
    tx.commit().await?;

    debug!(count = rows.len(), "stored transactions");
    Ok(rows.len() as u64)
}

pub async fn get_transaction(pool: &DbPool, uid: &str) -> Result<Option<Transaction>, StoreError> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_TRANSACTIONS);
    qb.push(" AND t.uid = ").push_bind(uid.to_string());
    let row = qb.build().fetch_optional(pool).await?;
    row.as_ref().map(transaction_from_row).transpose()
}

/// Rows for the given uids, in no particular order. Unknown uids are ignored.
pub async fn get_transactions(pool: &DbPool, uids: &[String]) -> Result<Vec<Transaction>, StoreError> {
    let mut out = Vec::with_capacity(uids.len());
    for chunk in uids.chunks(500) {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_TRANSACTIONS);
        qb.push(" AND t.uid IN (");
        let mut list = qb.separated(", ");
        for uid in chunk {
            list.push_bind(uid.clone());
        }
        qb.push(")");
        for row in qb.build().fetch_all(pool).await? {
            out.push(transaction_from_row(&row)?);
        }
    }
    Ok(out)
}

/// Every stored row in `scope`, ordered by uid.
pub async fn list_transactions(pool: &DbPool, scope: &Scope) -> Result<Vec<Transaction>, StoreError> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_TRANSACTIONS);
    push_scope(&mut qb, scope);
    qb.push(" ORDER BY t.uid");
    qb.build()
        .fetch_all(pool)
        .await?
        .iter()
        .map(transaction_from_row)
        .collect()
}

/// Rows in `scope` that are not part of a suggested or confirmed match,
/// ordered by date then uid.
pub async fn list_unmatched(pool: &DbPool, scope: &Scope) -> Result<Vec<Transaction>, StoreError> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_TRANSACTIONS);
    qb.push(
        " AND NOT EXISTS (SELECT 1 FROM matches m WHERE (m.lender_uid = t.uid OR m.borrower_uid = t.uid) AND m.status IN ('suggested', 'confirmed'))",
    );
    push_scope(&mut qb, scope);
    qb.push(" ORDER BY t.date, t.uid");
    qb.build()
        .fetch_all(pool)
        .await?
        .iter()
        .map(transaction_from_row)
        .collect()
}
