use chrono::{DateTime, Utc};
use interco_core::{Period, UploadPair};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::db::DbPool;
use crate::error::StoreError;

/// Row count for one company relationship in one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairCount {
    pub company_a: String,
    pub company_b: String,
    pub period: Period,
    pub count: i64,
}

fn period_of(month: i64, year: i64) -> Result<Period, StoreError> {
    u32::try_from(month)
        .ok()
        .zip(i32::try_from(year).ok())
        .and_then(|(m, y)| Period::new(m, y))
        .ok_or_else(|| StoreError::corrupt(format!("period {month}/{year}")))
}

fn pair_count_from_row(row: &SqliteRow) -> Result<PairCount, StoreError> {
    Ok(PairCount {
        company_a: row.try_get("company_a")?,
        company_b: row.try_get("company_b")?,
        period: period_of(row.try_get("period_month")?, row.try_get("period_year")?)?,
        count: row.try_get("n")?,
    })
}

/// Company pairs with names in alphabetical order, per period, that have at
/// least `min_rows` rows across both ledgers. Newest period first.
pub async fn canonical_pair_counts(pool: &DbPool, min_rows: i64) -> Result<Vec<PairCount>, StoreError> {
    sqlx::query(
        r#"
        SELECT MIN(company, counterparty) AS company_a,
               MAX(company, counterparty) AS company_b,
               period_month, period_year, COUNT(*) AS n
        FROM transactions
        WHERE company <> counterparty
        GROUP BY company_a, company_b, period_year, period_month
        HAVING COUNT(*) >= ?
        ORDER BY period_year DESC, period_month DESC, company_a, company_b
        "#,
    )
    .bind(min_rows)
    .fetch_all(pool)
    .await?
    .iter()
    .map(pair_count_from_row)
    .collect()
}

/// Ledger owner / counterparty combinations per period, as written in the
/// ledgers. `company_a` is the ledger owner.
pub async fn directional_pair_counts(pool: &DbPool) -> Result<Vec<PairCount>, StoreError> {
    sqlx::query(
        r#"
        SELECT company AS company_a, counterparty AS company_b,
               period_month, period_year, COUNT(*) AS n
        FROM transactions
        WHERE company <> counterparty
        GROUP BY company, counterparty, period_year, period_month
        ORDER BY period_year DESC, period_month DESC, company, counterparty
        "#,
    )
    .fetch_all(pool)
    .await?
    .iter()
    .map(pair_count_from_row)
    .collect()
}

/// Periods in which either company appears in any ledger, with the number
/// of rows mentioning either of them. Newest first.
pub async fn company_activity(
    pool: &DbPool,
    a: &str,
    b: &str,
) -> Result<Vec<(Period, i64)>, StoreError> {
    let rows = sqlx::query_as::<_, (i64, i64, i64)>(
        r#"
        SELECT period_month, period_year, COUNT(*)
        FROM transactions
        WHERE company IN (?, ?) OR counterparty IN (?, ?)
        GROUP BY period_year, period_month
        ORDER BY period_year DESC, period_month DESC
        "#,
    )
    .bind(a)
    .bind(b)
    .bind(a)
    .bind(b)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(month, year, n)| Ok((period_of(month, year)?, n)))
        .collect()
}

/// Records an operator-declared relationship. Declaring the same direction
/// twice is a no-op; returns whether a row was added.
pub async fn insert_declared_pair(pool: &DbPool, lender: &str, borrower: &str) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO company_pairs (lender_company, borrower_company) VALUES (?, ?)",
    )
    .bind(lender)
    .bind(borrower)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn list_declared_pairs(pool: &DbPool) -> Result<Vec<(String, String)>, StoreError> {
    Ok(sqlx::query_as::<_, (String, String)>(
        "SELECT lender_company, borrower_company FROM company_pairs ORDER BY lender_company, borrower_company",
    )
    .fetch_all(pool)
    .await?)
}

const SELECT_UPLOAD_PAIRS: &str = "SELECT u.pair_id, u.file1, u.file2, u.upload_date, (SELECT COUNT(*) FROM transactions t WHERE t.upload_pair_id = u.pair_id) AS record_count FROM upload_pairs u";

fn upload_pair_from_row(row: &SqliteRow) -> Result<UploadPair, StoreError> {
    let pair_id: String = row.try_get("pair_id")?;
    let upload_date: String = row.try_get("upload_date")?;
    let upload_date = DateTime::parse_from_rfc3339(&upload_date)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt(format!("upload pair {pair_id}: {e}")))?;
    Ok(UploadPair {
        filenames: [row.try_get("file1")?, row.try_get("file2")?],
        upload_date,
        record_count: row.try_get("record_count")?,
        pair_id,
    })
}

pub async fn insert_upload_pair(pool: &DbPool, pair: &UploadPair) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO upload_pairs (pair_id, file1, file2, upload_date) VALUES (?, ?, ?, ?)")
        .bind(&pair.pair_id)
        .bind(&pair.filenames[0])
        .bind(&pair.filenames[1])
        .bind(pair.upload_date.to_rfc3339())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_upload_pair(pool: &DbPool, pair_id: &str) -> Result<Option<UploadPair>, StoreError> {
    let row = sqlx::query(&format!("{SELECT_UPLOAD_PAIRS} WHERE u.pair_id = ?"))
        .bind(pair_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(upload_pair_from_row).transpose()
}

/// Newest upload first.
pub async fn list_upload_pairs(pool: &DbPool) -> Result<Vec<UploadPair>, StoreError> {
    sqlx::query(&format!("{SELECT_UPLOAD_PAIRS} ORDER BY u.upload_date DESC, u.pair_id DESC"))
        .fetch_all(pool)
        .await?
        .iter()
        .map(upload_pair_from_row)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_db, create_memory_db};
    use crate::transactions::insert_transactions;
    use crate::transactions::tests::row;

    #[tokio::test]
    async fn canonical_pairs_fold_both_ledgers() {
        let pool = create_memory_db().await.unwrap();
        insert_transactions(
            &pool,
            &[
                row("A1", "Steel", "GeoTex", 100, 0, 10),
                row("B1", "GeoTex", "Steel", 0, 100, 10),
                row("C1", "Cotton", "Steel", 0, 100, 10),
            ],
        )
        .await
        .unwrap();

        let canonical = canonical_pair_counts(&pool, 2).await.unwrap();
        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical[0].company_a, "GeoTex");
        assert_eq!(canonical[0].company_b, "Steel");
        assert_eq!(canonical[0].count, 2);
        assert_eq!(canonical[0].period, Period::new(1, 2024).unwrap());

        let directional = directional_pair_counts(&pool).await.unwrap();
        assert_eq!(directional.len(), 3);
        assert_eq!(directional[0].company_a, "Cotton");
    }

    #[tokio::test]
    async fn activity_counts_rows_mentioning_either_company() {
        let pool = create_memory_db().await.unwrap();
        insert_transactions(
            &pool,
            &[
                row("A1", "Steel", "GeoTex", 100, 0, 10),
                row("C1", "Steel", "Cotton", 100, 0, 10),
            ],
        )
        .await
        .unwrap();

        let periods = company_activity(&pool, "GeoTex", "Steel").await.unwrap();
        assert_eq!(periods, vec![(Period::new(1, 2024).unwrap(), 2)]);
        let periods = company_activity(&pool, "GeoTex", "Jute").await.unwrap();
        assert_eq!(periods, vec![(Period::new(1, 2024).unwrap(), 1)]);
        assert!(company_activity(&pool, "Jute", "Tea").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn declared_pairs_are_unique_per_direction() {
        let pool = create_memory_db().await.unwrap();
        assert!(insert_declared_pair(&pool, "Steel", "GeoTex").await.unwrap());
        assert!(!insert_declared_pair(&pool, "Steel", "GeoTex").await.unwrap());
        assert!(insert_declared_pair(&pool, "GeoTex", "Steel").await.unwrap());
        assert_eq!(list_declared_pairs(&pool).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn upload_pairs_count_their_rows() {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_db(&dir.path().join("uploads.db")).await.unwrap();
        let pair = UploadPair {
            pair_id: "pair_20240115_093000_1a2b3c4d".into(),
            filenames: ["steel.xlsx".into(), "geotex.xlsx".into()],
            upload_date: Utc::now(),
            record_count: 0,
        };
        insert_upload_pair(&pool, &pair).await.unwrap();

        let mut a = row("A1", "Steel", "GeoTex", 100, 0, 10);
        a.upload_pair_id = Some(pair.pair_id.clone());
        insert_transactions(&pool, &[a, row("B1", "GeoTex", "Steel", 0, 100, 10)])
            .await
            .unwrap();

        let back = get_upload_pair(&pool, &pair.pair_id).await.unwrap().unwrap();
        assert_eq!(back.record_count, 1);
        assert_eq!(back.filenames, pair.filenames);
        assert_eq!(list_upload_pairs(&pool).await.unwrap().len(), 1);
        assert!(get_upload_pair(&pool, "pair_missing").await.unwrap().is_none());
    }
}
