use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;

pub type DbPool = Pool<Sqlite>;

/// Opens (creating if needed) the store at `path` and brings the schema up
/// to date.
pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(5000))
        .pragma("cache_size", "-32000");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Private in-memory store. The single connection is never recycled, so the
/// data lives as long as the pool.
pub async fn create_memory_db() -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS upload_pairs (
            pair_id TEXT PRIMARY KEY,
            file1 TEXT NOT NULL,
            file2 TEXT NOT NULL,
            upload_date TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            uid TEXT PRIMARY KEY,
            company TEXT NOT NULL,
            counterparty TEXT NOT NULL,
            period_month INTEGER NOT NULL,
            period_year INTEGER NOT NULL,
            date TEXT NOT NULL,
            particulars TEXT NOT NULL DEFAULT '',
            voucher_type TEXT,
            voucher_no TEXT,
            debit_cents INTEGER NOT NULL DEFAULT 0,
            credit_cents INTEGER NOT NULL DEFAULT 0,
            entered_by TEXT,
            upload_pair_id TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (upload_pair_id) REFERENCES upload_pairs(pair_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transactions_relationship ON transactions (company, counterparty, period_year, period_month)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transactions_upload ON transactions (upload_pair_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lender_uid TEXT NOT NULL,
            borrower_uid TEXT NOT NULL,
            match_score REAL NOT NULL,
            amount_score REAL NOT NULL,
            date_score REAL NOT NULL,
            text_score REAL NOT NULL,
            date_gap_days INTEGER NOT NULL,
            matched_keywords TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL CHECK (status IN ('suggested', 'confirmed', 'rejected')),
            confirmed_by TEXT,
            run_id TEXT,
            created_at TEXT NOT NULL,
            decided_at TEXT,
            FOREIGN KEY (lender_uid) REFERENCES transactions(uid),
            FOREIGN KEY (borrower_uid) REFERENCES transactions(uid)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one active match per transaction, whatever process writes.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_matches_active_lender ON matches (lender_uid) WHERE status IN ('suggested', 'confirmed')",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_matches_active_borrower ON matches (borrower_uid) WHERE status IN ('suggested', 'confirmed')",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_matches_lender ON matches (lender_uid)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_matches_borrower ON matches (borrower_uid)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS company_pairs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lender_company TEXT NOT NULL,
            borrower_company TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (lender_company, borrower_company)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
