use crate::domain::errors::{StoreError, StoreKind};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// One logically independent store backed by its own SQLite file with its
/// own writer discipline. Transactions never span stores.
#[derive(Clone)]
pub struct Store {
    pub pool: SqlitePool,
    pub kind: StoreKind,
    pub path: PathBuf,
}

impl Store {
    pub async fn open(path: &Path, kind: StoreKind) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create store directory")?;
            }
        }

        let url = format!("sqlite://{}", path.display());
        let options = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open store {}", path.display()))?;

        let store = Self {
            pool,
            kind,
            path: path.to_path_buf(),
        };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        let schema = match self.kind {
            StoreKind::Core => CORE_SCHEMA,
            StoreKind::Ledger => LEDGER_SCHEMA,
            StoreKind::Dividends => DIVIDENDS_SCHEMA,
            StoreKind::Snapshots => SNAPSHOTS_SCHEMA,
            StoreKind::Locks => LOCKS_SCHEMA,
            StoreKind::SymbolHistory => HISTORY_SCHEMA,
        };
        for statement in schema {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to initialize {:?} schema", self.kind))?;
        }
        Ok(())
    }

    /// Run SQLite's integrity check; anything but a clean "ok" is an
    /// integrity failure.
    pub async fn integrity_check(&self) -> Result<(), StoreError> {
        let row = sqlx::query("PRAGMA integrity_check")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable {
                store: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
        let verdict: String = row.get(0);
        if verdict.to_lowercase() == "ok" {
            Ok(())
        } else {
            Err(StoreError::IntegrityCheckFailed {
                store: self.path.display().to_string(),
                detail: verdict,
            })
        }
    }

    /// Truncate the WAL back into the main file.
    pub async fn wal_checkpoint(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .context("WAL checkpoint failed")?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// The fixed set of stores the system runs on, plus the directory holding
/// one history store per symbol.
#[derive(Clone)]
pub struct Stores {
    pub core: Store,
    pub ledger: Store,
    pub dividends: Store,
    pub snapshots: Store,
    pub locks: Store,
    pub history_dir: PathBuf,
}

impl Stores {
    pub async fn open_all(data_dir: &Path) -> Result<Self> {
        let stores = Self {
            core: Store::open(&data_dir.join("core.db"), StoreKind::Core).await?,
            ledger: Store::open(&data_dir.join("ledger.db"), StoreKind::Ledger).await?,
            dividends: Store::open(&data_dir.join("dividends.db"), StoreKind::Dividends).await?,
            snapshots: Store::open(&data_dir.join("snapshots.db"), StoreKind::Snapshots).await?,
            locks: Store::open(&data_dir.join("locks.db"), StoreKind::Locks).await?,
            history_dir: data_dir.join("history"),
        };
        info!(data_dir = %data_dir.display(), "all stores opened");
        Ok(stores)
    }

    pub fn history_path(&self, isin: &str) -> PathBuf {
        self.history_dir.join(format!("{}.db", isin))
    }

    pub async fn open_history(&self, isin: &str) -> Result<Store> {
        Store::open(&self.history_path(isin), StoreKind::SymbolHistory).await
    }

    pub fn fixed_stores(&self) -> [&Store; 5] {
        [
            &self.core,
            &self.ledger,
            &self.dividends,
            &self.snapshots,
            &self.locks,
        ]
    }
}

const CORE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS securities (
        isin TEXT PRIMARY KEY,
        symbol TEXT NOT NULL,
        name TEXT NOT NULL,
        currency TEXT NOT NULL,
        country TEXT NOT NULL DEFAULT '',
        industry TEXT NOT NULL DEFAULT '',
        exchange TEXT NOT NULL DEFAULT '',
        active BOOLEAN NOT NULL DEFAULT 1,
        allow_buy BOOLEAN NOT NULL DEFAULT 1,
        allow_sell BOOLEAN NOT NULL DEFAULT 1,
        min_weight_target TEXT,
        max_weight_target TEXT
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS positions (
        isin TEXT PRIMARY KEY,
        quantity INTEGER NOT NULL,
        average_cost TEXT NOT NULL,
        currency TEXT NOT NULL,
        current_price TEXT NOT NULL,
        market_value_eur TEXT NOT NULL,
        last_updated TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS allocation_targets (
        kind TEXT NOT NULL,
        name TEXT NOT NULL,
        target_pct REAL NOT NULL,
        PRIMARY KEY (kind, name)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS groupings (
        kind TEXT NOT NULL,
        group_name TEXT NOT NULL,
        member TEXT NOT NULL,
        PRIMARY KEY (kind, group_name, member)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS buckets (
        id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        high_water_mark TEXT NOT NULL,
        consecutive_losses INTEGER NOT NULL DEFAULT 0,
        max_consecutive_losses INTEGER NOT NULL DEFAULT 5
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cash_balances (
        currency TEXT PRIMARY KEY,
        amount TEXT NOT NULL
    );
    "#,
];

const LEDGER_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS trades (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        isin TEXT NOT NULL,
        side TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        price TEXT NOT NULL,
        fees TEXT NOT NULL,
        currency TEXT NOT NULL,
        executed_at TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (isin, side, quantity, price, executed_at)
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_trades_isin_time
    ON trades (isin, executed_at);
    "#,
];

const DIVIDENDS_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS dividends (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        isin TEXT NOT NULL,
        cash_flow_id TEXT UNIQUE,
        amount TEXT NOT NULL,
        currency TEXT NOT NULL,
        amount_eur TEXT NOT NULL,
        payment_date TEXT NOT NULL,
        reinvested BOOLEAN NOT NULL DEFAULT 0,
        reinvested_at TEXT,
        reinvested_quantity INTEGER,
        pending_bonus TEXT NOT NULL DEFAULT '0',
        bonus_cleared BOOLEAN NOT NULL DEFAULT 0
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_dividends_isin
    ON dividends (isin, payment_date);
    "#,
];

const SNAPSHOTS_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS portfolio_snapshots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        taken_at TEXT NOT NULL,
        total_value_eur TEXT NOT NULL,
        cash_eur TEXT NOT NULL,
        positions_value_eur TEXT NOT NULL
    );
    "#,
];

const LOCKS_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS locks (
        name TEXT PRIMARY KEY,
        owner TEXT NOT NULL,
        acquired_at TEXT NOT NULL
    );
    "#,
];

const HISTORY_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS prices (
        day TEXT PRIMARY KEY,
        close TEXT NOT NULL
    );
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_all_creates_five_store_files() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::open_all(dir.path()).await.unwrap();

        for store in stores.fixed_stores() {
            assert!(store.path.exists());
            store.integrity_check().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_history_stores_are_per_symbol_files() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::open_all(dir.path()).await.unwrap();

        let a = stores.open_history("US0378331005").await.unwrap();
        let b = stores.open_history("DE0007164600").await.unwrap();
        assert_ne!(a.path, b.path);
        assert!(a.path.exists());
        assert!(b.path.exists());
    }

    #[tokio::test]
    async fn test_wal_checkpoint_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("core.db"), StoreKind::Core)
            .await
            .unwrap();
        sqlx::query("INSERT INTO settings (key, value) VALUES ('a', 'b')")
            .execute(&store.pool)
            .await
            .unwrap();
        store.wal_checkpoint().await.unwrap();
    }
}
