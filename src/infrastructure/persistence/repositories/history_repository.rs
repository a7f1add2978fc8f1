use crate::infrastructure::persistence::database::{Store, Stores};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::warn;

/// Access to the per-symbol price-history stores (one SQLite file per ISIN).
/// These stores are disposable: a corrupt file is deleted and rebuilt by the
/// next price sync.
pub struct HistoryRepository {
    stores: Stores,
}

impl HistoryRepository {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn append_close(&self, isin: &str, day: NaiveDate, close: Decimal) -> Result<()> {
        let store = self.stores.open_history(isin).await?;
        sqlx::query(
            r#"
            INSERT INTO prices (day, close) VALUES ($1, $2)
            ON CONFLICT(day) DO UPDATE SET close = excluded.close
            "#,
        )
        .bind(day.to_string())
        .bind(close.to_string())
        .execute(&store.pool)
        .await
        .context("Failed to append price")?;
        store.close().await;
        Ok(())
    }

    /// Closing prices of the last `lookback_days`, oldest first. A missing
    /// store yields an empty series, not an error.
    pub async fn recent_closes(&self, isin: &str, lookback_days: u32) -> Result<Vec<f64>> {
        if !self.stores.history_path(isin).exists() {
            return Ok(Vec::new());
        }
        let store = self.stores.open_history(isin).await?;
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT day, close FROM prices ORDER BY day DESC LIMIT $1",
        )
        .bind(lookback_days as i64)
        .fetch_all(&store.pool)
        .await
        .context("Failed to load price history")?;
        store.close().await;

        let mut closes: Vec<f64> = rows
            .into_iter()
            .rev()
            .filter_map(|(_, close)| Decimal::from_str(&close).ok())
            .filter_map(|d| {
                use rust_decimal::prelude::ToPrimitive;
                d.to_f64()
            })
            .collect();
        closes.shrink_to_fit();
        Ok(closes)
    }

    /// Drop a corrupt history file so the next sync rebuilds it.
    pub async fn delete(&self, isin: &str) -> Result<()> {
        let path = self.stores.history_path(isin);
        if path.exists() {
            warn!(isin, path = %path.display(), "deleting corrupt history store");
            tokio::fs::remove_file(&path)
                .await
                .context("Failed to delete history store")?;
            // WAL sidecar files go with it.
            for suffix in ["-wal", "-shm"] {
                let side = path.with_file_name(format!(
                    "{}{}",
                    path.file_name().and_then(|n| n.to_str()).unwrap_or_default(),
                    suffix
                ));
                let _ = tokio::fs::remove_file(&side).await;
            }
        }
        Ok(())
    }

    pub async fn integrity_check(&self, isin: &str) -> Result<bool> {
        if !self.stores.history_path(isin).exists() {
            return Ok(true);
        }
        let store = self.stores.open_history(isin).await?;
        let verdict = store.integrity_check().await.is_ok();
        store.close().await;
        Ok(verdict)
    }

    pub fn known_isins(&self) -> Result<Vec<String>> {
        let mut isins = Vec::new();
        if !self.stores.history_dir.exists() {
            return Ok(isins);
        }
        for entry in std::fs::read_dir(&self.stores.history_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(isin) = name.strip_suffix(".db") {
                isins.push(isin.to_string());
            }
        }
        isins.sort_unstable();
        Ok(isins)
    }
}
