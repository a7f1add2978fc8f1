use crate::domain::types::{Trade, TradeSide};
use crate::infrastructure::persistence::database::Store;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

/// Append-only ledger access. Rows are deduplicated on their natural key so
/// a re-synced brokerage export does not double-book trades.
pub struct TradeRepository {
    store: Store,
}

impl TradeRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Insert if unseen; returns true when the row was actually appended.
    pub async fn append(&self, trade: &Trade) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO trades (
                isin, side, quantity, price, fees, currency, executed_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&trade.isin)
        .bind(trade.side.as_str())
        .bind(trade.quantity)
        .bind(trade.price.to_string())
        .bind(trade.fees.to_string())
        .bind(&trade.currency)
        .bind(trade.executed_at.to_rfc3339())
        .bind(trade.created_at.to_rfc3339())
        .execute(&self.store.pool)
        .await
        .context("Failed to append trade")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<Trade>> {
        type Row = (i64, String, String, i64, String, String, String, String, String);
        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT id, isin, side, quantity, price, fees, currency, executed_at, created_at
            FROM trades ORDER BY executed_at DESC LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.store.pool)
        .await
        .context("Failed to load recent trades")?;

        let mut trades = Vec::with_capacity(rows.len());
        for row in rows {
            trades.push(Trade {
                id: Some(row.0),
                isin: row.1,
                side: TradeSide::from_str(&row.2)?,
                quantity: row.3,
                price: Decimal::from_str(&row.4).unwrap_or_default(),
                fees: Decimal::from_str(&row.5).unwrap_or_default(),
                currency: row.6,
                executed_at: parse_timestamp(&row.7),
                created_at: parse_timestamp(&row.8),
            });
        }
        Ok(trades)
    }

    /// Latest execution time per ISIN for one side, feeding the cooldown
    /// checks.
    pub async fn last_trade_times(
        &self,
        side: TradeSide,
    ) -> Result<HashMap<String, DateTime<Utc>>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT isin, MAX(executed_at) FROM trades
            WHERE side = $1 GROUP BY isin
            "#,
        )
        .bind(side.as_str())
        .fetch_all(&self.store.pool)
        .await
        .context("Failed to load last trade times")?;

        Ok(rows
            .into_iter()
            .map(|(isin, at)| (isin, parse_timestamp(&at)))
            .collect())
    }

    /// Earliest buy per ISIN, used as the holding-period start.
    pub async fn first_buy_times(&self) -> Result<HashMap<String, DateTime<Utc>>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT isin, MIN(executed_at) FROM trades
            WHERE side = 'BUY' GROUP BY isin
            "#,
        )
        .fetch_all(&self.store.pool)
        .await
        .context("Failed to load first buy times")?;

        Ok(rows
            .into_iter()
            .map(|(isin, at)| (isin, parse_timestamp(&at)))
            .collect())
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
