//! Repositories over the core store: universe, positions, settings,
//! allocations and buckets. Each method is a single-store operation; nothing
//! here ever touches two stores in one transaction.

use crate::domain::buckets::{Bucket, BucketStatus, CORE_BUCKET};
use crate::domain::settings::Settings;
use crate::domain::types::{
    AllocationKind, AllocationTarget, Grouping, Position, Security, EMPTY_GROUP_MARKER,
};
use crate::infrastructure::persistence::database::Store;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

fn parse_decimal(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap_or_default()
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub struct SecurityRepository {
    store: Store,
}

impl SecurityRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, security: &Security) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO securities (
                isin, symbol, name, currency, country, industry, exchange,
                active, allow_buy, allow_sell, min_weight_target, max_weight_target
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT(isin) DO UPDATE SET
                symbol = excluded.symbol,
                name = excluded.name,
                currency = excluded.currency,
                country = excluded.country,
                industry = excluded.industry,
                exchange = excluded.exchange,
                active = excluded.active,
                allow_buy = excluded.allow_buy,
                allow_sell = excluded.allow_sell,
                min_weight_target = excluded.min_weight_target,
                max_weight_target = excluded.max_weight_target
            "#,
        )
        .bind(&security.isin)
        .bind(&security.symbol)
        .bind(&security.name)
        .bind(&security.currency)
        .bind(&security.country)
        .bind(&security.industry)
        .bind(&security.exchange)
        .bind(security.active)
        .bind(security.allow_buy)
        .bind(security.allow_sell)
        .bind(security.min_weight_target.map(|t| t.to_string()))
        .bind(security.max_weight_target.map(|t| t.to_string()))
        .execute(&self.store.pool)
        .await
        .context("Failed to upsert security")?;
        Ok(())
    }

    pub async fn get_all_active(&self) -> Result<HashMap<String, Security>> {
        type Row = (
            String,
            String,
            String,
            String,
            String,
            String,
            String,
            bool,
            bool,
            bool,
            Option<String>,
            Option<String>,
        );
        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT isin, symbol, name, currency, country, industry, exchange,
                   active, allow_buy, allow_sell, min_weight_target, max_weight_target
            FROM securities
            WHERE active = 1
            "#,
        )
        .fetch_all(&self.store.pool)
        .await
        .context("Failed to load securities")?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let security = Security {
                    isin: row.0,
                    symbol: row.1,
                    name: row.2,
                    currency: row.3,
                    country: row.4,
                    industry: row.5,
                    exchange: row.6,
                    active: row.7,
                    allow_buy: row.8,
                    allow_sell: row.9,
                    min_weight_target: row.10.as_deref().map(parse_decimal),
                    max_weight_target: row.11.as_deref().map(parse_decimal),
                };
                (security.isin.clone(), security)
            })
            .collect())
    }

    pub async fn deactivate(&self, isin: &str) -> Result<()> {
        sqlx::query("UPDATE securities SET active = 0 WHERE isin = $1")
            .bind(isin)
            .execute(&self.store.pool)
            .await
            .context("Failed to deactivate security")?;
        Ok(())
    }
}

pub struct PositionRepository {
    store: Store,
}

impl PositionRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Full reconciliation from the brokerage: the incoming set replaces the
    /// stored set in one core-store transaction.
    pub async fn replace_all(&self, positions: &[Position]) -> Result<()> {
        let mut tx = self.store.pool.begin().await?;
        sqlx::query("DELETE FROM positions")
            .execute(&mut *tx)
            .await
            .context("Failed to clear positions")?;
        for position in positions {
            if position.quantity <= 0 {
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO positions (
                    isin, quantity, average_cost, currency,
                    current_price, market_value_eur, last_updated
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&position.isin)
            .bind(position.quantity)
            .bind(position.average_cost.to_string())
            .bind(&position.currency)
            .bind(position.current_price.to_string())
            .bind(position.market_value_eur.to_string())
            .bind(position.last_updated.to_rfc3339())
            .execute(&mut *tx)
            .await
            .context("Failed to insert position")?;
        }
        tx.commit().await.context("Failed to commit positions")?;
        Ok(())
    }

    pub async fn get_all(&self) -> Result<HashMap<String, Position>> {
        type Row = (String, i64, String, String, String, String, String);
        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT isin, quantity, average_cost, currency,
                   current_price, market_value_eur, last_updated
            FROM positions
            "#,
        )
        .fetch_all(&self.store.pool)
        .await
        .context("Failed to load positions")?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let position = Position {
                    isin: row.0,
                    quantity: row.1,
                    average_cost: parse_decimal(&row.2),
                    currency: row.3,
                    current_price: parse_decimal(&row.4),
                    market_value_eur: parse_decimal(&row.5),
                    last_updated: parse_timestamp(&row.6),
                };
                (position.isin.clone(), position)
            })
            .collect())
    }

    pub async fn update_price(
        &self,
        isin: &str,
        price: Decimal,
        market_value_eur: Decimal,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE positions
            SET current_price = $2, market_value_eur = $3, last_updated = $4
            WHERE isin = $1
            "#,
        )
        .bind(isin)
        .bind(price.to_string())
        .bind(market_value_eur.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.store.pool)
        .await
        .context("Failed to update position price")?;
        Ok(())
    }
}

pub struct SettingsRepository {
    store: Store,
}

impl SettingsRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Result<Settings> {
        let rows = sqlx::query_as::<_, (String, String)>("SELECT key, value FROM settings")
            .fetch_all(&self.store.pool)
            .await
            .context("Failed to load settings")?;
        Ok(Settings::from_values(rows.into_iter().collect()))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES ($1, $2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.store.pool)
        .await
        .context("Failed to store setting")?;
        Ok(())
    }
}

pub struct AllocationRepository {
    store: Store,
}

impl AllocationRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn load_targets(&self) -> Result<Vec<AllocationTarget>> {
        let rows = sqlx::query_as::<_, (String, String, f64)>(
            "SELECT kind, name, target_pct FROM allocation_targets ORDER BY kind, name",
        )
        .fetch_all(&self.store.pool)
        .await
        .context("Failed to load allocation targets")?;

        let mut targets = Vec::with_capacity(rows.len());
        for (kind, name, target_pct) in rows {
            targets.push(AllocationTarget {
                kind: AllocationKind::from_str(&kind)?,
                name,
                target_pct,
            });
        }
        Ok(targets)
    }

    pub async fn save_target(&self, target: &AllocationTarget) -> Result<()> {
        target.validate()?;
        sqlx::query(
            r#"
            INSERT INTO allocation_targets (kind, name, target_pct) VALUES ($1, $2, $3)
            ON CONFLICT(kind, name) DO UPDATE SET target_pct = excluded.target_pct
            "#,
        )
        .bind(target.kind.as_str())
        .bind(&target.name)
        .bind(target.target_pct)
        .execute(&self.store.pool)
        .await
        .context("Failed to save allocation target")?;
        Ok(())
    }

    pub async fn load_grouping(&self, kind: AllocationKind) -> Result<Grouping> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT group_name, member FROM groupings WHERE kind = $1",
        )
        .bind(kind.as_str())
        .fetch_all(&self.store.pool)
        .await
        .context("Failed to load groupings")?;
        Ok(Grouping::from_persisted(rows))
    }

    pub async fn save_grouping(&self, kind: AllocationKind, grouping: &Grouping) -> Result<()> {
        let mut tx = self.store.pool.begin().await?;
        sqlx::query("DELETE FROM groupings WHERE kind = $1")
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await
            .context("Failed to clear groupings")?;
        for group_name in grouping.groups.keys() {
            // Empty groups persist via the reserved marker so they survive a
            // round-trip as "exists but empty".
            let members = grouping
                .persisted_members(group_name)
                .unwrap_or_else(|| vec![EMPTY_GROUP_MARKER.to_string()]);
            for member in members {
                sqlx::query(
                    "INSERT INTO groupings (kind, group_name, member) VALUES ($1, $2, $3)",
                )
                .bind(kind.as_str())
                .bind(group_name)
                .bind(&member)
                .execute(&mut *tx)
                .await
                .context("Failed to insert grouping member")?;
            }
        }
        tx.commit().await.context("Failed to commit groupings")?;
        Ok(())
    }
}

pub struct CashRepository {
    store: Store,
}

impl CashRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn replace_all(&self, balances: &crate::domain::types::CashBalances) -> Result<()> {
        let mut tx = self.store.pool.begin().await?;
        sqlx::query("DELETE FROM cash_balances")
            .execute(&mut *tx)
            .await
            .context("Failed to clear cash balances")?;
        for (currency, amount) in &balances.amounts {
            sqlx::query("INSERT INTO cash_balances (currency, amount) VALUES ($1, $2)")
                .bind(currency)
                .bind(amount.to_string())
                .execute(&mut *tx)
                .await
                .context("Failed to insert cash balance")?;
        }
        tx.commit().await.context("Failed to commit cash balances")?;
        Ok(())
    }

    pub async fn load(&self) -> Result<crate::domain::types::CashBalances> {
        let rows =
            sqlx::query_as::<_, (String, String)>("SELECT currency, amount FROM cash_balances")
                .fetch_all(&self.store.pool)
                .await
                .context("Failed to load cash balances")?;
        let mut balances = crate::domain::types::CashBalances::default();
        for (currency, amount) in rows {
            balances.set(&currency, parse_decimal(&amount));
        }
        Ok(balances)
    }
}

pub struct BucketRepository {
    store: Store,
}

impl BucketRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// The core bucket always exists.
    pub async fn ensure_core(&self) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO buckets (id, status, high_water_mark, consecutive_losses, max_consecutive_losses)
            VALUES ($1, 'active', '0', 0, 5)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(CORE_BUCKET)
        .execute(&self.store.pool)
        .await
        .context("Failed to ensure core bucket")?;
        Ok(())
    }

    pub async fn get_all(&self) -> Result<Vec<Bucket>> {
        let rows = sqlx::query_as::<_, (String, String, String, i64, i64)>(
            r#"
            SELECT id, status, high_water_mark, consecutive_losses, max_consecutive_losses
            FROM buckets ORDER BY id
            "#,
        )
        .fetch_all(&self.store.pool)
        .await
        .context("Failed to load buckets")?;

        let mut buckets = Vec::with_capacity(rows.len());
        for (id, status, hwm, losses, max_losses) in rows {
            buckets.push(Bucket {
                id,
                status: BucketStatus::from_str(&status)?,
                high_water_mark: parse_decimal(&hwm),
                consecutive_losses: losses.max(0) as u32,
                max_consecutive_losses: max_losses.max(0) as u32,
            });
        }
        Ok(buckets)
    }

    pub async fn save(&self, bucket: &Bucket) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO buckets (id, status, high_water_mark, consecutive_losses, max_consecutive_losses)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                high_water_mark = excluded.high_water_mark,
                consecutive_losses = excluded.consecutive_losses,
                max_consecutive_losses = excluded.max_consecutive_losses
            "#,
        )
        .bind(&bucket.id)
        .bind(bucket.status.as_str())
        .bind(bucket.high_water_mark.to_string())
        .bind(bucket.consecutive_losses as i64)
        .bind(bucket.max_consecutive_losses as i64)
        .execute(&self.store.pool)
        .await
        .context("Failed to save bucket")?;
        Ok(())
    }
}
