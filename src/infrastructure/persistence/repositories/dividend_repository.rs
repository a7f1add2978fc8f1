use crate::domain::types::Dividend;
use crate::infrastructure::persistence::database::Store;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

pub struct DividendRepository {
    store: Store,
}

impl DividendRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Record a dividend keyed by its brokerage cash-flow id; at most one
    /// record per id. Returns true when a new row was created.
    pub async fn record(&self, dividend: &Dividend) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO dividends (
                isin, cash_flow_id, amount, currency, amount_eur, payment_date,
                reinvested, reinvested_at, reinvested_quantity, pending_bonus, bonus_cleared
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&dividend.isin)
        .bind(&dividend.cash_flow_id)
        .bind(dividend.amount.to_string())
        .bind(&dividend.currency)
        .bind(dividend.amount_eur.to_string())
        .bind(dividend.payment_date.to_string())
        .bind(dividend.reinvested)
        .bind(dividend.reinvested_at.map(|t| t.to_rfc3339()))
        .bind(dividend.reinvested_quantity)
        .bind(dividend.pending_bonus.to_string())
        .bind(dividend.bonus_cleared)
        .execute(&self.store.pool)
        .await
        .context("Failed to record dividend")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn unreinvested(&self) -> Result<Vec<Dividend>> {
        type Row = (
            i64,
            String,
            Option<String>,
            String,
            String,
            String,
            String,
            bool,
            Option<String>,
            Option<i64>,
            String,
            bool,
        );
        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT id, isin, cash_flow_id, amount, currency, amount_eur, payment_date,
                   reinvested, reinvested_at, reinvested_quantity, pending_bonus, bonus_cleared
            FROM dividends WHERE reinvested = 0 ORDER BY payment_date
            "#,
        )
        .fetch_all(&self.store.pool)
        .await
        .context("Failed to load dividends")?;

        Ok(rows
            .into_iter()
            .map(|row| Dividend {
                id: Some(row.0),
                isin: row.1,
                cash_flow_id: row.2,
                amount: Decimal::from_str(&row.3).unwrap_or_default(),
                currency: row.4,
                amount_eur: Decimal::from_str(&row.5).unwrap_or_default(),
                payment_date: NaiveDate::from_str(&row.6)
                    .unwrap_or_else(|_| Utc::now().date_naive()),
                reinvested: row.7,
                reinvested_at: row.8.as_deref().map(parse_timestamp),
                reinvested_quantity: row.9,
                pending_bonus: Decimal::from_str(&row.10).unwrap_or_default(),
                bonus_cleared: row.11,
            })
            .collect())
    }

    /// Persist the one-way reinvested transition.
    pub async fn mark_reinvested(
        &self,
        id: i64,
        quantity: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE dividends
            SET reinvested = 1, reinvested_at = $2, reinvested_quantity = $3, pending_bonus = '0'
            WHERE id = $1 AND reinvested = 0
            "#,
        )
        .bind(id)
        .bind(at.to_rfc3339())
        .bind(quantity)
        .execute(&self.store.pool)
        .await
        .context("Failed to mark dividend reinvested")?;
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
