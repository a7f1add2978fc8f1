//! Brokerage adapter contract. The wire client behind it is deliberately out
//! of scope; the sync cycle consumes this trait and tests run against the
//! mock. Symbol-keyed fields here are the one place the legacy symbol alias
//! is allowed to lead; everything past the sync boundary is ISIN-keyed.

use crate::domain::types::TradeSide;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::time::Duration;

/// Hard per-call timeout the jobs wrap adapter calls in.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct BrokerPosition {
    pub symbol: String,
    pub isin: Option<String>,
    pub quantity: i64,
    pub average_cost: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct BrokerCashBalance {
    pub currency: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct BrokerTrade {
    pub symbol: String,
    pub isin: Option<String>,
    pub side: TradeSide,
    pub quantity: i64,
    pub price: Decimal,
    pub fees: Decimal,
    pub currency: String,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CashMovement {
    pub id: String,
    pub amount: Decimal,
    pub currency: String,
    pub occurred_at: DateTime<Utc>,
    pub is_dividend: bool,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CashMovements {
    pub total_withdrawals: Decimal,
    pub movements: Vec<CashMovement>,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: i64,
    pub price: Decimal,
}

#[derive(Debug, Clone)]
pub struct SecurityInfo {
    pub symbol: String,
    pub isin: String,
    pub name: String,
    pub currency: String,
    pub exchange: String,
}

#[async_trait]
pub trait BrokerageAdapter: Send + Sync {
    async fn place_order(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: i64,
    ) -> Result<OrderConfirmation>;

    async fn get_portfolio(&self) -> Result<Vec<BrokerPosition>>;

    async fn get_cash_balances(&self) -> Result<Vec<BrokerCashBalance>>;

    async fn get_cash_movements(&self) -> Result<CashMovements>;

    async fn get_executed_trades(&self, limit: usize) -> Result<Vec<BrokerTrade>>;

    async fn find_symbol(
        &self,
        symbol: &str,
        exchange: Option<&str>,
    ) -> Result<Vec<SecurityInfo>>;
}
