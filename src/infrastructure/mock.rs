//! Deterministic in-memory adapters for tests and offline runs.

use crate::infrastructure::brokerage::{
    BrokerCashBalance, BrokerPosition, BrokerTrade, BrokerageAdapter, CashMovements,
    OrderConfirmation, SecurityInfo,
};
use crate::infrastructure::display::{DisplaySink, IndicatorState};
use crate::infrastructure::quotes::{AnalystData, FundamentalData, QuoteAdapter};
use crate::domain::types::TradeSide;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MockBrokerage {
    pub positions: Mutex<Vec<BrokerPosition>>,
    pub cash: Mutex<Vec<BrokerCashBalance>>,
    pub trades: Mutex<Vec<BrokerTrade>>,
    pub movements: Mutex<CashMovements>,
    pub securities: Mutex<Vec<SecurityInfo>>,
    /// Force the portfolio call (the critical sync step) to fail.
    pub fail_portfolio: AtomicBool,
    pub orders_placed: Mutex<Vec<OrderConfirmation>>,
}

#[async_trait]
impl BrokerageAdapter for MockBrokerage {
    async fn place_order(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: i64,
    ) -> Result<OrderConfirmation> {
        let confirmation = OrderConfirmation {
            order_id: format!("mock-{}-{}", symbol, quantity),
            symbol: symbol.to_string(),
            side,
            quantity,
            price: Decimal::from(100),
        };
        self.orders_placed
            .lock()
            .expect("mock lock poisoned")
            .push(confirmation.clone());
        Ok(confirmation)
    }

    async fn get_portfolio(&self) -> Result<Vec<BrokerPosition>> {
        if self.fail_portfolio.load(Ordering::SeqCst) {
            anyhow::bail!("brokerage portfolio endpoint unavailable");
        }
        Ok(self.positions.lock().expect("mock lock poisoned").clone())
    }

    async fn get_cash_balances(&self) -> Result<Vec<BrokerCashBalance>> {
        Ok(self.cash.lock().expect("mock lock poisoned").clone())
    }

    async fn get_cash_movements(&self) -> Result<CashMovements> {
        Ok(self.movements.lock().expect("mock lock poisoned").clone())
    }

    async fn get_executed_trades(&self, limit: usize) -> Result<Vec<BrokerTrade>> {
        let trades = self.trades.lock().expect("mock lock poisoned");
        Ok(trades.iter().take(limit).cloned().collect())
    }

    async fn find_symbol(
        &self,
        symbol: &str,
        _exchange: Option<&str>,
    ) -> Result<Vec<SecurityInfo>> {
        Ok(self
            .securities
            .lock()
            .expect("mock lock poisoned")
            .iter()
            .filter(|info| info.symbol == symbol)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MockQuotes {
    pub prices: Mutex<HashMap<String, Decimal>>,
    pub industries: Mutex<HashMap<String, String>>,
    pub fail_all: AtomicBool,
}

#[async_trait]
impl QuoteAdapter for MockQuotes {
    async fn get_current_price(&self, symbol: &str) -> Result<Decimal> {
        if self.fail_all.load(Ordering::SeqCst) {
            anyhow::bail!("quote provider offline");
        }
        self.prices
            .lock()
            .expect("mock lock poisoned")
            .get(symbol)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no quote for {}", symbol))
    }

    async fn get_fundamental_data(&self, _symbol: &str) -> Result<FundamentalData> {
        Ok(FundamentalData {
            pe_ratio: Some(18.0),
            financial_strength: Some(0.7),
            dividend_yield: Some(0.025),
        })
    }

    async fn get_analyst_data(&self, _symbol: &str) -> Result<AnalystData> {
        Ok(AnalystData::default())
    }

    async fn get_security_industry(&self, symbol: &str) -> Result<String> {
        Ok(self
            .industries
            .lock()
            .expect("mock lock poisoned")
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| "Diversified".to_string()))
    }

    async fn get_country_and_exchange(&self, _symbol: &str) -> Result<(String, String)> {
        Ok(("DE".to_string(), "XETRA".to_string()))
    }
}

/// Records every indicator transition for assertions.
#[derive(Default)]
pub struct RecordingDisplay {
    pub states: Mutex<Vec<IndicatorState>>,
    pub ticker_updates: AtomicU32,
}

#[async_trait]
impl DisplaySink for RecordingDisplay {
    async fn set_indicator(&self, state: IndicatorState) {
        self.states.lock().expect("mock lock poisoned").push(state);
    }

    async fn update_ticker(&self) {
        self.ticker_updates.fetch_add(1, Ordering::SeqCst);
    }
}
