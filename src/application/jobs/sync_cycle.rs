//! The periodic brokerage reconciliation cycle. Steps run strictly in
//! order; only the position sync is critical. Non-critical steps log and
//! keep the cycle moving.

use crate::application::jobs::Job;
use crate::domain::calendar::MarketCalendar;
use crate::domain::types::{CashBalances, Dividend, Position, Security, Trade};
use crate::infrastructure::brokerage::{BrokerageAdapter, CALL_TIMEOUT};
use crate::infrastructure::display::{DisplaySink, IndicatorState};
use crate::infrastructure::persistence::repositories::{
    CashRepository, DividendRepository, HistoryRepository, PositionRepository,
    SecurityRepository, TradeRepository,
};
use crate::infrastructure::quotes::QuoteAdapter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Invoked when any currency balance goes negative; the implementation is
/// expected to raise cash (or at least raise an operator).
#[async_trait]
pub trait EmergencyRebalanceHook: Send + Sync {
    async fn trigger(&self, negative_balances: &[(String, Decimal)]);
}

pub struct SyncCycleJob {
    pub brokerage: Arc<dyn BrokerageAdapter>,
    pub quotes: Arc<dyn QuoteAdapter>,
    pub display: Arc<dyn DisplaySink>,
    pub calendar: Arc<MarketCalendar>,
    pub securities: Arc<SecurityRepository>,
    pub positions: Arc<PositionRepository>,
    pub trades: Arc<TradeRepository>,
    pub dividends: Arc<DividendRepository>,
    pub cash: Arc<CashRepository>,
    pub history: Arc<HistoryRepository>,
    pub rebalance_hook: Option<Arc<dyn EmergencyRebalanceHook>>,
}

async fn with_timeout<T, F: Future<Output = Result<T>>>(call: F) -> Result<T> {
    tokio::time::timeout(CALL_TIMEOUT, call)
        .await
        .map_err(|_| anyhow::anyhow!("brokerage call timed out after {:?}", CALL_TIMEOUT))?
}

impl SyncCycleJob {
    async fn symbol_index(&self) -> Result<HashMap<String, Security>> {
        // Compatibility shim: brokerage rows lead with the display symbol,
        // everything downstream is ISIN-keyed.
        let securities = self.securities.get_all_active().await?;
        Ok(securities
            .into_values()
            .map(|security| (security.symbol.clone(), security))
            .collect())
    }

    async fn sync_trades(&self) -> Result<usize> {
        let broker_trades = with_timeout(self.brokerage.get_executed_trades(200)).await?;
        let by_symbol = self.symbol_index().await?;

        let mut appended = 0;
        for broker_trade in broker_trades {
            let isin = match broker_trade
                .isin
                .clone()
                .or_else(|| by_symbol.get(&broker_trade.symbol).map(|s| s.isin.clone()))
            {
                Some(isin) => isin,
                None => {
                    warn!(symbol = %broker_trade.symbol, "trade for unknown security, skipping");
                    continue;
                }
            };
            let trade = Trade {
                id: None,
                isin,
                side: broker_trade.side,
                quantity: broker_trade.quantity,
                price: broker_trade.price,
                fees: broker_trade.fees,
                currency: broker_trade.currency,
                executed_at: broker_trade.executed_at,
                created_at: Utc::now(),
            };
            if self.trades.append(&trade).await? {
                appended += 1;
            }
        }
        Ok(appended)
    }

    async fn sync_cash_flows(&self) -> Result<usize> {
        let movements = with_timeout(self.brokerage.get_cash_movements()).await?;
        let by_symbol = self.symbol_index().await?;

        let mut recorded = 0;
        for movement in movements.movements {
            if !movement.is_dividend {
                continue;
            }
            let isin = match movement
                .symbol
                .as_ref()
                .and_then(|symbol| by_symbol.get(symbol))
                .map(|s| s.isin.clone())
            {
                Some(isin) => isin,
                None => {
                    warn!(id = %movement.id, "dividend for unknown security, skipping");
                    continue;
                }
            };
            let dividend = Dividend {
                id: None,
                isin,
                cash_flow_id: Some(movement.id.clone()),
                amount: movement.amount,
                currency: movement.currency.clone(),
                amount_eur: movement.amount,
                payment_date: movement.occurred_at.date_naive(),
                reinvested: false,
                reinvested_at: None,
                reinvested_quantity: None,
                pending_bonus: Decimal::ZERO,
                bonus_cleared: false,
            };
            if self.dividends.record(&dividend).await? {
                recorded += 1;
            }
        }
        Ok(recorded)
    }

    async fn sync_positions(&self) -> Result<usize> {
        let broker_positions = with_timeout(self.brokerage.get_portfolio()).await?;
        let by_symbol = self.symbol_index().await?;

        let mut positions = Vec::with_capacity(broker_positions.len());
        for broker_position in broker_positions {
            let isin = match broker_position
                .isin
                .clone()
                .or_else(|| {
                    by_symbol
                        .get(&broker_position.symbol)
                        .map(|s| s.isin.clone())
                }) {
                Some(isin) => isin,
                None => {
                    warn!(
                        symbol = %broker_position.symbol,
                        "position for unknown security, attempting discovery"
                    );
                    match self.discover_security(&broker_position.symbol).await {
                        Ok(Some(isin)) => isin,
                        _ => continue,
                    }
                }
            };
            let value = Decimal::from(broker_position.quantity) * broker_position.average_cost;
            positions.push(Position {
                isin,
                quantity: broker_position.quantity,
                average_cost: broker_position.average_cost,
                currency: broker_position.currency,
                current_price: broker_position.average_cost,
                market_value_eur: value,
                last_updated: Utc::now(),
            });
        }

        self.positions
            .replace_all(&positions)
            .await
            .context("position reconciliation failed")?;
        Ok(positions.len())
    }

    /// First discovery creates the security; it is never deleted afterwards.
    async fn discover_security(&self, symbol: &str) -> Result<Option<String>> {
        let matches = with_timeout(self.brokerage.find_symbol(symbol, None)).await?;
        let info = match matches.into_iter().next() {
            Some(info) => info,
            None => return Ok(None),
        };
        let security = Security {
            isin: info.isin.clone(),
            symbol: info.symbol,
            name: info.name,
            currency: info.currency,
            country: String::new(),
            industry: String::new(),
            exchange: info.exchange,
            active: true,
            allow_buy: true,
            allow_sell: true,
            min_weight_target: None,
            max_weight_target: None,
        };
        self.securities.upsert(&security).await?;
        info!(isin = %security.isin, "discovered new security");
        Ok(Some(security.isin))
    }

    async fn check_negative_balances(&self) -> Result<()> {
        let broker_balances = with_timeout(self.brokerage.get_cash_balances()).await?;
        let mut balances = CashBalances::default();
        for balance in broker_balances {
            balances.set(&balance.currency, balance.amount);
        }
        self.cash.replace_all(&balances).await?;

        let negatives = balances.negative_currencies();
        if !negatives.is_empty() {
            warn!(?negatives, "negative cash balances detected");
            if let Some(hook) = &self.rebalance_hook {
                hook.trigger(&negatives).await;
            }
        }
        Ok(())
    }

    /// Price refresh, restricted to exchanges currently inside a trading
    /// window; closed markets keep their last close.
    async fn sync_prices(&self) -> Result<usize> {
        let securities = self.securities.get_all_active().await?;
        let positions = self.positions.get_all().await?;
        let now = Utc::now();
        let today = now.date_naive();

        let mut updated = 0;
        for (isin, security) in securities {
            if !self.calendar.is_open(&security.exchange, now) {
                continue;
            }
            let price = match self.quotes.get_current_price(&security.symbol).await {
                Ok(price) => price,
                Err(error) => {
                    warn!(symbol = %security.symbol, %error, "price refresh failed");
                    continue;
                }
            };
            if let Some(position) = positions.get(&isin) {
                let value = Decimal::from(position.quantity) * price;
                self.positions.update_price(&isin, price, value).await?;
            }
            self.history.append_close(&isin, today, price).await?;
            updated += 1;
        }
        Ok(updated)
    }
}

#[async_trait]
impl Job for SyncCycleJob {
    fn name(&self) -> &'static str {
        "sync_cycle"
    }

    async fn run(&self) -> Result<()> {
        self.display.set_indicator(IndicatorState::Syncing).await;

        match self.sync_trades().await {
            Ok(appended) => info!(appended, "trade sync finished"),
            Err(error) => warn!(%error, "trade sync failed, continuing"),
        }
        match self.sync_cash_flows().await {
            Ok(recorded) => info!(recorded, "cash-flow sync finished"),
            Err(error) => warn!(%error, "cash-flow sync failed, continuing"),
        }

        // The one critical step: without a trustworthy position set, nothing
        // downstream (planning included) can be trusted either.
        if let Err(error) = self.sync_positions().await {
            error!(%error, "position sync failed, aborting cycle");
            self.display.set_indicator(IndicatorState::Error).await;
            return Err(error);
        }

        if let Err(error) = self.check_negative_balances().await {
            warn!(%error, "negative-balance check failed, continuing");
        }
        match self.sync_prices().await {
            Ok(updated) => info!(updated, "price sync finished"),
            Err(error) => warn!(%error, "price sync failed, continuing"),
        }

        self.display.update_ticker().await;
        self.display.set_indicator(IndicatorState::Idle).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::brokerage::{BrokerCashBalance, BrokerPosition};
    use crate::infrastructure::mock::{MockBrokerage, MockQuotes, RecordingDisplay};
    use crate::infrastructure::persistence::database::Stores;
    use rust_decimal_macros::dec;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    struct RecordingHook {
        triggered: Mutex<Vec<(String, Decimal)>>,
    }

    #[async_trait]
    impl EmergencyRebalanceHook for RecordingHook {
        async fn trigger(&self, negative_balances: &[(String, Decimal)]) {
            self.triggered
                .lock()
                .expect("hook lock poisoned")
                .extend_from_slice(negative_balances);
        }
    }

    async fn job_with(
        brokerage: Arc<MockBrokerage>,
        hook: Option<Arc<RecordingHook>>,
    ) -> (tempfile::TempDir, SyncCycleJob, Arc<RecordingDisplay>) {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::open_all(dir.path()).await.unwrap();
        let display = Arc::new(RecordingDisplay::default());

        let securities = Arc::new(SecurityRepository::new(stores.core.clone()));
        securities
            .upsert(&Security {
                isin: "DE0007164600".to_string(),
                symbol: "SAP".to_string(),
                name: "SAP SE".to_string(),
                currency: "EUR".to_string(),
                country: "DE".to_string(),
                industry: "Software".to_string(),
                exchange: "XETRA".to_string(),
                active: true,
                allow_buy: true,
                allow_sell: true,
                min_weight_target: None,
                max_weight_target: None,
            })
            .await
            .unwrap();

        let job = SyncCycleJob {
            brokerage,
            quotes: Arc::new(MockQuotes::default()),
            display: display.clone(),
            calendar: Arc::new(MarketCalendar::default()),
            securities,
            positions: Arc::new(PositionRepository::new(stores.core.clone())),
            trades: Arc::new(TradeRepository::new(stores.ledger.clone())),
            dividends: Arc::new(DividendRepository::new(stores.dividends.clone())),
            cash: Arc::new(CashRepository::new(stores.core.clone())),
            history: Arc::new(HistoryRepository::new(stores.clone())),
            rebalance_hook: hook.map(|h| h as Arc<dyn EmergencyRebalanceHook>),
        };
        (dir, job, display)
    }

    #[tokio::test]
    async fn test_happy_cycle_transitions_syncing_then_idle() {
        let brokerage = Arc::new(MockBrokerage::default());
        brokerage
            .positions
            .lock()
            .unwrap()
            .push(BrokerPosition {
                symbol: "SAP".to_string(),
                isin: Some("DE0007164600".to_string()),
                quantity: 10,
                average_cost: dec!(100),
                currency: "EUR".to_string(),
            });

        let (_dir, job, display) = job_with(brokerage, None).await;
        job.run().await.unwrap();

        let states = display.states.lock().unwrap().clone();
        assert_eq!(
            states,
            vec![IndicatorState::Syncing, IndicatorState::Idle]
        );
        assert_eq!(display.ticker_updates.load(Ordering::SeqCst), 1);

        let positions = job.positions.get_all().await.unwrap();
        assert_eq!(positions["DE0007164600"].quantity, 10);
    }

    #[tokio::test]
    async fn test_critical_failure_aborts_and_shows_error() {
        let brokerage = Arc::new(MockBrokerage::default());
        brokerage.fail_portfolio.store(true, Ordering::SeqCst);

        let (_dir, job, display) = job_with(brokerage, None).await;
        assert!(job.run().await.is_err());

        let states = display.states.lock().unwrap().clone();
        assert_eq!(states, vec![IndicatorState::Syncing, IndicatorState::Error]);
        // Ticker is never reached on the critical path.
        assert_eq!(display.ticker_updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_negative_balance_invokes_rebalance_hook() {
        let brokerage = Arc::new(MockBrokerage::default());
        brokerage.cash.lock().unwrap().extend([
            BrokerCashBalance {
                currency: "EUR".to_string(),
                amount: dec!(-25.50),
            },
            BrokerCashBalance {
                currency: "USD".to_string(),
                amount: dec!(100),
            },
        ]);
        let hook = Arc::new(RecordingHook {
            triggered: Mutex::new(Vec::new()),
        });

        let (_dir, job, _display) = job_with(brokerage, Some(hook.clone())).await;
        job.run().await.unwrap();

        let triggered = hook.triggered.lock().unwrap().clone();
        assert_eq!(triggered, vec![("EUR".to_string(), dec!(-25.50))]);
    }
}
