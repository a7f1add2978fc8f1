//! Application wiring: opens the stores, builds the planner and jobs, and
//! runs the scheduler until shutdown.

use crate::application::correlation::HistoryCorrelationService;
use crate::application::jobs::bucket_maintenance::{
    BucketMaintenanceJob, CorePortfolioValuation,
};
use crate::application::jobs::health::HealthCheckJob;
use crate::application::jobs::scheduler::Scheduler;
use crate::application::jobs::sync_cycle::SyncCycleJob;
use crate::application::jobs::JobRunner;
use crate::application::locks::LockManager;
use crate::application::planner::context::PlanningContext;
use crate::application::planner::filters::FilterCapabilities;
use crate::application::planner::plan::HolisticPlan;
use crate::application::planner::PlannerService;
use crate::config::Config;
use crate::domain::calendar::MarketCalendar;
use crate::domain::config::PlannerConfig;
use crate::domain::formulas;
use crate::domain::scoring::{self, SecurityMetrics, SellInputs, SellWeights};
use crate::domain::types::TradeSide;
use crate::infrastructure::brokerage::BrokerageAdapter;
use crate::infrastructure::display::DisplaySink;
use crate::infrastructure::persistence::database::Stores;
use crate::infrastructure::persistence::repositories::{
    AllocationRepository, BucketRepository, CashRepository, DividendRepository,
    HistoryRepository, LockRepository, PositionRepository, SecurityRepository,
    SettingsRepository, TradeRepository,
};
use crate::infrastructure::quotes::QuoteAdapter;
use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Price-history window driving metrics and correlation.
const METRICS_LOOKBACK_DAYS: u32 = 252;

pub struct Application {
    pub config: Config,
    pub stores: Stores,
    pub securities: Arc<SecurityRepository>,
    pub positions: Arc<PositionRepository>,
    pub trades: Arc<TradeRepository>,
    pub dividends: Arc<DividendRepository>,
    pub cash: Arc<CashRepository>,
    pub buckets: Arc<BucketRepository>,
    pub allocations: Arc<AllocationRepository>,
    pub settings: Arc<SettingsRepository>,
    pub history: Arc<HistoryRepository>,
    pub locks: Arc<LockManager>,
    pub planner: Arc<PlannerService>,
    pub calendar: Arc<MarketCalendar>,
    brokerage: Arc<dyn BrokerageAdapter>,
    quotes: Arc<dyn QuoteAdapter>,
    display: Arc<dyn DisplaySink>,
}

impl Application {
    pub async fn build(
        config: Config,
        brokerage: Arc<dyn BrokerageAdapter>,
        quotes: Arc<dyn QuoteAdapter>,
        display: Arc<dyn DisplaySink>,
    ) -> Result<Self> {
        info!(data_dir = %config.data_dir.display(), "building application");
        let stores = Stores::open_all(&config.data_dir).await?;

        let securities = Arc::new(SecurityRepository::new(stores.core.clone()));
        let positions = Arc::new(PositionRepository::new(stores.core.clone()));
        let trades = Arc::new(TradeRepository::new(stores.ledger.clone()));
        let dividends = Arc::new(DividendRepository::new(stores.dividends.clone()));
        let cash = Arc::new(CashRepository::new(stores.core.clone()));
        let buckets = Arc::new(BucketRepository::new(stores.core.clone()));
        let allocations = Arc::new(AllocationRepository::new(stores.core.clone()));
        let settings = Arc::new(SettingsRepository::new(stores.core.clone()));
        let history = Arc::new(HistoryRepository::new(stores.clone()));
        let locks = Arc::new(LockManager::new(LockRepository::new(stores.locks.clone())));

        buckets.ensure_core().await?;

        let planner_config = match &config.planner_config_path {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading planner config {}", path.display()))?;
                toml::from_str::<PlannerConfig>(&raw)
                    .with_context(|| format!("parsing planner config {}", path.display()))?
            }
            None => PlannerConfig::default(),
        };

        let capabilities = FilterCapabilities {
            correlation: Some(Arc::new(HistoryCorrelationService::new(history.clone()))),
        };
        let planner = Arc::new(PlannerService::new(
            planner_config,
            capabilities,
            config.planner_timeout,
        )?);

        Ok(Self {
            config,
            stores,
            securities,
            positions,
            trades,
            dividends,
            cash,
            buckets,
            allocations,
            settings,
            history,
            locks,
            planner,
            calendar: Arc::new(MarketCalendar::default()),
            brokerage,
            quotes,
            display,
        })
    }

    /// Assemble the snapshot a planner invocation reads. Everything comes
    /// from the stores; no adapter call happens on the planning path.
    pub async fn planning_context(&self) -> Result<PlanningContext> {
        let securities = self.securities.get_all_active().await?;
        let positions = self.positions.get_all().await?;
        let cash = self.cash.load().await?;
        let settings = self.settings.load().await?;
        let allocations = self.allocations.load_targets().await?;
        let country_groups = self
            .allocations
            .load_grouping(crate::domain::types::AllocationKind::CountryGroup)
            .await?;
        let industry_groups = self
            .allocations
            .load_grouping(crate::domain::types::AllocationKind::IndustryGroup)
            .await?;

        let mut prices: HashMap<String, Decimal> = HashMap::new();
        let mut metrics: HashMap<String, SecurityMetrics> = HashMap::new();
        let mut scores = HashMap::new();
        let mut recent_mean_returns = Vec::new();

        for (isin, position) in &positions {
            prices.insert(isin.clone(), position.current_price);
        }

        for isin in securities.keys() {
            let closes = self
                .history
                .recent_closes(isin, METRICS_LOOKBACK_DAYS)
                .await?;
            if !prices.contains_key(isin) {
                if let Some(price) = closes.last().and_then(|last| Decimal::from_f64(*last)) {
                    prices.insert(isin.clone(), price);
                }
            }
            let security_metrics = metrics_from_closes(&closes);
            if closes.len() > 20 {
                let recent = formulas::returns(&closes[closes.len() - 21..]);
                if !recent.is_empty() {
                    recent_mean_returns
                        .push(recent.iter().sum::<f64>() / recent.len() as f64);
                }
            }
            scores.insert(isin.clone(), scoring::score_security(&security_metrics));
            metrics.insert(isin.clone(), security_metrics);
        }

        let recently_sold = self.trades.last_trade_times(TradeSide::Sell).await?;
        let recently_bought = self.trades.last_trade_times(TradeSide::Buy).await?;
        let holding_since = self.trades.first_buy_times().await?;

        let now = Utc::now();
        let available_cash_eur = cash.get("EUR");
        let total_value = available_cash_eur
            + positions
                .values()
                .map(|p| p.market_value_eur)
                .sum::<Decimal>();

        // Sell pressure needs position context, so it is filled in here
        // rather than in the pure per-security scoring pass.
        for (isin, position) in &positions {
            if let Some(score) = scores.get_mut(isin) {
                let weight = if total_value > Decimal::ZERO {
                    (position.market_value_eur / total_value)
                        .to_f64()
                        .unwrap_or(0.0)
                } else {
                    0.0
                };
                let security_metrics = metrics.get(isin).cloned().unwrap_or_default();
                let years_held = holding_since
                    .get(isin)
                    .map(|since| (now - *since).num_days().max(0) as f64 / 365.25)
                    .unwrap_or(0.0);
                let expected_gain =
                    (1.0 + security_metrics.historical_cagr).powf(years_held) - 1.0;
                let inputs = SellInputs {
                    underperformance: (expected_gain
                        - position.unrealized_gain_fraction())
                    .max(0.0),
                    years_held,
                    weight_fraction: weight,
                    max_weight_target: securities
                        .get(isin)
                        .and_then(|s| s.max_weight_target)
                        .and_then(|t| t.to_f64())
                        .unwrap_or(0.0),
                    volatility: security_metrics.volatility,
                    drawdown: security_metrics.max_drawdown,
                };
                score.sell_pressure = scoring::sell_score(&inputs, &SellWeights::default());
            }
        }

        // Regime: mean of recent daily returns across the universe, scaled
        // so +/-0.5% per day saturates the score.
        let market_regime = if recent_mean_returns.is_empty() {
            0.0
        } else {
            let mean =
                recent_mean_returns.iter().sum::<f64>() / recent_mean_returns.len() as f64;
            (mean / 0.005).clamp(-1.0, 1.0)
        };

        // Behavior signal: recent trade flow imbalance.
        let cutoff = now - ChronoDuration::days(30);
        let recent_buys = recently_bought.values().filter(|at| **at > cutoff).count() as f64;
        let recent_sells = recently_sold.values().filter(|at| **at > cutoff).count() as f64;
        let adaptive_signal = if recent_buys + recent_sells > 0.0 {
            (recent_buys - recent_sells) / (recent_buys + recent_sells)
        } else {
            0.0
        };

        Ok(PlanningContext {
            securities,
            positions,
            prices,
            cash,
            available_cash_eur,
            settings,
            allocations,
            country_groups,
            industry_groups,
            pending_orders: Vec::new(),
            scores,
            metrics,
            ineligible: Default::default(),
            recently_sold,
            recently_bought,
            holding_since,
            market_regime,
            adaptive_signal,
            now,
        })
    }

    pub async fn recommend(&self) -> Result<HolisticPlan> {
        let ctx = self.planning_context().await?;
        Ok(self.planner.create_plan(&ctx).await)
    }

    /// Register the periodic jobs and run the scheduler until `shutdown`
    /// flips true.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let runner = Arc::new(JobRunner::new(self.locks.clone()));
        let mut scheduler = Scheduler::new(runner, self.config.shutdown_grace);

        let sync_job = Arc::new(SyncCycleJob {
            brokerage: self.brokerage.clone(),
            quotes: self.quotes.clone(),
            display: self.display.clone(),
            calendar: self.calendar.clone(),
            securities: self.securities.clone(),
            positions: self.positions.clone(),
            trades: self.trades.clone(),
            dividends: self.dividends.clone(),
            cash: self.cash.clone(),
            history: self.history.clone(),
            rebalance_hook: None,
        });
        scheduler.register(
            &format!("@every {}m", self.config.sync_interval_minutes),
            sync_job,
        )?;

        let health_job = Arc::new(HealthCheckJob {
            stores: self.stores.clone(),
            history: self.history.clone(),
            locks: self.locks.clone(),
            stuck_lock_age: ChronoDuration::hours(1),
        });
        scheduler.register("@every 6h", health_job)?;

        let bucket_job = Arc::new(BucketMaintenanceJob {
            buckets: self.buckets.clone(),
            valuation: Arc::new(CorePortfolioValuation {
                positions: self.positions.clone(),
                cash: self.cash.clone(),
            }),
        });
        scheduler.register("0 30 5 * * *", bucket_job)?;

        info!("scheduler starting");
        scheduler.run(shutdown).await;
        info!("scheduler stopped");
        Ok(())
    }
}

fn metrics_from_closes(closes: &[f64]) -> SecurityMetrics {
    if closes.len() < 2 {
        return SecurityMetrics::default();
    }
    let returns = formulas::returns(closes);
    let first = closes[0];
    let last = *closes.last().expect("checked non-empty");
    let years = closes.len() as f64 / formulas::TRADING_DAYS_PER_YEAR;
    let total_gain = if first > 0.0 { last / first - 1.0 } else { 0.0 };

    let high = closes.iter().cloned().fold(f64::MIN, f64::max);
    let discount_from_high = if high > 0.0 { (high - last) / high } else { 0.0 };

    let ema_distance = formulas::ema(closes, 50)
        .filter(|ema| *ema > 0.0)
        .map(|ema| (last - ema) / ema)
        .unwrap_or(0.0);

    let positive_years = returns
        .chunks(21)
        .filter(|month| month.iter().sum::<f64>() > 0.0)
        .count() as f64;
    let month_count = (returns.len() / 21).max(1) as f64;

    SecurityMetrics {
        historical_cagr: formulas::cagr(total_gain, years.max(0.1)),
        consistency: (positive_years / month_count).clamp(0.0, 1.0),
        financial_strength: 0.5,
        sharpe: formulas::sharpe_ratio(&returns, 0.02),
        max_drawdown: formulas::max_drawdown(closes),
        discount_from_high,
        ema_distance,
        pe_ratio: None,
        rsi: formulas::rsi(closes, 14),
        bollinger_position: formulas::bollinger_position(closes, 20, 2.0),
        volatility: formulas::annualized_volatility(&returns),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_from_short_series_are_default() {
        let metrics = metrics_from_closes(&[100.0]);
        assert_eq!(metrics.historical_cagr, 0.0);
        assert_eq!(metrics.volatility, 0.0);
    }

    #[test]
    fn test_metrics_reflect_trend() {
        let closes: Vec<f64> = (0..260).map(|i| 100.0 * 1.0005f64.powi(i)).collect();
        let metrics = metrics_from_closes(&closes);
        assert!(metrics.historical_cagr > 0.0);
        assert!(metrics.discount_from_high < 0.01);
        assert!(metrics.max_drawdown < 0.01);
    }
}
