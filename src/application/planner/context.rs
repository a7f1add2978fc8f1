use crate::domain::portfolio::PortfolioState;
use crate::domain::scoring::{SecurityMetrics, SecurityScores};
use crate::domain::settings::Settings;
use crate::domain::types::{
    AllocationTarget, CashBalances, Grouping, PendingOrder, Position, Security,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

/// Everything one planner invocation reads: a consistent snapshot of the
/// portfolio, universe, market data and behavioral state. Built once per
/// request; the pipeline never reaches back into the stores.
#[derive(Debug, Clone, Default)]
pub struct PlanningContext {
    /// Active universe, keyed by ISIN.
    pub securities: HashMap<String, Security>,
    /// Held positions, keyed by ISIN. Quantity zero means no entry.
    pub positions: HashMap<String, Position>,
    /// Current prices in EUR, keyed by ISIN.
    pub prices: HashMap<String, Decimal>,
    pub cash: CashBalances,
    /// Spendable cash in EUR after currency conversion.
    pub available_cash_eur: Decimal,
    pub settings: Settings,
    pub allocations: Vec<AllocationTarget>,
    pub country_groups: Grouping,
    pub industry_groups: Grouping,
    pub pending_orders: Vec<PendingOrder>,
    /// Planning scores, keyed by ISIN.
    pub scores: HashMap<String, SecurityScores>,
    /// Raw metrics (volatility, CAGR and friends), keyed by ISIN.
    pub metrics: HashMap<String, SecurityMetrics>,
    /// ISINs excluded from trading by operator or policy.
    pub ineligible: HashSet<String>,
    /// ISIN -> last sell time, for cooldown checks.
    pub recently_sold: HashMap<String, DateTime<Utc>>,
    /// ISIN -> last buy time.
    pub recently_bought: HashMap<String, DateTime<Utc>>,
    /// ISIN -> first acquisition time of the open position.
    pub holding_since: HashMap<String, DateTime<Utc>>,
    /// Regime score in [-1, 1]: -1 deep risk-off, +1 broad risk-on.
    pub market_regime: f64,
    /// Recent-behavior signal in [-1, 1] driving the adaptive pattern.
    pub adaptive_signal: f64,
    pub now: DateTime<Utc>,
}

impl PlanningContext {
    pub fn portfolio_state(&self) -> PortfolioState {
        PortfolioState::build(&self.positions, &self.securities, self.available_cash_eur)
    }

    pub fn price(&self, isin: &str) -> Option<Decimal> {
        self.prices.get(isin).copied()
    }

    pub fn score(&self, isin: &str) -> SecurityScores {
        self.scores.get(isin).copied().unwrap_or_default()
    }

    pub fn symbol<'a>(&'a self, isin: &'a str) -> &'a str {
        self.securities
            .get(isin)
            .map(|s| s.symbol.as_str())
            .unwrap_or(isin)
    }

    pub fn total_value_eur(&self) -> Decimal {
        self.available_cash_eur
            + self
                .positions
                .values()
                .map(|p| p.market_value_eur)
                .sum::<Decimal>()
    }

    pub fn years_held(&self, isin: &str) -> f64 {
        match self.holding_since.get(isin) {
            Some(since) => {
                let days = (self.now - *since).num_days().max(0) as f64;
                days / 365.25
            }
            None => 0.0,
        }
    }

    pub fn is_held(&self, isin: &str) -> bool {
        self.positions.contains_key(isin)
    }

    /// Weight of one security in the portfolio, 0..1.
    pub fn position_weight(&self, isin: &str) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        let total = self.total_value_eur();
        if total <= Decimal::ZERO {
            return 0.0;
        }
        let value = self
            .positions
            .get(isin)
            .map(|p| p.market_value_eur)
            .unwrap_or(Decimal::ZERO);
        (value / total).to_f64().unwrap_or(0.0)
    }
}
