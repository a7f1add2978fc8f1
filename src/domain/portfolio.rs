use crate::domain::types::{Position, Security};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Value-level view of the portfolio used by planning and simulation.
///
/// Cloning is deliberately cheap in the common case: the position map is the
/// only deep copy, while the country/industry attribution maps are shared
/// behind `Arc` and only materialized (`Arc::make_mut`) when a simulated BUY
/// writes to them. Sell-only sequences never copy the attribution maps.
#[derive(Debug, Clone)]
pub struct PortfolioState {
    /// ISIN -> current market value in EUR.
    pub position_values: HashMap<String, Decimal>,
    /// Available cash in EUR.
    pub cash: Decimal,
    /// Country -> aggregate position value in EUR.
    pub country_values: Arc<HashMap<String, Decimal>>,
    /// Industry -> aggregate position value in EUR.
    pub industry_values: Arc<HashMap<String, Decimal>>,
    /// ISIN -> (country, industry) attribution for simulated buys.
    pub attribution: Arc<HashMap<String, (String, String)>>,
}

impl PortfolioState {
    pub fn build(
        positions: &HashMap<String, Position>,
        securities: &HashMap<String, Security>,
        cash: Decimal,
    ) -> Self {
        let mut position_values = HashMap::with_capacity(positions.len());
        let mut country_values: HashMap<String, Decimal> = HashMap::new();
        let mut industry_values: HashMap<String, Decimal> = HashMap::new();
        let mut attribution: HashMap<String, (String, String)> = HashMap::new();

        for (isin, position) in positions {
            position_values.insert(isin.clone(), position.market_value_eur);
            if let Some(security) = securities.get(isin) {
                *country_values
                    .entry(security.country.clone())
                    .or_insert(Decimal::ZERO) += position.market_value_eur;
                *industry_values
                    .entry(security.industry.clone())
                    .or_insert(Decimal::ZERO) += position.market_value_eur;
            }
        }
        for (isin, security) in securities {
            attribution.insert(
                isin.clone(),
                (security.country.clone(), security.industry.clone()),
            );
        }

        Self {
            position_values,
            cash,
            country_values: Arc::new(country_values),
            industry_values: Arc::new(industry_values),
            attribution: Arc::new(attribution),
        }
    }

    pub fn total_value(&self) -> Decimal {
        self.cash + self.position_values.values().copied().sum::<Decimal>()
    }

    pub fn positions_value(&self) -> Decimal {
        self.position_values.values().copied().sum()
    }

    /// Apply a BUY of `value_eur` to the state. Returns false (state
    /// untouched) when cash is insufficient; the caller records the step as
    /// infeasible and continues.
    pub fn apply_buy(&mut self, isin: &str, value_eur: Decimal) -> bool {
        if value_eur > self.cash {
            return false;
        }
        self.cash -= value_eur;
        *self
            .position_values
            .entry(isin.to_string())
            .or_insert(Decimal::ZERO) += value_eur;

        if let Some((country, industry)) = self.attribution.get(isin).cloned() {
            // First write on this path materializes the shared maps.
            *Arc::make_mut(&mut self.country_values)
                .entry(country)
                .or_insert(Decimal::ZERO) += value_eur;
            *Arc::make_mut(&mut self.industry_values)
                .entry(industry)
                .or_insert(Decimal::ZERO) += value_eur;
        }
        true
    }

    /// Apply a SELL of up to `value_eur`. Proceeds are capped at the current
    /// exposure; a position drained to zero is removed entirely. Returns the
    /// realized proceeds.
    pub fn apply_sell(&mut self, isin: &str, value_eur: Decimal) -> Decimal {
        let current = match self.position_values.get(isin) {
            Some(value) => *value,
            None => return Decimal::ZERO,
        };
        let sold = current.min(value_eur);
        let remaining = current - sold;
        if remaining <= Decimal::ZERO {
            self.position_values.remove(isin);
        } else {
            self.position_values.insert(isin.to_string(), remaining);
        }
        self.cash += sold;
        sold
    }

    /// Weight of a country as a fraction of total portfolio value.
    pub fn country_weight(&self, country: &str) -> f64 {
        Self::weight_in(&self.country_values, country, self.total_value())
    }

    pub fn industry_weight(&self, industry: &str) -> f64 {
        Self::weight_in(&self.industry_values, industry, self.total_value())
    }

    /// Weight of one key in an attribution map against a total value.
    pub fn weight_in(values: &HashMap<String, Decimal>, key: &str, total: Decimal) -> f64 {
        if total <= Decimal::ZERO {
            return 0.0;
        }
        let value = values.get(key).copied().unwrap_or(Decimal::ZERO);
        (value / total).to_f64().unwrap_or(0.0)
    }

    /// Herfindahl-style concentration over positions, for diversification
    /// scoring: 1.0 is perfectly spread, 0.0 is a single holding.
    pub fn diversification(&self) -> f64 {
        let total = self.positions_value();
        if total <= Decimal::ZERO || self.position_values.len() <= 1 {
            return if self.position_values.is_empty() { 1.0 } else { 0.0 };
        }
        let hhi: f64 = self
            .position_values
            .values()
            .map(|value| {
                let weight = (*value / total).to_f64().unwrap_or(0.0);
                weight * weight
            })
            .sum();
        let n = self.position_values.len() as f64;
        let min_hhi = 1.0 / n;
        ((1.0 - hhi) / (1.0 - min_hhi)).clamp(0.0, 1.0)
    }
}
