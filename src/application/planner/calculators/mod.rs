//! Opportunity calculators: pure functions from the planning context to
//! candidate actions, grouped by category. A calculator that fails is logged
//! and skipped; the pipeline continues with the remaining categories.

pub mod averaging_down;
pub mod opportunity_buys;
pub mod profit_taking;
pub mod rebalance;
pub mod weight_based;

use crate::application::planner::action::{ActionCandidate, Category};
use crate::application::planner::context::PlanningContext;
use crate::domain::config::PlannerConfig;
use crate::domain::types::TradeSide;
use anyhow::Result;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

pub trait OpportunityCalculator: Send + Sync {
    fn name(&self) -> &'static str;
    fn category(&self) -> Category;
    fn enabled(&self, config: &PlannerConfig) -> bool;
    fn calculate(
        &self,
        ctx: &PlanningContext,
        config: &PlannerConfig,
    ) -> Result<Vec<ActionCandidate>>;
}

pub fn registry() -> Vec<Box<dyn OpportunityCalculator>> {
    vec![
        Box::new(profit_taking::ProfitTakingCalculator),
        Box::new(averaging_down::AveragingDownCalculator),
        Box::new(opportunity_buys::OpportunityBuysCalculator),
        Box::new(rebalance::RebalanceSellsCalculator),
        Box::new(rebalance::RebalanceBuysCalculator),
        Box::new(weight_based::WeightBasedCalculator),
    ]
}

/// Run every enabled calculator, skip failures, and cap each category at the
/// configured maximum by descending priority.
pub fn run_all(
    ctx: &PlanningContext,
    config: &PlannerConfig,
) -> HashMap<Category, Vec<ActionCandidate>> {
    let mut by_category: HashMap<Category, Vec<ActionCandidate>> = HashMap::new();

    for calculator in registry() {
        if !calculator.enabled(config) {
            continue;
        }
        match calculator.calculate(ctx, config) {
            Ok(candidates) => {
                debug!(
                    calculator = calculator.name(),
                    count = candidates.len(),
                    "calculator finished"
                );
                by_category
                    .entry(calculator.category())
                    .or_default()
                    .extend(candidates);
            }
            Err(error) => {
                warn!(
                    calculator = calculator.name(),
                    %error,
                    "calculator failed, skipping its category contribution"
                );
            }
        }
    }

    for candidates in by_category.values_mut() {
        candidates.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(config.max_opportunities_per_category);
    }

    by_category.retain(|_, candidates| !candidates.is_empty());
    by_category
}

/// Build a funded BUY candidate, or nothing when the action cannot be sized
/// above the minimum-trade floor and inside available cash (costs included).
#[allow(clippy::too_many_arguments)]
pub fn buy_candidate(
    ctx: &PlanningContext,
    config: &PlannerConfig,
    isin: &str,
    target_value: Decimal,
    priority: f64,
    reason: String,
    tags: BTreeSet<String>,
) -> Option<ActionCandidate> {
    use rust_decimal::prelude::ToPrimitive;

    if !config.allow_buy {
        return None;
    }
    let security = ctx.securities.get(isin)?;
    if !security.active || !security.allow_buy {
        return None;
    }
    let price = ctx.price(isin)?;
    if price <= Decimal::ZERO {
        return None;
    }

    let quantity = (target_value / price).floor().to_i64().unwrap_or(0);
    if quantity < 1 {
        return None;
    }
    let value_eur = Decimal::from(quantity) * price;
    if value_eur < config.min_trade_amount() {
        return None;
    }
    let total_cost = value_eur + config.transaction_cost(value_eur);
    if total_cost > ctx.available_cash_eur {
        return None;
    }

    Some(ActionCandidate {
        side: TradeSide::Buy,
        isin: isin.to_string(),
        symbol: security.symbol.clone(),
        quantity,
        unit_price: price,
        value_eur,
        currency: security.currency.clone(),
        priority,
        reason,
        tags,
    })
}

/// Build a SELL candidate capped at the held quantity, or nothing when the
/// resulting trade is below the floor or nets out negative after costs.
#[allow(clippy::too_many_arguments)]
pub fn sell_candidate(
    ctx: &PlanningContext,
    config: &PlannerConfig,
    isin: &str,
    quantity: i64,
    priority: f64,
    reason: String,
    tags: BTreeSet<String>,
) -> Option<ActionCandidate> {
    if !config.allow_sell {
        return None;
    }
    let security = ctx.securities.get(isin)?;
    if !security.active || !security.allow_sell {
        return None;
    }
    let position = ctx.positions.get(isin)?;
    let quantity = quantity.min(position.quantity);
    if quantity < 1 {
        return None;
    }
    let price = ctx.price(isin)?;
    if price <= Decimal::ZERO {
        return None;
    }

    let value_eur = Decimal::from(quantity) * price;
    if value_eur < config.min_trade_amount() {
        return None;
    }
    let net = value_eur - config.transaction_cost(value_eur);
    if net <= Decimal::ZERO {
        return None;
    }

    Some(ActionCandidate {
        side: TradeSide::Sell,
        isin: isin.to_string(),
        symbol: security.symbol.clone(),
        quantity,
        unit_price: price,
        value_eur,
        currency: security.currency.clone(),
        priority,
        reason,
        tags,
    })
}

/// Days since the given instant, saturating at zero.
pub(crate) fn days_since(
    now: chrono::DateTime<chrono::Utc>,
    then: chrono::DateTime<chrono::Utc>,
) -> i64 {
    (now - then).num_days().max(0)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_buy_candidate_respects_min_trade_floor() {
        let ctx = context_with(
            vec![security("DE0001", "SAP", "DE", "Tech")],
            vec![],
            dec!(10000),
        );
        let config = PlannerConfig::default();

        // 100 EUR is below the 250 EUR floor at default costs.
        assert!(buy_candidate(
            &ctx,
            &config,
            "DE0001",
            dec!(100),
            1.0,
            "test".to_string(),
            Default::default()
        )
        .is_none());

        let candidate = buy_candidate(
            &ctx,
            &config,
            "DE0001",
            dec!(500),
            1.0,
            "test".to_string(),
            Default::default(),
        )
        .unwrap();
        assert_eq!(candidate.quantity, 50);
        assert_eq!(candidate.value_eur, dec!(500));
    }

    #[test]
    fn test_buy_candidate_requires_funding_including_costs() {
        let ctx = context_with(
            vec![security("DE0001", "SAP", "DE", "Tech")],
            vec![],
            dec!(500),
        );
        let config = PlannerConfig::default();

        // Exactly 500 of stock cannot be funded once costs are added.
        assert!(buy_candidate(
            &ctx,
            &config,
            "DE0001",
            dec!(500),
            1.0,
            "test".to_string(),
            Default::default()
        )
        .is_none());
    }

    #[test]
    fn test_sell_candidate_caps_at_position() {
        let ctx = context_with(
            vec![security("DE0001", "SAP", "DE", "Tech")],
            vec![("DE0001", 30, dec!(8), dec!(10))],
            dec!(0),
        );
        let config = PlannerConfig::default();

        let candidate = sell_candidate(
            &ctx,
            &config,
            "DE0001",
            100,
            1.0,
            "test".to_string(),
            Default::default(),
        )
        .unwrap();
        assert_eq!(candidate.quantity, 30);
        assert_eq!(candidate.value_eur, dec!(300));
    }

    #[test]
    fn test_global_allow_flags_suppress_candidates() {
        let ctx = context_with(
            vec![security("DE0001", "SAP", "DE", "Tech")],
            vec![("DE0001", 100, dec!(8), dec!(10))],
            dec!(10000),
        );
        let config = PlannerConfig {
            allow_buy: false,
            ..Default::default()
        };
        assert!(buy_candidate(
            &ctx,
            &config,
            "DE0001",
            dec!(500),
            1.0,
            "x".to_string(),
            Default::default()
        )
        .is_none());

        let config = PlannerConfig {
            allow_sell: false,
            ..Default::default()
        };
        assert!(sell_candidate(
            &ctx,
            &config,
            "DE0001",
            50,
            1.0,
            "x".to_string(),
            Default::default()
        )
        .is_none());
    }
}
