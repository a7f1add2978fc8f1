//! Group rebalancing: sells trim overweight country/industry groups, buys
//! top up underweight ones. Group membership comes from the persisted
//! groupings; weights are fractions of total portfolio value.

use crate::application::planner::action::{ActionCandidate, Category};
use crate::application::planner::calculators::{
    buy_candidate, sell_candidate, OpportunityCalculator,
};
use crate::application::planner::context::PlanningContext;
use crate::domain::config::PlannerConfig;
use crate::domain::types::{AllocationKind, AllocationTarget};
use anyhow::Result;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// Current weight of an allocation group's members, and the members' ISINs
/// (held or buyable) for acting on the deviation.
fn group_exposure(ctx: &PlanningContext, target: &AllocationTarget) -> (f64, Vec<String>) {
    let total = ctx.total_value_eur();
    if total <= Decimal::ZERO {
        return (0.0, Vec::new());
    }

    let grouping = match target.kind {
        AllocationKind::CountryGroup => &ctx.country_groups,
        AllocationKind::IndustryGroup => &ctx.industry_groups,
    };
    let members = match grouping.members(&target.name) {
        Some(members) => members,
        None => return (0.0, Vec::new()),
    };

    let mut group_value = Decimal::ZERO;
    let mut isins = Vec::new();
    for (isin, security) in &ctx.securities {
        let attribute = match target.kind {
            AllocationKind::CountryGroup => &security.country,
            AllocationKind::IndustryGroup => &security.industry,
        };
        if !members.contains(attribute) {
            continue;
        }
        isins.push(isin.clone());
        if let Some(position) = ctx.positions.get(isin) {
            group_value += position.market_value_eur;
        }
    }
    isins.sort_unstable();

    let weight = (group_value / total).to_f64().unwrap_or(0.0);
    (weight, isins)
}

pub struct RebalanceSellsCalculator;

impl OpportunityCalculator for RebalanceSellsCalculator {
    fn name(&self) -> &'static str {
        "rebalance_sells"
    }

    fn category(&self) -> Category {
        Category::RebalanceSells
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.calculators.rebalance_sells.enabled
    }

    fn calculate(
        &self,
        ctx: &PlanningContext,
        config: &PlannerConfig,
    ) -> Result<Vec<ActionCandidate>> {
        let params = &config.calculators.rebalance_sells;
        let total = ctx.total_value_eur();
        let mut candidates = Vec::new();

        for target in &ctx.allocations {
            let (weight, isins) = group_exposure(ctx, target);
            let overweight = weight - target.target_pct;
            if overweight < params.threshold {
                continue;
            }

            // Trim the largest holdings in the group first.
            let mut held: Vec<(&str, Decimal)> = isins
                .iter()
                .filter_map(|isin| {
                    ctx.positions
                        .get(isin)
                        .map(|p| (isin.as_str(), p.market_value_eur))
                })
                .collect();
            held.sort_by(|a, b| b.1.cmp(&a.1));

            let mut excess_value =
                total * Decimal::from_f64(overweight).unwrap_or(Decimal::ZERO);
            for (isin, position_value) in held {
                if excess_value <= Decimal::ZERO {
                    break;
                }
                if ctx.ineligible.contains(isin) || ctx.recently_sold.contains_key(isin) {
                    continue;
                }
                let price = match ctx.price(isin) {
                    Some(price) if price > Decimal::ZERO => price,
                    _ => continue,
                };
                let trim_value = position_value.min(excess_value);
                let quantity = (trim_value / price).floor().to_i64().unwrap_or(0);
                let reason = format!(
                    "Group {} overweight by {:.1}pp",
                    target.name,
                    overweight * 100.0
                );
                if let Some(candidate) = sell_candidate(
                    ctx,
                    config,
                    isin,
                    quantity,
                    overweight,
                    reason,
                    BTreeSet::new(),
                ) {
                    excess_value -= candidate.value_eur;
                    candidates.push(candidate);
                }
            }
        }

        Ok(candidates)
    }
}

pub struct RebalanceBuysCalculator;

impl OpportunityCalculator for RebalanceBuysCalculator {
    fn name(&self) -> &'static str {
        "rebalance_buys"
    }

    fn category(&self) -> Category {
        Category::RebalanceBuys
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.calculators.rebalance_buys.enabled
    }

    fn calculate(
        &self,
        ctx: &PlanningContext,
        config: &PlannerConfig,
    ) -> Result<Vec<ActionCandidate>> {
        let params = &config.calculators.rebalance_buys;
        let total = ctx.total_value_eur();
        let mut candidates = Vec::new();

        for target in &ctx.allocations {
            let (weight, isins) = group_exposure(ctx, target);
            let underweight = target.target_pct - weight;
            if underweight <= params.min_underweight_threshold {
                continue;
            }

            // Best securities in the group by underweight-scaled quality.
            let mut ranked: Vec<(&str, f64)> = isins
                .iter()
                .filter(|isin| {
                    !ctx.ineligible.contains(*isin) && !ctx.recently_bought.contains_key(*isin)
                })
                .map(|isin| (isin.as_str(), underweight * ctx.score(isin).quality))
                .collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            let deficit_value = total * Decimal::from_f64(underweight).unwrap_or(Decimal::ZERO);
            let mut remaining = deficit_value.min(ctx.available_cash_eur);
            for (isin, priority) in ranked {
                if remaining <= Decimal::ZERO {
                    break;
                }
                let reason = format!(
                    "Group {} underweight by {:.1}pp",
                    target.name,
                    underweight * 100.0
                );
                if let Some(candidate) = buy_candidate(
                    ctx,
                    config,
                    isin,
                    remaining,
                    priority,
                    reason,
                    BTreeSet::new(),
                ) {
                    remaining -= candidate.value_eur;
                    candidates.push(candidate);
                }
            }
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::planner::calculators::test_support::*;
    use crate::domain::scoring::SecurityScores;
    use crate::domain::types::TradeSide;
    use rust_decimal_macros::dec;

    fn allocation(kind: AllocationKind, name: &str, target_pct: f64) -> AllocationTarget {
        AllocationTarget {
            kind,
            name: name.to_string(),
            target_pct,
        }
    }

    fn grouped_context() -> PlanningContext {
        // 10_000 total: 4_000 in DE tech, 1_000 in US tech, 5_000 cash.
        let mut ctx = context_with(
            vec![
                security("DE0001", "SAP", "DE", "Tech"),
                security("US0001", "MSFT", "US", "Tech"),
                security("US0002", "KO", "US", "Staples"),
            ],
            vec![
                ("DE0001", 400, dec!(8), dec!(10)),
                ("US0001", 100, dec!(9), dec!(10)),
            ],
            dec!(5000),
        );
        ctx.country_groups.groups.insert(
            "germany".to_string(),
            ["DE".to_string()].into_iter().collect(),
        );
        ctx.country_groups.groups.insert(
            "america".to_string(),
            ["US".to_string()].into_iter().collect(),
        );
        ctx.scores.insert(
            "US0002".to_string(),
            SecurityScores {
                quality: 0.8,
                ..Default::default()
            },
        );
        ctx
    }

    #[test]
    fn test_overweight_group_emits_sells() {
        let mut ctx = grouped_context();
        // Germany is at 40%; target 20%.
        ctx.allocations = vec![allocation(AllocationKind::CountryGroup, "germany", 0.20)];
        let candidates = RebalanceSellsCalculator
            .calculate(&ctx, &PlannerConfig::default())
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].side, TradeSide::Sell);
        assert_eq!(candidates[0].symbol, "SAP");
        // Excess is 20% of 10_000 = 2_000 EUR at 10 EUR/share.
        assert_eq!(candidates[0].quantity, 200);
    }

    #[test]
    fn test_group_within_threshold_is_left_alone() {
        let mut ctx = grouped_context();
        ctx.allocations = vec![allocation(AllocationKind::CountryGroup, "germany", 0.38)];
        let candidates = RebalanceSellsCalculator
            .calculate(&ctx, &PlannerConfig::default())
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_underweight_group_emits_buys() {
        let mut ctx = grouped_context();
        // America is at 10%; target 30%.
        ctx.allocations = vec![allocation(AllocationKind::CountryGroup, "america", 0.30)];
        let candidates = RebalanceBuysCalculator
            .calculate(&ctx, &PlannerConfig::default())
            .unwrap();
        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(|c| c.side == TradeSide::Buy));
        // KO has the best quality score in the group.
        assert_eq!(candidates[0].symbol, "KO");
    }

    #[test]
    fn test_absent_group_is_ignored() {
        let mut ctx = grouped_context();
        ctx.allocations = vec![allocation(AllocationKind::CountryGroup, "asia", 0.30)];
        assert!(RebalanceSellsCalculator
            .calculate(&ctx, &PlannerConfig::default())
            .unwrap()
            .is_empty());
        assert!(RebalanceBuysCalculator
            .calculate(&ctx, &PlannerConfig::default())
            .unwrap()
            .is_empty());
    }
}
