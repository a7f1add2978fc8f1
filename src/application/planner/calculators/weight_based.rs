use crate::application::planner::action::{ActionCandidate, Category};
use crate::application::planner::calculators::{
    buy_candidate, sell_candidate, OpportunityCalculator,
};
use crate::application::planner::context::PlanningContext;
use crate::domain::config::PlannerConfig;
use anyhow::Result;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// Pulls each security toward its own min/max portfolio-weight targets.
pub struct WeightBasedCalculator;

impl OpportunityCalculator for WeightBasedCalculator {
    fn name(&self) -> &'static str {
        "weight_based"
    }

    fn category(&self) -> Category {
        Category::WeightBased
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.calculators.weight_based.enabled
    }

    fn calculate(
        &self,
        ctx: &PlanningContext,
        config: &PlannerConfig,
    ) -> Result<Vec<ActionCandidate>> {
        let params = &config.calculators.weight_based;
        let total = ctx.total_value_eur();
        if total <= Decimal::ZERO {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for (isin, security) in &ctx.securities {
            if ctx.ineligible.contains(isin) {
                continue;
            }
            let weight = ctx.position_weight(isin);

            if let Some(max_target) = security.max_weight_target {
                let max_target = max_target.to_f64().unwrap_or(1.0);
                let deviation = weight - max_target;
                if deviation > params.deviation_threshold {
                    let price = match ctx.price(isin) {
                        Some(price) if price > Decimal::ZERO => price,
                        _ => continue,
                    };
                    let trim_value = total
                        * rust_decimal::Decimal::from_f64_retain(deviation)
                            .unwrap_or(Decimal::ZERO);
                    let quantity = (trim_value / price).floor().to_i64().unwrap_or(0);
                    let reason = format!(
                        "{} above its {:.0}% weight ceiling",
                        security.symbol,
                        max_target * 100.0
                    );
                    if let Some(candidate) = sell_candidate(
                        ctx,
                        config,
                        isin,
                        quantity,
                        deviation * 5.0,
                        reason,
                        BTreeSet::new(),
                    ) {
                        candidates.push(candidate);
                    }
                    continue;
                }
            }

            if let Some(min_target) = security.min_weight_target {
                let min_target = min_target.to_f64().unwrap_or(0.0);
                let deviation = min_target - weight;
                if deviation > params.deviation_threshold {
                    let top_up = total
                        * rust_decimal::Decimal::from_f64_retain(deviation)
                            .unwrap_or(Decimal::ZERO);
                    let reason = format!(
                        "{} below its {:.0}% weight floor",
                        security.symbol,
                        min_target * 100.0
                    );
                    if let Some(candidate) = buy_candidate(
                        ctx,
                        config,
                        isin,
                        top_up,
                        deviation * 5.0,
                        reason,
                        BTreeSet::new(),
                    ) {
                        candidates.push(candidate);
                    }
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
    use crate::domain::types::TradeSide;
    use rust_decimal_macros::dec;

    #[test]
    fn test_overweight_position_is_trimmed_to_ceiling() {
        let mut sap = security("DE0001", "SAP", "DE", "Tech");
        sap.max_weight_target = Some(dec!(0.20));
        // SAP is 4_000 of 10_000 = 40%, ceiling 20%.
        let ctx = context_with(
            vec![sap],
            vec![("DE0001", 400, dec!(8), dec!(10))],
            dec!(6000),
        );
        let candidates = WeightBasedCalculator
            .calculate(&ctx, &PlannerConfig::default())
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].side, TradeSide::Sell);
        assert_eq!(candidates[0].quantity, 200);
    }

    #[test]
    fn test_underweight_position_is_topped_up() {
        let mut sap = security("DE0001", "SAP", "DE", "Tech");
        sap.min_weight_target = Some(dec!(0.10));
        let ctx = context_with(
            vec![sap],
            vec![("DE0001", 30, dec!(8), dec!(10))],
            dec!(9700),
        );
        let candidates = WeightBasedCalculator
            .calculate(&ctx, &PlannerConfig::default())
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].side, TradeSide::Buy);
        // Deficit is 10% of 10_000 minus the 300 held = 700 EUR.
        assert_eq!(candidates[0].quantity, 70);
    }

    #[test]
    fn test_no_targets_means_no_candidates() {
        let ctx = context_with(
            vec![security("DE0001", "SAP", "DE", "Tech")],
            vec![("DE0001", 400, dec!(8), dec!(10))],
            dec!(6000),
        );
        let candidates = WeightBasedCalculator
            .calculate(&ctx, &PlannerConfig::default())
            .unwrap();
        assert!(candidates.is_empty());
    }
}
