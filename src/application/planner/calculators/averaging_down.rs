use crate::application::planner::action::{ActionCandidate, Category};
use crate::application::planner::calculators::{buy_candidate, OpportunityCalculator};
use crate::application::planner::context::PlanningContext;
use crate::domain::config::PlannerConfig;
use anyhow::Result;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeSet;

pub struct AveragingDownCalculator;

impl OpportunityCalculator for AveragingDownCalculator {
    fn name(&self) -> &'static str {
        "averaging_down"
    }

    fn category(&self) -> Category {
        Category::AveragingDown
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.calculators.averaging_down.enabled
    }

    fn calculate(
        &self,
        ctx: &PlanningContext,
        config: &PlannerConfig,
    ) -> Result<Vec<ActionCandidate>> {
        let params = &config.calculators.averaging_down;
        let mut candidates = Vec::new();

        for (isin, position) in &ctx.positions {
            if ctx.ineligible.contains(isin) || ctx.recently_bought.contains_key(isin) {
                continue;
            }

            let loss = -position.unrealized_gain_fraction();
            // Below the threshold it is noise; above the cap the thesis is
            // broken and throwing money after it is not a discount.
            if loss < params.loss_threshold || loss > params.max_loss_allowed {
                continue;
            }

            let add_fraction =
                Decimal::from_f64(params.max_add_fraction).unwrap_or(Decimal::ONE_HUNDRED);
            let target_value =
                (position.market_value_eur * add_fraction).min(ctx.available_cash_eur);

            let reason = format!(
                "Averaging down {} at {:.0}% below cost",
                ctx.symbol(isin),
                loss * 100.0
            );
            if let Some(candidate) = buy_candidate(
                ctx,
                config,
                isin,
                target_value,
                loss,
                reason,
                BTreeSet::new(),
            ) {
                candidates.push(candidate);
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
    fn test_loss_inside_band_emits_buy() {
        let ctx = context_with(
            vec![security("DE0001", "SAP", "DE", "Tech")],
            vec![("DE0001", 100, dec!(10), dec!(8))],
            dec!(5000),
        );
        let candidates = AveragingDownCalculator
            .calculate(&ctx, &PlannerConfig::default())
            .unwrap();
        assert_eq!(candidates.len(), 1);
        let candidate = &candidates[0];
        assert_eq!(candidate.side, TradeSide::Buy);
        // Half the 800 EUR position value at 8 EUR/share.
        assert_eq!(candidate.quantity, 50);
        assert!((candidate.priority - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_small_dip_is_ignored() {
        let ctx = context_with(
            vec![security("DE0001", "SAP", "DE", "Tech")],
            vec![("DE0001", 100, dec!(10), dec!(9.5))],
            dec!(5000),
        );
        let candidates = AveragingDownCalculator
            .calculate(&ctx, &PlannerConfig::default())
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_broken_thesis_is_not_averaged() {
        let ctx = context_with(
            vec![security("DE0001", "SAP", "DE", "Tech")],
            vec![("DE0001", 100, dec!(10), dec!(5))],
            dec!(5000),
        );
        let candidates = AveragingDownCalculator
            .calculate(&ctx, &PlannerConfig::default())
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_unfunded_buy_is_not_emitted() {
        let ctx = context_with(
            vec![security("DE0001", "SAP", "DE", "Tech")],
            vec![("DE0001", 100, dec!(10), dec!(8))],
            dec!(100),
        );
        let candidates = AveragingDownCalculator
            .calculate(&ctx, &PlannerConfig::default())
            .unwrap();
        assert!(candidates.is_empty());
    }
}
