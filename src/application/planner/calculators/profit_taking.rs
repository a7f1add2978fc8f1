use crate::application::planner::action::{ActionCandidate, Category, TAG_WINDFALL};
use crate::application::planner::calculators::{days_since, sell_candidate, OpportunityCalculator};
use crate::application::planner::context::PlanningContext;
use crate::domain::config::PlannerConfig;
use crate::domain::scoring::assess_windfall;
use anyhow::Result;
use std::collections::BTreeSet;

/// Fraction of a position trimmed on an ordinary (non-windfall) gain.
const DEFAULT_TRIM_FRACTION: f64 = 0.30;

pub struct ProfitTakingCalculator;

impl OpportunityCalculator for ProfitTakingCalculator {
    fn name(&self) -> &'static str {
        "profit_taking"
    }

    fn category(&self) -> Category {
        Category::ProfitTaking
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.calculators.profit_taking.enabled
    }

    fn calculate(
        &self,
        ctx: &PlanningContext,
        config: &PlannerConfig,
    ) -> Result<Vec<ActionCandidate>> {
        let params = &config.calculators.profit_taking;
        let mut candidates = Vec::new();

        for (isin, position) in &ctx.positions {
            if ctx.ineligible.contains(isin) || ctx.recently_sold.contains_key(isin) {
                continue;
            }
            if let Some(since) = ctx.holding_since.get(isin) {
                if days_since(ctx.now, *since) < params.min_hold_days as i64 {
                    continue;
                }
            }

            let gain = position.unrealized_gain_fraction();
            if gain < params.min_gain_threshold {
                continue;
            }

            let is_windfall = gain >= params.windfall_threshold;
            let priority = gain * if is_windfall { 1.5 } else { 1.0 };

            let sell_fraction = if is_windfall {
                let assessment = assess_windfall(
                    gain,
                    ctx.years_held(isin),
                    ctx.metrics
                        .get(isin)
                        .map(|m| m.historical_cagr)
                        .unwrap_or(0.0),
                );
                if assessment.should_sell {
                    assessment.sell_pct
                } else {
                    DEFAULT_TRIM_FRACTION
                }
            } else {
                DEFAULT_TRIM_FRACTION
            };

            let quantity = ((position.quantity as f64) * sell_fraction).floor() as i64;
            let mut tags = BTreeSet::new();
            let reason = if is_windfall {
                tags.insert(TAG_WINDFALL.to_string());
                format!("Windfall gain of {:.0}% on {}", gain * 100.0, ctx.symbol(isin))
            } else {
                format!("Taking {:.0}% profit on {}", gain * 100.0, ctx.symbol(isin))
            };

            if let Some(candidate) =
                sell_candidate(ctx, config, isin, quantity, priority, reason, tags)
            {
                candidates.push(candidate);
            }
        }

        Ok(candidates)
    }
}
