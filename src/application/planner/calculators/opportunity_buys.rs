use crate::application::planner::action::{ActionCandidate, Category};
use crate::application::planner::calculators::{buy_candidate, OpportunityCalculator};
use crate::application::planner::context::PlanningContext;
use crate::domain::config::PlannerConfig;
use anyhow::Result;
use std::collections::BTreeSet;

pub struct OpportunityBuysCalculator;

impl OpportunityCalculator for OpportunityBuysCalculator {
    fn name(&self) -> &'static str {
        "opportunity_buys"
    }

    fn category(&self) -> Category {
        Category::OpportunityBuys
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.calculators.opportunity_buys.enabled
    }

    fn calculate(
        &self,
        ctx: &PlanningContext,
        config: &PlannerConfig,
    ) -> Result<Vec<ActionCandidate>> {
        let params = &config.calculators.opportunity_buys;

        let mut scored: Vec<(&String, f64)> = ctx
            .securities
            .iter()
            .filter(|(isin, security)| {
                security.active
                    && security.allow_buy
                    && !ctx.ineligible.contains(*isin)
                    && !ctx.recently_bought.contains_key(*isin)
                    && !(params.exclude_existing && ctx.is_held(isin))
            })
            .map(|(isin, _)| (isin, ctx.score(isin).opportunity))
            .filter(|(_, score)| *score >= params.min_score)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut candidates = Vec::new();
        for (isin, score) in scored {
            if candidates.len() >= params.max_positions {
                break;
            }
            let target_value = params.max_value_per_position.min(ctx.available_cash_eur);
            let reason = format!(
                "Opportunity score {:.2} on {}",
                score,
                ctx.symbol(isin)
            );
            if let Some(candidate) =
                buy_candidate(ctx, config, isin, target_value, score, reason, BTreeSet::new())
            {
                candidates.push(candidate);
            }
        }

        Ok(candidates)
    }
}
