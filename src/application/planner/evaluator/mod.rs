//! Sequence evaluation: simulate, then score the resulting portfolio.

pub mod monte_carlo;
pub mod simulation;
pub mod stochastic;

pub use simulation::{check_sequence_feasibility, simulate_sequence, SimulationResult};

use crate::application::planner::action::ActionSequence;
use crate::application::planner::context::PlanningContext;
use crate::domain::config::PlannerConfig;
use crate::domain::errors::PlannerError;
use crate::domain::portfolio::PortfolioState;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Score of one evaluated sequence.
#[derive(Debug, Clone)]
pub struct SequenceEvaluation {
    pub hash: String,
    pub score: f64,
    pub end_state_score: f64,
    pub executed_steps: usize,
    pub total_costs: Decimal,
}

/// Weighted end-state score of a portfolio, minus the cost penalty.
///
/// Component scores are value-weighted over the held positions; the cost
/// penalty normalizes the explicit transaction costs by total value so the
/// penalty factor stays scale-free.
pub fn evaluate_end_state(
    state: &PortfolioState,
    ctx: &PlanningContext,
    config: &PlannerConfig,
    total_costs: Decimal,
) -> f64 {
    let weights = &config.evaluation_weights;
    let positions_value = state.positions_value();

    let (mut quality, mut opportunity, mut sell_pressure) = (0.0, 0.0, 0.0);
    if positions_value > Decimal::ZERO {
        for (isin, value) in &state.position_values {
            let weight = (*value / positions_value).to_f64().unwrap_or(0.0);
            let scores = ctx.score(isin);
            quality += weight * scores.quality;
            opportunity += weight * scores.opportunity;
            sell_pressure += weight * scores.sell_pressure;
        }
    }

    let total_value = state.total_value();
    let mut allocation_deviation = 0.0;
    for target in &ctx.allocations {
        let grouping = match target.kind {
            crate::domain::types::AllocationKind::CountryGroup => &ctx.country_groups,
            crate::domain::types::AllocationKind::IndustryGroup => &ctx.industry_groups,
        };
        let members = match grouping.members(&target.name) {
            Some(members) => members,
            None => continue,
        };
        let current: f64 = members
            .iter()
            .map(|member| match target.kind {
                crate::domain::types::AllocationKind::CountryGroup => {
                    PortfolioState::weight_in(&state.country_values, member, total_value)
                }
                crate::domain::types::AllocationKind::IndustryGroup => {
                    PortfolioState::weight_in(&state.industry_values, member, total_value)
                }
            })
            .sum();
        allocation_deviation += (current - target.target_pct).abs();
    }
    let allocation_fit = (1.0 - allocation_deviation).clamp(0.0, 1.0);

    let base = weights.quality * quality
        + weights.opportunity * opportunity
        + weights.sell_pressure_relief * (1.0 - sell_pressure.clamp(0.0, 1.0))
        + weights.allocation_fit * allocation_fit
        + weights.diversification * state.diversification();

    let cost_fraction = if total_value > Decimal::ZERO {
        (total_costs / total_value).to_f64().unwrap_or(0.0)
    } else {
        0.0
    };
    base - config.cost_penalty_factor * cost_fraction
}

/// Single-objective evaluation: one simulation at current prices.
pub fn evaluate_sequence(
    sequence: &ActionSequence,
    start: &PortfolioState,
    ctx: &PlanningContext,
    config: &PlannerConfig,
) -> Result<SequenceEvaluation, PlannerError> {
    let result = simulate_sequence(sequence, start, config, None);

    if result.end_state.cash < -config.transaction_cost_fixed {
        // Funding checks should make this unreachable; reaching it is a bug
        // in a calculator or generator, and only this sequence is lost.
        return Err(PlannerError::InvariantViolated(format!(
            "sequence {} overdrew simulated cash to {}",
            sequence.hash, result.end_state.cash
        )));
    }

    let end_state_score = evaluate_end_state(&result.end_state, ctx, config, result.total_costs);
    Ok(SequenceEvaluation {
        hash: sequence.hash.clone(),
        score: end_state_score,
        end_state_score,
        executed_steps: result.executed_steps,
        total_costs: result.total_costs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::planner::action::test_support::candidate;
    use crate::domain::types::TradeSide;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cost_penalty_reduces_score() {
        let ctx = PlanningContext::default();
        let config = PlannerConfig::default();
        let state = PortfolioState {
            position_values: std::collections::HashMap::from([
                ("A".to_string(), dec!(500)),
                ("B".to_string(), dec!(500)),
            ]),
            cash: dec!(1000),
            country_values: std::sync::Arc::new(Default::default()),
            industry_values: std::sync::Arc::new(Default::default()),
            attribution: std::sync::Arc::new(Default::default()),
        };

        let cheap = evaluate_end_state(&state, &ctx, &config, dec!(0));
        let costly = evaluate_end_state(&state, &ctx, &config, dec!(100));
        assert!(costly < cheap);
    }

    #[test]
    fn test_evaluation_runs_on_simple_sequence() {
        let sequence = ActionSequence::new(
            "direct_buy",
            vec![candidate("AAA", TradeSide::Buy, dec!(300))],
        );
        let start = PortfolioState {
            position_values: Default::default(),
            cash: dec!(1000),
            country_values: std::sync::Arc::new(Default::default()),
            industry_values: std::sync::Arc::new(Default::default()),
            attribution: std::sync::Arc::new(Default::default()),
        };
        let evaluation = evaluate_sequence(
            &sequence,
            &start,
            &PlanningContext::default(),
            &PlannerConfig::default(),
        )
        .unwrap();
        assert_eq!(evaluation.executed_steps, 1);
        assert!(evaluation.total_costs > Decimal::ZERO);
    }
}
