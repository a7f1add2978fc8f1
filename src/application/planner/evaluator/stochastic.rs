use crate::application::planner::action::ActionSequence;
use crate::application::planner::context::PlanningContext;
use crate::application::planner::evaluator::{evaluate_end_state, simulate_sequence};
use crate::domain::config::planner_config::shift_key;
use crate::domain::config::PlannerConfig;
use crate::domain::portfolio::PortfolioState;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// Scores of one sequence across uniform price-shift scenarios.
#[derive(Debug, Clone)]
pub struct StochasticEvaluation {
    pub hash: String,
    /// Score at the unshifted (0%) scenario.
    pub base: f64,
    /// Score at the most favorable shift.
    pub best: f64,
    /// Score at the most adverse shift.
    pub worst: f64,
    pub scenario_scores: BTreeMap<String, f64>,
    pub weighted: f64,
}

/// Evaluate one sequence under every configured shift. Each scenario applies
/// the same multiplier to every symbol in the sequence, simulates, and
/// scores; scenarios run in parallel and meet at a single join.
pub fn evaluate_stochastic(
    sequence: &ActionSequence,
    start: &PortfolioState,
    ctx: &PlanningContext,
    config: &PlannerConfig,
) -> StochasticEvaluation {
    let params = &config.stochastic;

    let scored: Vec<(f64, f64)> = params
        .shifts
        .par_iter()
        .map(|shift| {
            let multiplier = 1.0 + shift;
            let adjustments: HashMap<String, f64> = sequence
                .isins()
                .into_iter()
                .map(|isin| (isin.to_string(), multiplier))
                .collect();
            let result = simulate_sequence(sequence, start, config, Some(&adjustments));
            let score = evaluate_end_state(&result.end_state, ctx, config, result.total_costs);
            (*shift, score)
        })
        .collect();

    let mut scenario_scores = BTreeMap::new();
    let mut weighted = 0.0;
    let mut base = 0.0;
    let mut best = (f64::MIN, f64::MIN);
    let mut worst = (f64::MAX, f64::MAX);

    for (shift, score) in &scored {
        let key = shift_key(*shift);
        weighted += params.weights.get(&key).copied().unwrap_or(0.0) * score;
        scenario_scores.insert(key, *score);
        if *shift == 0.0 {
            base = *score;
        }
        if *shift > best.0 {
            best = (*shift, *score);
        }
        if *shift < worst.0 {
            worst = (*shift, *score);
        }
    }

    StochasticEvaluation {
        hash: sequence.hash.clone(),
        base,
        best: best.1,
        worst: worst.1,
        scenario_scores,
        weighted,
    }
}
