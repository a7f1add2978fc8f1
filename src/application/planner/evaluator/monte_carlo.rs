use crate::application::planner::action::ActionSequence;
use crate::application::planner::context::PlanningContext;
use crate::application::planner::evaluator::{evaluate_end_state, simulate_sequence};
use crate::domain::config::PlannerConfig;
use crate::domain::formulas::TRADING_DAYS_PER_YEAR;
use crate::domain::portfolio::PortfolioState;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use std::collections::HashMap;

/// Per-symbol multipliers are clamped into this band to bound outlier draws.
const MULTIPLIER_FLOOR: f64 = 0.5;
const MULTIPLIER_CEILING: f64 = 2.0;

/// Fallback annualized volatility for symbols without history.
const DEFAULT_ANNUAL_VOLATILITY: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct MonteCarloEvaluation {
    pub hash: String,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p10: f64,
    pub p90: f64,
    /// Conservative blend: 0.4·min + 0.3·P10 + 0.3·mean.
    pub final_score: f64,
}

fn seed_base(hash: &str) -> u64 {
    u64::from_str_radix(hash.get(..16).unwrap_or("0"), 16).unwrap_or(0)
}

/// Evaluate one sequence over randomized price paths.
///
/// Each path draws one standard-normal shock per symbol and applies
/// `exp(daily_vol * Z)` as its price multiplier. Paths simulate and score in
/// parallel with no shared mutable state and fan in at the collect. RNGs are
/// seeded from the sequence hash and path index so identical inputs yield an
/// identical evaluation.
pub fn evaluate_monte_carlo(
    sequence: &ActionSequence,
    start: &PortfolioState,
    ctx: &PlanningContext,
    config: &PlannerConfig,
) -> MonteCarloEvaluation {
    let paths = config.monte_carlo.paths.max(1);
    let base = seed_base(&sequence.hash);

    let isins: Vec<String> = sequence.isins().into_iter().map(String::from).collect();
    let daily_vols: Vec<(String, f64)> = isins
        .into_iter()
        .map(|isin| {
            let annual = ctx
                .metrics
                .get(&isin)
                .map(|m| m.volatility)
                .filter(|v| *v > 0.0)
                .unwrap_or(DEFAULT_ANNUAL_VOLATILITY);
            (isin, annual / TRADING_DAYS_PER_YEAR.sqrt())
        })
        .collect();

    let mut scores: Vec<f64> = (0..paths)
        .into_par_iter()
        .map(|path| {
            let mut rng = StdRng::seed_from_u64(base.wrapping_add(path as u64));
            let adjustments: HashMap<String, f64> = daily_vols
                .iter()
                .map(|(isin, daily_vol)| {
                    let z: f64 = rng.sample(StandardNormal);
                    let multiplier =
                        (daily_vol * z).exp().clamp(MULTIPLIER_FLOOR, MULTIPLIER_CEILING);
                    (isin.clone(), multiplier)
                })
                .collect();
            let result = simulate_sequence(sequence, start, config, Some(&adjustments));
            evaluate_end_state(&result.end_state, ctx, config, result.total_costs)
        })
        .collect();

    scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = scores.len();
    let mean = scores.iter().sum::<f64>() / n as f64;
    let min = scores[0];
    let max = scores[n - 1];
    let p10 = scores[(n as f64 * 0.10) as usize % n];
    let p90 = scores[((n as f64 * 0.90) as usize).min(n - 1)];
    let final_score = 0.4 * min + 0.3 * p10 + 0.3 * mean;

    MonteCarloEvaluation {
        hash: sequence.hash.clone(),
        mean,
        min,
        max,
        p10,
        p90,
        final_score,
    }
}
