//! The holistic planner: opportunity identification, pattern expansion,
//! combinatorial generation, filtering and evaluation, orchestrated as a
//! strict pipeline with a deterministic cache in front.

pub mod action;
pub mod cache;
pub mod calculators;
pub mod context;
pub mod evaluator;
pub mod filters;
pub mod generators;
pub mod hashing;
pub mod patterns;
pub mod plan;

use crate::application::planner::action::ActionSequence;
use crate::application::planner::cache::PlanCache;
use crate::application::planner::context::PlanningContext;
use crate::application::planner::evaluator::{
    check_sequence_feasibility, evaluate_end_state, evaluate_sequence,
    monte_carlo::evaluate_monte_carlo, stochastic::evaluate_stochastic,
};
use crate::application::planner::filters::FilterCapabilities;
use crate::application::planner::plan::{HolisticPlan, PlanStep};
use crate::domain::config::{EvaluationMode, PlannerConfig};
use crate::domain::errors::ValidationError;
use crate::domain::types::TradeSide;
use rust_decimal::Decimal;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct PlannerService {
    config: PlannerConfig,
    cache: PlanCache,
    capabilities: FilterCapabilities,
    timeout: Duration,
}

struct ScoredSequence {
    sequence: ActionSequence,
    score: f64,
}

impl PlannerService {
    pub fn new(
        config: PlannerConfig,
        capabilities: FilterCapabilities,
        timeout: Duration,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            config,
            cache: PlanCache::new(),
            capabilities,
            timeout,
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub async fn invalidate_cache(&self) {
        self.cache.invalidate_all().await;
    }

    /// Produce the ranked plan for the given snapshot. Identical snapshots
    /// hit the cache and return the identical plan.
    pub async fn create_plan(&self, ctx: &PlanningContext) -> HolisticPlan {
        let key = hashing::cache_key(ctx);
        if let Some(cached) = self.cache.get(&key).await {
            debug!(%key, "plan cache hit");
            return cached;
        }

        let started = Instant::now();
        let deadline = started + self.timeout;
        let start_state = ctx.portfolio_state();
        let current_score = evaluate_end_state(&start_state, ctx, &self.config, Decimal::ZERO);

        // Stages run strictly in order; each consumes the previous stage's
        // output and nothing else.
        let candidates = calculators::run_all(ctx, &self.config);
        let pool = patterns::CandidatePool::new(candidates);
        let mut sequences = patterns::run_all(&pool, &self.config, ctx);
        sequences = generators::run_all(sequences, &self.config, ctx);

        for sequence in &mut sequences {
            sequence.sort_sells_first();
        }

        sequences
            .retain(|s| !s.actions.is_empty() && s.priority >= self.config.priority_threshold);
        sequences.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.hash.cmp(&b.hash))
        });
        sequences.truncate(self.config.beam_width);

        let sequences = filters::run_all(sequences, &self.config, ctx, &self.capabilities).await;

        if sequences.is_empty() {
            let plan = HolisticPlan::empty(&key, current_score);
            self.cache.insert(key, plan.clone()).await;
            return plan;
        }

        let mut best: Option<ScoredSequence> = None;
        let mut evaluated = 0usize;
        for sequence in sequences {
            if Instant::now() >= deadline {
                warn!(
                    evaluated,
                    "planner deadline expired, returning best sequence seen so far"
                );
                break;
            }
            if !check_sequence_feasibility(&sequence, ctx.available_cash_eur) {
                continue;
            }

            let scored = match self.config.evaluation_mode {
                EvaluationMode::Single => {
                    match evaluate_sequence(&sequence, &start_state, ctx, &self.config) {
                        Ok(evaluation) => ScoredSequence {
                            sequence,
                            score: evaluation.score,
                        },
                        Err(error) => {
                            warn!(%error, "sequence evaluation failed, excluding it");
                            continue;
                        }
                    }
                }
                EvaluationMode::Stochastic => {
                    let evaluation =
                        evaluate_stochastic(&sequence, &start_state, ctx, &self.config);
                    ScoredSequence {
                        sequence,
                        score: evaluation.weighted,
                    }
                }
                EvaluationMode::MonteCarlo => {
                    let evaluation =
                        evaluate_monte_carlo(&sequence, &start_state, ctx, &self.config);
                    ScoredSequence {
                        sequence,
                        score: evaluation.final_score,
                    }
                }
            };
            evaluated += 1;

            best = Some(match best.take() {
                None => scored,
                Some(current) => {
                    if prefer(&scored, &current) {
                        scored
                    } else {
                        current
                    }
                }
            });
        }

        let plan = match best {
            Some(winner) => self.build_plan(&key, winner, current_score),
            None => HolisticPlan::empty(&key, current_score),
        };

        info!(
            steps = plan.steps.len(),
            improvement = plan.improvement,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "plan created"
        );
        self.cache.insert(key, plan.clone()).await;
        plan
    }

    fn build_plan(&self, key: &str, winner: ScoredSequence, current_score: f64) -> HolisticPlan {
        let sequence = winner.sequence;
        let mut cash_required = Decimal::ZERO;
        let mut cash_generated = Decimal::ZERO;

        let steps: Vec<PlanStep> = sequence
            .actions
            .iter()
            .map(|action| {
                let costs = self.config.transaction_cost(action.value_eur);
                match action.side {
                    TradeSide::Buy => cash_required += action.value_eur + costs,
                    TradeSide::Sell => cash_generated += action.value_eur - costs,
                }
                PlanStep {
                    isin: action.isin.clone(),
                    symbol: action.symbol.clone(),
                    side: action.side,
                    quantity: action.quantity,
                    unit_price: action.unit_price,
                    value_eur: action.value_eur,
                    reason: action.reason.clone(),
                }
            })
            .collect();

        let sells = sequence.sells().count();
        let buys = sequence.buys().count();
        let summary = format!(
            "{} plan: {} step(s) ({} sell, {} buy), expected score {:.3} -> {:.3}",
            sequence.pattern_type,
            steps.len(),
            sells,
            buys,
            current_score,
            winner.score
        );

        HolisticPlan {
            steps,
            current_score,
            end_state_score: winner.score,
            improvement: winner.score - current_score,
            cash_required,
            cash_generated,
            feasible: true,
            summary,
            cache_key: key.to_string(),
        }
    }
}

/// Strict preference order: higher score, then greater composition
/// diversity, then lower depth, then hash for total determinism.
fn prefer(challenger: &ScoredSequence, incumbent: &ScoredSequence) -> bool {
    match challenger.score.partial_cmp(&incumbent.score) {
        Some(std::cmp::Ordering::Greater) => true,
        Some(std::cmp::Ordering::Less) => false,
        _ => {
            let challenger_div = challenger.sequence.composition_diversity();
            let incumbent_div = incumbent.sequence.composition_diversity();
            if challenger_div != incumbent_div {
                return challenger_div > incumbent_div;
            }
            if challenger.sequence.depth != incumbent.sequence.depth {
                return challenger.sequence.depth < incumbent.sequence.depth;
            }
            challenger.sequence.hash < incumbent.sequence.hash
        }
    }
}
