//! Sequence patterns: strategic templates that compose categorized
//! candidates into multi-step trade sequences. A failing pattern is logged
//! and skipped; the rest of the pipeline continues.

pub mod adaptive;
pub mod basic;
pub mod bundles;
pub mod rebalance;

use crate::application::planner::action::{ActionCandidate, ActionSequence, Category};
use crate::application::planner::context::PlanningContext;
use crate::domain::config::PlannerConfig;
use crate::domain::types::TradeSide;
use anyhow::Result;
use std::collections::HashMap;
use tracing::{debug, warn};

/// The categorized output of the opportunity calculators, shared read-only by
/// every pattern.
#[derive(Debug, Default)]
pub struct CandidatePool {
    pub by_category: HashMap<Category, Vec<ActionCandidate>>,
}

impl CandidatePool {
    pub fn new(by_category: HashMap<Category, Vec<ActionCandidate>>) -> Self {
        Self { by_category }
    }

    pub fn category(&self, category: Category) -> &[ActionCandidate] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all(&self) -> impl Iterator<Item = &ActionCandidate> {
        self.by_category.values().flatten()
    }

    /// All candidates of one side, sorted by descending priority with the
    /// symbol as a deterministic tiebreak.
    pub fn by_side(&self, side: TradeSide) -> Vec<&ActionCandidate> {
        let mut out: Vec<&ActionCandidate> = self.all().filter(|c| c.side == side).collect();
        out.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        out
    }

    pub fn is_empty(&self) -> bool {
        self.by_category.values().all(Vec::is_empty)
    }
}

pub trait SequencePattern: Send + Sync {
    fn name(&self) -> &'static str;
    fn enabled(&self, config: &PlannerConfig) -> bool;
    fn generate(
        &self,
        pool: &CandidatePool,
        config: &PlannerConfig,
        ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>>;
}

pub fn registry() -> Vec<Box<dyn SequencePattern>> {
    vec![
        Box::new(basic::DirectBuyPattern),
        Box::new(basic::ProfitTakingPattern),
        Box::new(rebalance::RebalancePattern),
        Box::new(basic::AveragingDownPattern),
        Box::new(basic::SingleBestPattern),
        Box::new(bundles::MultiSellPattern),
        Box::new(bundles::MixedStrategyPattern),
        Box::new(bundles::OpportunityFirstPattern),
        Box::new(rebalance::DeepRebalancePattern),
        Box::new(bundles::CashGenerationPattern),
        Box::new(bundles::CostOptimizedPattern),
        Box::new(adaptive::AdaptivePattern),
        Box::new(adaptive::MarketRegimePattern),
    ]
}

/// Run every enabled pattern over the pool, skipping failures.
pub fn run_all(
    pool: &CandidatePool,
    config: &PlannerConfig,
    ctx: &PlanningContext,
) -> Vec<ActionSequence> {
    let mut sequences = Vec::new();
    for pattern in registry() {
        if !pattern.enabled(config) {
            continue;
        }
        match pattern.generate(pool, config, ctx) {
            Ok(mut generated) => {
                debug!(
                    pattern = pattern.name(),
                    count = generated.len(),
                    "pattern finished"
                );
                sequences.append(&mut generated);
            }
            Err(error) => {
                warn!(pattern = pattern.name(), %error, "pattern failed, skipping");
            }
        }
    }
    sequences
}
