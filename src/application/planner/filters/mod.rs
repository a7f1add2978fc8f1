//! Sequence filters: prune the expanded sequence set before evaluation.
//! Filters run in registry order; a failing filter is logged and skipped so
//! one bad module degrades the plan instead of destroying it.

pub mod correlation;
pub mod diversity;
pub mod eligibility;
pub mod recently_traded;

use crate::application::planner::action::ActionSequence;
use crate::application::planner::context::PlanningContext;
use crate::domain::config::PlannerConfig;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Optional collaborator producing pairwise correlations over a lookback
/// window. The map is bidirectional and keyed `A:B` by ISIN.
#[async_trait]
pub trait CorrelationSource: Send + Sync {
    async fn correlation_map(
        &self,
        isins: &[String],
        lookback_days: u32,
    ) -> Result<HashMap<String, f64>>;
}

/// Capabilities a filter may request. Absence is defined behavior
/// (pass-through), never a crash.
#[derive(Clone, Default)]
pub struct FilterCapabilities {
    pub correlation: Option<Arc<dyn CorrelationSource>>,
}

#[async_trait]
pub trait SequenceFilter: Send + Sync {
    fn name(&self) -> &'static str;
    fn enabled(&self, config: &PlannerConfig) -> bool;
    async fn apply(
        &self,
        sequences: Vec<ActionSequence>,
        config: &PlannerConfig,
        ctx: &PlanningContext,
        capabilities: &FilterCapabilities,
    ) -> Result<Vec<ActionSequence>>;
}

pub fn registry() -> Vec<Box<dyn SequenceFilter>> {
    vec![
        Box::new(eligibility::EligibilityFilter),
        Box::new(recently_traded::RecentlyTradedFilter),
        Box::new(diversity::DiversityFilter),
        Box::new(correlation::CorrelationAwareFilter),
    ]
}

pub async fn run_all(
    mut sequences: Vec<ActionSequence>,
    config: &PlannerConfig,
    ctx: &PlanningContext,
    capabilities: &FilterCapabilities,
) -> Vec<ActionSequence> {
    for filter in registry() {
        if !filter.enabled(config) {
            continue;
        }
        let input = std::mem::take(&mut sequences);
        let before = input.len();
        match filter.apply(input.clone(), config, ctx, capabilities).await {
            Ok(filtered) => {
                debug!(
                    filter = filter.name(),
                    dropped = before - filtered.len(),
                    remaining = filtered.len(),
                    "filter finished"
                );
                sequences = filtered;
            }
            Err(error) => {
                warn!(filter = filter.name(), %error, "filter failed, passing through");
                sequences = input;
            }
        }
    }
    sequences
}
