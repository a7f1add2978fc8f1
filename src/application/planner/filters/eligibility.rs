use crate::application::planner::action::{ActionSequence, TAG_RELAXED};
use crate::application::planner::context::PlanningContext;
use crate::application::planner::filters::{FilterCapabilities, SequenceFilter};
use crate::domain::config::PlannerConfig;
use anyhow::Result;
use async_trait::async_trait;

/// Drops sequences that reference ineligible securities, unless every
/// offending action carries the relaxation tag.
pub struct EligibilityFilter;

#[async_trait]
impl SequenceFilter for EligibilityFilter {
    fn name(&self) -> &'static str {
        "eligibility"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.filters.eligibility.enabled
    }

    async fn apply(
        &self,
        sequences: Vec<ActionSequence>,
        _config: &PlannerConfig,
        ctx: &PlanningContext,
        _capabilities: &FilterCapabilities,
    ) -> Result<Vec<ActionSequence>> {
        Ok(sequences
            .into_iter()
            .filter(|sequence| {
                sequence.actions.iter().all(|action| {
                    !ctx.ineligible.contains(&action.isin) || action.has_tag(TAG_RELAXED)
                })
            })
            .collect())
    }
}
