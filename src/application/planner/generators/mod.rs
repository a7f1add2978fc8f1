//! Sequence generators: expand or mutate the pattern output. Generators
//! only ever append new sequences that own their action vectors; parent
//! sequences are never spliced or aliased.

pub mod combinatorial;
pub mod partial;
pub mod relaxation;

use crate::application::planner::action::ActionSequence;
use crate::application::planner::context::PlanningContext;
use crate::domain::config::PlannerConfig;
use anyhow::Result;
use tracing::{debug, warn};

pub trait SequenceGenerator: Send + Sync {
    fn name(&self) -> &'static str;
    fn enabled(&self, config: &PlannerConfig) -> bool;
    fn expand(
        &self,
        sequences: &[ActionSequence],
        config: &PlannerConfig,
        ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>>;
}

pub fn registry() -> Vec<Box<dyn SequenceGenerator>> {
    vec![
        Box::new(combinatorial::CombinatorialGenerator),
        Box::new(combinatorial::EnhancedCombinatorialGenerator),
        Box::new(partial::PartialExecutionGenerator),
        Box::new(relaxation::ConstraintRelaxationGenerator),
    ]
}

/// Run every enabled generator over the current set and append its output.
/// Each generator sees the original pattern output, not the other
/// generators' expansions, which keeps the growth bounded.
pub fn run_all(
    sequences: Vec<ActionSequence>,
    config: &PlannerConfig,
    ctx: &PlanningContext,
) -> Vec<ActionSequence> {
    let mut expanded = sequences;
    let base = expanded.clone();

    for generator in registry() {
        if !generator.enabled(config) {
            continue;
        }
        match generator.expand(&base, config, ctx) {
            Ok(mut generated) => {
                debug!(
                    generator = generator.name(),
                    count = generated.len(),
                    "generator finished"
                );
                expanded.append(&mut generated);
            }
            Err(error) => {
                warn!(generator = generator.name(), %error, "generator failed, skipping");
            }
        }
    }
    expanded
}
