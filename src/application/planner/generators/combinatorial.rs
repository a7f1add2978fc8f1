use crate::application::planner::action::{ActionCandidate, ActionSequence};
use crate::application::planner::context::PlanningContext;
use crate::application::planner::generators::SequenceGenerator;
use crate::domain::config::PlannerConfig;
use anyhow::Result;
use std::collections::HashSet;

/// Concatenate two sequences into a new one that owns its actions. Pairs
/// that would trade the same security twice are skipped by the callers.
fn concat(name: &str, left: &ActionSequence, right: &ActionSequence) -> ActionSequence {
    let mut actions: Vec<ActionCandidate> =
        Vec::with_capacity(left.actions.len() + right.actions.len());
    actions.extend(left.actions.iter().cloned());
    actions.extend(right.actions.iter().cloned());
    ActionSequence::new(name, actions)
}

fn shares_security(left: &ActionSequence, right: &ActionSequence) -> bool {
    let isins: HashSet<&str> = left.isins().into_iter().collect();
    right.isins().into_iter().any(|isin| isins.contains(isin))
}

/// Pairwise concatenation of the pattern output, up to a cap.
pub struct CombinatorialGenerator;

impl SequenceGenerator for CombinatorialGenerator {
    fn name(&self) -> &'static str {
        "combinatorial"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.generators.combinatorial.enabled
    }

    fn expand(
        &self,
        sequences: &[ActionSequence],
        config: &PlannerConfig,
        _ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        let max_combinations = config.generators.combinatorial.max_combinations;
        let max_depth = config.max_depth as usize;
        let mut combined = Vec::new();

        'outer: for i in 0..sequences.len() {
            for j in (i + 1)..sequences.len() {
                if combined.len() >= max_combinations {
                    break 'outer;
                }
                let (left, right) = (&sequences[i], &sequences[j]);
                if left.depth + right.depth > max_depth || shares_security(left, right) {
                    continue;
                }
                combined.push(concat(self.name(), left, right));
            }
        }
        Ok(combined)
    }
}

/// Depth-limited combination chains with optional priority pruning.
pub struct EnhancedCombinatorialGenerator;

impl SequenceGenerator for EnhancedCombinatorialGenerator {
    fn name(&self) -> &'static str {
        "enhanced_combinatorial"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.generators.enhanced_combinatorial.enabled
    }

    fn expand(
        &self,
        sequences: &[ActionSequence],
        config: &PlannerConfig,
        _ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        let params = &config.generators.enhanced_combinatorial;
        let max_depth = config.max_depth as usize;
        let mut output: Vec<ActionSequence> = Vec::new();
        // Seeds for the next round of chaining; starts from the pattern
        // output and grows with each accepted combination.
        let mut frontier: Vec<ActionSequence> = sequences.to_vec();

        while output.len() < params.max_combinations {
            let mut next_frontier = Vec::new();
            for chain in &frontier {
                for seed in sequences {
                    if output.len() + next_frontier.len() >= params.max_combinations {
                        break;
                    }
                    if chain.depth + seed.depth > max_depth || shares_security(chain, seed) {
                        continue;
                    }
                    let candidate = concat(self.name(), chain, seed);
                    if params.pruning_threshold > 0.0
                        && candidate.priority < params.pruning_threshold
                    {
                        continue;
                    }
                    next_frontier.push(candidate);
                }
            }
            if next_frontier.is_empty() {
                break;
            }
            output.extend(next_frontier.iter().cloned());
            frontier = next_frontier;
        }

        output.truncate(params.max_combinations);
        Ok(output)
    }
}
