use crate::application::planner::action::{ActionSequence, TAG_RELAXED};
use crate::application::planner::context::PlanningContext;
use crate::application::planner::generators::SequenceGenerator;
use crate::domain::config::PlannerConfig;
use anyhow::Result;

/// Priority haircut on relaxed variants so they only win when nothing
/// compliant scores close.
const RELAXED_PRIORITY_FACTOR: f64 = 0.8;

/// Emits copies of sequences that would fall to the eligibility or cooldown
/// filters, tagged so those filters wave them through. Disabled by default;
/// an operator opts in when the constraints are suspected of blocking every
/// viable plan.
pub struct ConstraintRelaxationGenerator;

impl SequenceGenerator for ConstraintRelaxationGenerator {
    fn name(&self) -> &'static str {
        "constraint_relaxation"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.generators.constraint_relaxation.enabled
    }

    fn expand(
        &self,
        sequences: &[ActionSequence],
        _config: &PlannerConfig,
        ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        let mut variants = Vec::new();

        for sequence in sequences {
            let constrained = sequence.actions.iter().any(|action| {
                ctx.ineligible.contains(&action.isin)
                    || ctx.recently_sold.contains_key(&action.isin)
                    || ctx.recently_bought.contains_key(&action.isin)
            });
            if !constrained {
                continue;
            }
            let mut actions = sequence.actions.clone();
            for action in &mut actions {
                action.tags.insert(TAG_RELAXED.to_string());
                action.priority *= RELAXED_PRIORITY_FACTOR;
            }
            variants.push(ActionSequence::new(self.name(), actions));
        }
        Ok(variants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::planner::action::test_support::candidate;
    use crate::domain::types::TradeSide;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn enabled_config() -> PlannerConfig {
        let mut config = PlannerConfig::default();
        config.generators.constraint_relaxation.enabled = true;
        config
    }

    #[test]
    fn test_relaxed_variant_for_cooldown_blocked_sequence() {
        let c = candidate("AAA", TradeSide::Sell, dec!(300));
        let isin = c.isin.clone();
        let sequences = vec![ActionSequence::new("profit_taking", vec![c])];

        let mut ctx = PlanningContext::default();
        ctx.recently_sold.insert(isin, Utc::now());

        let variants = ConstraintRelaxationGenerator
            .expand(&sequences, &enabled_config(), &ctx)
            .unwrap();
        assert_eq!(variants.len(), 1);
        assert!(variants[0].actions[0].has_tag(TAG_RELAXED));
        assert!(variants[0].priority < sequences[0].priority);
    }

    #[test]
    fn test_unconstrained_sequences_are_not_duplicated() {
        let sequences = vec![ActionSequence::new(
            "direct_buy",
            vec![candidate("AAA", TradeSide::Buy, dec!(300))],
        )];
        let variants = ConstraintRelaxationGenerator
            .expand(&sequences, &enabled_config(), &PlanningContext::default())
            .unwrap();
        assert!(variants.is_empty());
    }
}
