use crate::application::planner::action::ActionSequence;
use crate::application::planner::context::PlanningContext;
use crate::application::planner::generators::SequenceGenerator;
use crate::domain::config::PlannerConfig;
use anyhow::Result;

/// Emits prefix variants of multi-step sequences: the plan may still be worth
/// executing even if only its first steps go through. The completion ratio
/// bounds how small a prefix is worth considering.
pub struct PartialExecutionGenerator;

impl SequenceGenerator for PartialExecutionGenerator {
    fn name(&self) -> &'static str {
        "partial_execution"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.generators.partial_execution.enabled
    }

    fn expand(
        &self,
        sequences: &[ActionSequence],
        config: &PlannerConfig,
        _ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        let min_ratio = config.generators.partial_execution.min_completion_ratio;
        let mut variants = Vec::new();

        for sequence in sequences {
            if sequence.actions.len() < 2 {
                continue;
            }
            let min_steps =
                ((sequence.actions.len() as f64) * min_ratio).ceil().max(1.0) as usize;
            for prefix_len in min_steps..sequence.actions.len() {
                let prefix = sequence.actions[..prefix_len].to_vec();
                variants.push(ActionSequence::new(self.name(), prefix));
            }
        }
        Ok(variants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::planner::action::test_support::candidate;
    use crate::domain::types::TradeSide;
    use rust_decimal_macros::dec;

    fn four_step_sequence() -> ActionSequence {
        ActionSequence::new(
            "mixed_strategy",
            vec![
                candidate("AAA", TradeSide::Sell, dec!(300)),
                candidate("BBB", TradeSide::Sell, dec!(300)),
                candidate("CCC", TradeSide::Buy, dec!(300)),
                candidate("DDD", TradeSide::Buy, dec!(300)),
            ],
        )
    }

    #[test]
    fn test_prefixes_bounded_by_completion_ratio() {
        let sequences = vec![four_step_sequence()];
        let config = PlannerConfig::default(); // ratio 0.5
        let variants = PartialExecutionGenerator
            .expand(&sequences, &config, &PlanningContext::default())
            .unwrap();
        // Prefixes of length 2 and 3; the full sequence already exists.
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].actions.len(), 2);
        assert_eq!(variants[1].actions.len(), 3);
    }

    #[test]
    fn test_prefix_order_is_preserved() {
        let sequences = vec![four_step_sequence()];
        let variants = PartialExecutionGenerator
            .expand(&sequences, &PlannerConfig::default(), &PlanningContext::default())
            .unwrap();
        assert_eq!(variants[0].actions[0].symbol, "AAA");
        assert_eq!(variants[0].actions[1].symbol, "BBB");
    }

    #[test]
    fn test_single_step_sequences_have_no_partials() {
        let sequences = vec![ActionSequence::new(
            "direct_buy",
            vec![candidate("AAA", TradeSide::Buy, dec!(300))],
        )];
        let variants = PartialExecutionGenerator
            .expand(&sequences, &PlannerConfig::default(), &PlanningContext::default())
            .unwrap();
        assert!(variants.is_empty());
    }

    #[test]
    fn test_high_ratio_keeps_only_near_complete_prefixes() {
        let sequences = vec![four_step_sequence()];
        let mut config = PlannerConfig::default();
        config.generators.partial_execution.min_completion_ratio = 0.75;
        let variants = PartialExecutionGenerator
            .expand(&sequences, &config, &PlanningContext::default())
            .unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].actions.len(), 3);
    }
}
