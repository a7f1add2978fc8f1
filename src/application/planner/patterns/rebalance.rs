use crate::application::planner::action::{ActionSequence, Category};
use crate::application::planner::context::PlanningContext;
use crate::application::planner::patterns::{CandidatePool, SequencePattern};
use crate::domain::config::PlannerConfig;
use anyhow::Result;

/// One rebalance sell paired with one rebalance buy, by rank.
pub struct RebalancePattern;

impl SequencePattern for RebalancePattern {
    fn name(&self) -> &'static str {
        "rebalance"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.patterns.rebalance.enabled
    }

    fn generate(
        &self,
        pool: &CandidatePool,
        _config: &PlannerConfig,
        _ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        let sells = pool.category(Category::RebalanceSells);
        let buys = pool.category(Category::RebalanceBuys);
        Ok(sells
            .iter()
            .zip(buys.iter())
            .map(|(sell, buy)| {
                ActionSequence::new(self.name(), vec![sell.clone(), buy.clone()])
            })
            .collect())
    }
}

/// Every sell/buy pairing across the rebalance categories, capped at the
/// configured sequence budget.
pub struct DeepRebalancePattern;

impl SequencePattern for DeepRebalancePattern {
    fn name(&self) -> &'static str {
        "deep_rebalance"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.patterns.deep_rebalance.enabled
    }

    fn generate(
        &self,
        pool: &CandidatePool,
        config: &PlannerConfig,
        _ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        let max_sequences = config.patterns.deep_rebalance.max_sequences;
        let sells = pool.category(Category::RebalanceSells);
        let buys = pool.category(Category::RebalanceBuys);

        let mut sequences = Vec::new();
        'outer: for sell in sells {
            for buy in buys {
                if sequences.len() >= max_sequences {
                    break 'outer;
                }
                if sell.isin == buy.isin {
                    continue;
                }
                sequences.push(ActionSequence::new(
                    self.name(),
                    vec![sell.clone(), buy.clone()],
                ));
            }
        }
        Ok(sequences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::planner::action::test_support::candidate;
    use crate::domain::types::TradeSide;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn rebalance_pool(sells: usize, buys: usize) -> CandidatePool {
        let sell_candidates = (0..sells)
            .map(|i| candidate(&format!("S{}", i), TradeSide::Sell, dec!(300)))
            .collect();
        let buy_candidates = (0..buys)
            .map(|i| candidate(&format!("B{}", i), TradeSide::Buy, dec!(300)))
            .collect();
        CandidatePool::new(HashMap::from([
            (Category::RebalanceSells, sell_candidates),
            (Category::RebalanceBuys, buy_candidates),
        ]))
    }

    #[test]
    fn test_rebalance_pairs_by_rank() {
        let pool = rebalance_pool(2, 3);
        let sequences = RebalancePattern
            .generate(&pool, &PlannerConfig::default(), &PlanningContext::default())
            .unwrap();
        // Zipped: the shorter side bounds the pairing.
        assert_eq!(sequences.len(), 2);
        for seq in &sequences {
            assert_eq!(seq.actions.len(), 2);
            assert_eq!(seq.actions[0].side, TradeSide::Sell);
            assert_eq!(seq.actions[1].side, TradeSide::Buy);
        }
    }

    #[test]
    fn test_deep_rebalance_covers_cross_product_up_to_cap() {
        let pool = rebalance_pool(3, 4);
        let mut config = PlannerConfig::default();
        config.patterns.deep_rebalance.max_sequences = 10;
        let sequences = DeepRebalancePattern
            .generate(&pool, &config, &PlanningContext::default())
            .unwrap();
        assert_eq!(sequences.len(), 10);

        config.patterns.deep_rebalance.max_sequences = 100;
        let sequences = DeepRebalancePattern
            .generate(&pool, &config, &PlanningContext::default())
            .unwrap();
        assert_eq!(sequences.len(), 12);
    }

    #[test]
    fn test_no_pairs_without_both_sides() {
        let pool = rebalance_pool(2, 0);
        assert!(RebalancePattern
            .generate(&pool, &PlannerConfig::default(), &PlanningContext::default())
            .unwrap()
            .is_empty());
        assert!(DeepRebalancePattern
            .generate(&pool, &PlannerConfig::default(), &PlanningContext::default())
            .unwrap()
            .is_empty());
    }
}
