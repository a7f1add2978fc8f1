use crate::application::planner::action::{ActionCandidate, ActionSequence, Category};
use crate::application::planner::context::PlanningContext;
use crate::application::planner::patterns::{CandidatePool, SequencePattern};
use crate::domain::config::PlannerConfig;
use crate::domain::types::TradeSide;
use anyhow::Result;
use rust_decimal::Decimal;

/// Up to N sells bundled into one sequence.
pub struct MultiSellPattern;

impl SequencePattern for MultiSellPattern {
    fn name(&self) -> &'static str {
        "multi_sell"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.patterns.multi_sell.enabled
    }

    fn generate(
        &self,
        pool: &CandidatePool,
        config: &PlannerConfig,
        _ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        let sells: Vec<ActionCandidate> = pool
            .by_side(TradeSide::Sell)
            .into_iter()
            .take(config.patterns.multi_sell.max_sells)
            .cloned()
            .collect();
        if sells.len() < 2 {
            return Ok(Vec::new());
        }
        Ok(vec![ActionSequence::new(self.name(), sells)])
    }
}

/// Bundles crossing categories: one rank level per bundle, taking each
/// category's r-th best candidate.
pub struct MixedStrategyPattern;

const MIXED_MAX_BUNDLES: usize = 3;

impl SequencePattern for MixedStrategyPattern {
    fn name(&self) -> &'static str {
        "mixed_strategy"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.patterns.mixed_strategy.enabled
    }

    fn generate(
        &self,
        pool: &CandidatePool,
        config: &PlannerConfig,
        _ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        let max_actions = config.patterns.mixed_strategy.max_actions;
        let mut categories: Vec<&Category> = pool.by_category.keys().collect();
        categories.sort_by_key(|c| c.name());

        let mut sequences = Vec::new();
        for rank in 0..MIXED_MAX_BUNDLES {
            let bundle: Vec<ActionCandidate> = categories
                .iter()
                .filter_map(|category| pool.category(**category).get(rank).cloned())
                .take(max_actions)
                .collect();
            // A bundle that does not cross categories adds nothing over the
            // single-candidate patterns.
            if bundle.len() < 2 {
                break;
            }
            sequences.push(ActionSequence::new(self.name(), bundle));
        }
        Ok(sequences)
    }
}

/// Opportunity buys placed ahead of rebalance actions.
pub struct OpportunityFirstPattern;

impl SequencePattern for OpportunityFirstPattern {
    fn name(&self) -> &'static str {
        "opportunity_first"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.patterns.opportunity_first.enabled
    }

    fn generate(
        &self,
        pool: &CandidatePool,
        _config: &PlannerConfig,
        _ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        let mut actions: Vec<ActionCandidate> = pool
            .category(Category::OpportunityBuys)
            .iter()
            .take(2)
            .cloned()
            .collect();
        if actions.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(sell) = pool.category(Category::RebalanceSells).first() {
            actions.push(sell.clone());
        }
        if let Some(buy) = pool.category(Category::RebalanceBuys).first() {
            actions.push(buy.clone());
        }
        if actions.len() < 2 {
            return Ok(Vec::new());
        }
        Ok(vec![ActionSequence::new(self.name(), actions)])
    }
}

/// Sells-only sequence that keeps adding by priority until the cash target
/// is reached.
pub struct CashGenerationPattern;

impl SequencePattern for CashGenerationPattern {
    fn name(&self) -> &'static str {
        "cash_generation"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.patterns.cash_generation.enabled
    }

    fn generate(
        &self,
        pool: &CandidatePool,
        config: &PlannerConfig,
        _ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        let target = config.patterns.cash_generation.cash_target_eur;
        let mut raised = Decimal::ZERO;
        let mut sells = Vec::new();
        for candidate in pool.by_side(TradeSide::Sell) {
            if raised >= target {
                break;
            }
            raised += candidate.value_eur - config.transaction_cost(candidate.value_eur);
            sells.push(candidate.clone());
        }
        if sells.is_empty() || raised < target {
            return Ok(Vec::new());
        }
        Ok(vec![ActionSequence::new(self.name(), sells)])
    }
}

/// Bundles small actions so one fixed fee schedule covers more volume.
pub struct CostOptimizedPattern;

impl SequencePattern for CostOptimizedPattern {
    fn name(&self) -> &'static str {
        "cost_optimized"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.patterns.cost_optimized.enabled
    }

    fn generate(
        &self,
        pool: &CandidatePool,
        config: &PlannerConfig,
        _ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        // Actions below twice the floor pay disproportionate fixed costs;
        // bundling amortizes them.
        let small_cutoff = config.min_trade_amount() * Decimal::from(2);
        let mut small: Vec<ActionCandidate> = pool
            .all()
            .filter(|c| c.value_eur < small_cutoff)
            .cloned()
            .collect();
        if small.len() < 2 {
            return Ok(Vec::new());
        }
        small.sort_by(|a, b| {
            a.value_eur
                .cmp(&b.value_eur)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        small.truncate(4);
        Ok(vec![ActionSequence::new(self.name(), small)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::planner::action::test_support::candidate;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn pool_with(entries: Vec<(Category, Vec<ActionCandidate>)>) -> CandidatePool {
        CandidatePool::new(entries.into_iter().collect::<HashMap<_, _>>())
    }

    #[test]
    fn test_multi_sell_bundles_top_sells() {
        let mut s1 = candidate("AAA", TradeSide::Sell, dec!(300));
        let mut s2 = candidate("BBB", TradeSide::Sell, dec!(300));
        let mut s3 = candidate("CCC", TradeSide::Sell, dec!(300));
        let mut s4 = candidate("DDD", TradeSide::Sell, dec!(300));
        s1.priority = 4.0;
        s2.priority = 3.0;
        s3.priority = 2.0;
        s4.priority = 1.0;
        let pool = pool_with(vec![(Category::ProfitTaking, vec![s4, s1, s3, s2])]);

        let sequences = MultiSellPattern
            .generate(&pool, &PlannerConfig::default(), &PlanningContext::default())
            .unwrap();
        assert_eq!(sequences.len(), 1);
        let symbols: Vec<&str> = sequences[0]
            .actions
            .iter()
            .map(|a| a.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["AAA", "BBB", "CCC"]);
    }

    #[test]
    fn test_multi_sell_needs_at_least_two() {
        let pool = pool_with(vec![(
            Category::ProfitTaking,
            vec![candidate("AAA", TradeSide::Sell, dec!(300))],
        )]);
        assert!(MultiSellPattern
            .generate(&pool, &PlannerConfig::default(), &PlanningContext::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_mixed_strategy_crosses_categories() {
        let pool = pool_with(vec![
            (
                Category::ProfitTaking,
                vec![
                    candidate("AAA", TradeSide::Sell, dec!(300)),
                    candidate("A2", TradeSide::Sell, dec!(300)),
                ],
            ),
            (
                Category::OpportunityBuys,
                vec![candidate("BBB", TradeSide::Buy, dec!(300))],
            ),
        ]);
        let sequences = MixedStrategyPattern
            .generate(&pool, &PlannerConfig::default(), &PlanningContext::default())
            .unwrap();
        // Rank 0 crosses both categories; rank 1 only has one entry left.
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].actions.len(), 2);
    }

    #[test]
    fn test_cash_generation_stops_at_target() {
        let mut s1 = candidate("AAA", TradeSide::Sell, dec!(600));
        let mut s2 = candidate("BBB", TradeSide::Sell, dec!(600));
        let s3 = candidate("CCC", TradeSide::Sell, dec!(600));
        s1.priority = 3.0;
        s2.priority = 2.0;
        let pool = pool_with(vec![(Category::ProfitTaking, vec![s1, s2, s3])]);

        let config = PlannerConfig::default(); // target 1000
        let sequences = CashGenerationPattern
            .generate(&pool, &config, &PlanningContext::default())
            .unwrap();
        assert_eq!(sequences.len(), 1);
        // Two 600 EUR sells clear the 1000 EUR target after costs.
        assert_eq!(sequences[0].actions.len(), 2);
    }

    #[test]
    fn test_cash_generation_unreachable_target_yields_nothing() {
        let pool = pool_with(vec![(
            Category::ProfitTaking,
            vec![candidate("AAA", TradeSide::Sell, dec!(300))],
        )]);
        let mut config = PlannerConfig::default();
        config.patterns.cash_generation.cash_target_eur = dec!(5000);
        assert!(CashGenerationPattern
            .generate(&pool, &config, &PlanningContext::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_cost_optimized_bundles_small_trades() {
        // Default floor is 250; the cutoff is 500.
        let pool = pool_with(vec![
            (
                Category::RebalanceBuys,
                vec![
                    candidate("AAA", TradeSide::Buy, dec!(300)),
                    candidate("BBB", TradeSide::Buy, dec!(400)),
                ],
            ),
            (
                Category::ProfitTaking,
                vec![candidate("CCC", TradeSide::Sell, dec!(900))],
            ),
        ]);
        let sequences = CostOptimizedPattern
            .generate(&pool, &PlannerConfig::default(), &PlanningContext::default())
            .unwrap();
        assert_eq!(sequences.len(), 1);
        let symbols: Vec<&str> = sequences[0]
            .actions
            .iter()
            .map(|a| a.symbol.as_str())
            .collect();
        // Only the two sub-cutoff actions are bundled, smallest first.
        assert_eq!(symbols, vec!["AAA", "BBB"]);
    }
}
