use crate::application::planner::action::{ActionSequence, Category, TAG_WINDFALL};
use crate::application::planner::context::PlanningContext;
use crate::application::planner::patterns::{CandidatePool, SequencePattern};
use crate::domain::config::PlannerConfig;
use crate::domain::types::TradeSide;
use anyhow::Result;

/// Each buy candidate on its own.
pub struct DirectBuyPattern;

impl SequencePattern for DirectBuyPattern {
    fn name(&self) -> &'static str {
        "direct_buy"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.patterns.direct_buy.enabled
    }

    fn generate(
        &self,
        pool: &CandidatePool,
        _config: &PlannerConfig,
        _ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        Ok(pool
            .by_side(TradeSide::Buy)
            .into_iter()
            .map(|candidate| ActionSequence::new(self.name(), vec![candidate.clone()]))
            .collect())
    }
}

/// Each profit-taking candidate on its own, windfalls leading when
/// configured.
pub struct ProfitTakingPattern;

impl SequencePattern for ProfitTakingPattern {
    fn name(&self) -> &'static str {
        "profit_taking"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.patterns.profit_taking.enabled
    }

    fn generate(
        &self,
        pool: &CandidatePool,
        config: &PlannerConfig,
        _ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        let mut candidates: Vec<_> = pool.category(Category::ProfitTaking).to_vec();
        if config.patterns.profit_taking.windfalls_first {
            candidates.sort_by_key(|c| !c.has_tag(TAG_WINDFALL));
        }
        Ok(candidates
            .into_iter()
            .map(|candidate| ActionSequence::new(self.name(), vec![candidate]))
            .collect())
    }
}

/// Each averaging-down candidate on its own.
pub struct AveragingDownPattern;

impl SequencePattern for AveragingDownPattern {
    fn name(&self) -> &'static str {
        "averaging_down"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.patterns.averaging_down.enabled
    }

    fn generate(
        &self,
        pool: &CandidatePool,
        _config: &PlannerConfig,
        _ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        Ok(pool
            .category(Category::AveragingDown)
            .iter()
            .map(|candidate| ActionSequence::new(self.name(), vec![candidate.clone()]))
            .collect())
    }
}

/// The single highest-priority candidate across every category.
pub struct SingleBestPattern;

impl SequencePattern for SingleBestPattern {
    fn name(&self) -> &'static str {
        "single_best"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.patterns.single_best.enabled
    }

    fn generate(
        &self,
        pool: &CandidatePool,
        _config: &PlannerConfig,
        _ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        let best = pool.all().max_by(|a, b| {
            a.priority
                .partial_cmp(&b.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.symbol.cmp(&a.symbol))
        });
        Ok(best
            .map(|candidate| vec![ActionSequence::new(self.name(), vec![candidate.clone()])])
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::planner::action::test_support::candidate;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn pool_with(
        entries: Vec<(Category, Vec<crate::application::planner::action::ActionCandidate>)>,
    ) -> CandidatePool {
        CandidatePool::new(entries.into_iter().collect::<HashMap<_, _>>())
    }

    #[test]
    fn test_direct_buy_emits_one_sequence_per_buy() {
        let mut a = candidate("AAA", TradeSide::Buy, dec!(300));
        let b = candidate("BBB", TradeSide::Sell, dec!(300));
        a.priority = 2.0;
        let pool = pool_with(vec![
            (Category::OpportunityBuys, vec![a]),
            (Category::ProfitTaking, vec![b]),
        ]);

        let sequences = DirectBuyPattern
            .generate(&pool, &PlannerConfig::default(), &PlanningContext::default())
            .unwrap();
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].actions[0].symbol, "AAA");
        assert_eq!(sequences[0].depth, 1);
    }

    #[test]
    fn test_windfalls_lead_when_configured() {
        let plain = candidate("AAA", TradeSide::Sell, dec!(300));
        let mut windfall = candidate("BBB", TradeSide::Sell, dec!(300));
        windfall.tags.insert(TAG_WINDFALL.to_string());
        let pool = pool_with(vec![(Category::ProfitTaking, vec![plain, windfall])]);

        let sequences = ProfitTakingPattern
            .generate(&pool, &PlannerConfig::default(), &PlanningContext::default())
            .unwrap();
        assert_eq!(sequences.len(), 2);
        assert_eq!(sequences[0].actions[0].symbol, "BBB");
    }

    #[test]
    fn test_single_best_picks_highest_priority() {
        let mut low = candidate("AAA", TradeSide::Buy, dec!(300));
        let mut high = candidate("BBB", TradeSide::Sell, dec!(300));
        low.priority = 0.5;
        high.priority = 3.0;
        let pool = pool_with(vec![
            (Category::OpportunityBuys, vec![low]),
            (Category::ProfitTaking, vec![high]),
        ]);

        let sequences = SingleBestPattern
            .generate(&pool, &PlannerConfig::default(), &PlanningContext::default())
            .unwrap();
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].actions[0].symbol, "BBB");
    }

    #[test]
    fn test_empty_pool_produces_nothing() {
        let pool = CandidatePool::default();
        assert!(SingleBestPattern
            .generate(&pool, &PlannerConfig::default(), &PlanningContext::default())
            .unwrap()
            .is_empty());
    }
}
