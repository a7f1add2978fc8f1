use crate::application::planner::action::ActionSequence;
use crate::application::planner::context::PlanningContext;
use crate::application::planner::filters::{FilterCapabilities, SequenceFilter};
use crate::domain::config::PlannerConfig;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};

/// Drops exact duplicates by hash and near-duplicates by composition
/// similarity, keeping the higher-priority representative. The seen-hash set
/// lives for one invocation only.
pub struct DiversityFilter;

fn composition(sequence: &ActionSequence) -> BTreeSet<(String, crate::domain::types::TradeSide)> {
    sequence
        .actions
        .iter()
        .map(|a| (a.symbol.clone(), a.side))
        .collect()
}

fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

#[async_trait]
impl SequenceFilter for DiversityFilter {
    fn name(&self) -> &'static str {
        "diversity"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.filters.diversity.enabled
    }

    async fn apply(
        &self,
        mut sequences: Vec<ActionSequence>,
        config: &PlannerConfig,
        _ctx: &PlanningContext,
        _capabilities: &FilterCapabilities,
    ) -> Result<Vec<ActionSequence>> {
        let threshold = config.filters.diversity.similarity_threshold;

        // Highest priority first so the best representative of each
        // near-duplicate cluster survives.
        sequences.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.hash.cmp(&b.hash))
        });

        let mut seen_hashes: HashSet<String> = HashSet::new();
        let mut kept: Vec<ActionSequence> = Vec::new();
        let mut kept_compositions: Vec<BTreeSet<(String, crate::domain::types::TradeSide)>> =
            Vec::new();

        for sequence in sequences {
            if !seen_hashes.insert(sequence.hash.clone()) {
                continue;
            }
            let comp = composition(&sequence);
            let near_duplicate = kept_compositions
                .iter()
                .any(|existing| jaccard(existing, &comp) >= threshold);
            if near_duplicate {
                continue;
            }
            kept_compositions.push(comp);
            kept.push(sequence);
        }
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::planner::action::test_support::candidate;
    use crate::domain::types::TradeSide;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_exact_duplicates_are_deduped() {
        let c = candidate("AAA", TradeSide::Buy, dec!(300));
        let sequences = vec![
            ActionSequence::new("direct_buy", vec![c.clone()]),
            ActionSequence::new("single_best", vec![c]),
        ];
        let filtered = DiversityFilter
            .apply(
                sequences,
                &PlannerConfig::default(),
                &PlanningContext::default(),
                &FilterCapabilities::default(),
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn test_highest_priority_near_duplicate_survives() {
        let mut a = candidate("AAA", TradeSide::Buy, dec!(300));
        let b = candidate("BBB", TradeSide::Buy, dec!(300));
        a.priority = 1.0;
        let mut high = a.clone();
        high.priority = 5.0;
        high.quantity += 1; // different hash, same composition

        let sequences = vec![
            ActionSequence::new("direct_buy", vec![a, b.clone()]),
            ActionSequence::new("direct_buy", vec![high, b]),
        ];
        let filtered = DiversityFilter
            .apply(
                sequences,
                &PlannerConfig::default(),
                &PlanningContext::default(),
                &FilterCapabilities::default(),
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert!(filtered[0].priority > 2.0);
    }

    #[tokio::test]
    async fn test_distinct_sequences_all_pass() {
        let sequences = vec![
            ActionSequence::new(
                "direct_buy",
                vec![candidate("AAA", TradeSide::Buy, dec!(300))],
            ),
            ActionSequence::new(
                "direct_buy",
                vec![candidate("BBB", TradeSide::Buy, dec!(300))],
            ),
            ActionSequence::new(
                "profit_taking",
                vec![candidate("CCC", TradeSide::Sell, dec!(300))],
            ),
        ];
        let filtered = DiversityFilter
            .apply(
                sequences,
                &PlannerConfig::default(),
                &PlanningContext::default(),
                &FilterCapabilities::default(),
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 3);
    }
}
