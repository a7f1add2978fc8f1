use crate::application::planner::action::ActionSequence;
use crate::application::planner::context::PlanningContext;
use crate::application::planner::filters::{FilterCapabilities, SequenceFilter};
use crate::domain::config::PlannerConfig;
use crate::domain::types::TradeSide;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Key into the bidirectional correlation map.
pub fn pair_key(a: &str, b: &str) -> String {
    format!("{}:{}", a, b)
}

/// Drops sequences whose BUY legs are too correlated with each other.
/// Correlation data is an optional capability: when the provider is absent
/// or fails, every sequence passes and the degradation is logged.
pub struct CorrelationAwareFilter;

fn lookup(map: &HashMap<String, f64>, a: &str, b: &str) -> Option<f64> {
    map.get(&pair_key(a, b))
        .or_else(|| map.get(&pair_key(b, a)))
        .copied()
}

#[async_trait]
impl SequenceFilter for CorrelationAwareFilter {
    fn name(&self) -> &'static str {
        "correlation_aware"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.filters.correlation_aware.enabled
    }

    async fn apply(
        &self,
        sequences: Vec<ActionSequence>,
        config: &PlannerConfig,
        _ctx: &PlanningContext,
        capabilities: &FilterCapabilities,
    ) -> Result<Vec<ActionSequence>> {
        let params = &config.filters.correlation_aware;

        let multi_buy_isins: BTreeSet<String> = sequences
            .iter()
            .filter(|s| s.buys().count() >= 2)
            .flat_map(|s| s.buys().map(|a| a.isin.clone()))
            .collect();
        if multi_buy_isins.is_empty() {
            return Ok(sequences);
        }

        let source = match &capabilities.correlation {
            Some(source) => source,
            None => {
                warn!("correlation provider unavailable, passing all sequences through");
                return Ok(sequences);
            }
        };

        let isins: Vec<String> = multi_buy_isins.into_iter().collect();
        let map = match source.correlation_map(&isins, params.lookback_days).await {
            Ok(map) => map,
            Err(error) => {
                warn!(%error, "correlation fetch failed, passing all sequences through");
                return Ok(sequences);
            }
        };

        Ok(sequences
            .into_iter()
            .filter(|sequence| {
                let buys: Vec<&str> = sequence.buys().map(|a| a.isin.as_str()).collect();
                if buys.len() < 2 {
                    return true;
                }
                for i in 0..buys.len() {
                    for j in (i + 1)..buys.len() {
                        if let Some(corr) = lookup(&map, buys[i], buys[j]) {
                            if corr.abs() > params.max_correlation {
                                return false;
                            }
                        }
                    }
                }
                true
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::planner::action::test_support::candidate;
    use std::sync::Arc;

    struct FixedCorrelations(HashMap<String, f64>);

    #[async_trait]
    impl crate::application::planner::filters::CorrelationSource for FixedCorrelations {
        async fn correlation_map(
            &self,
            _isins: &[String],
            _lookback_days: u32,
        ) -> Result<HashMap<String, f64>> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl crate::application::planner::filters::CorrelationSource for FailingSource {
        async fn correlation_map(
            &self,
            _isins: &[String],
            _lookback_days: u32,
        ) -> Result<HashMap<String, f64>> {
            anyhow::bail!("history store offline")
        }
    }

    fn two_buy_sequence() -> (ActionSequence, String, String) {
        use rust_decimal_macros::dec;
        let a = candidate("AAA", TradeSide::Buy, dec!(300));
        let b = candidate("BBB", TradeSide::Buy, dec!(300));
        let (ia, ib) = (a.isin.clone(), b.isin.clone());
        (ActionSequence::new("mixed_strategy", vec![a, b]), ia, ib)
    }

    #[tokio::test]
    async fn test_highly_correlated_buy_pair_is_dropped() {
        let (sequence, ia, ib) = two_buy_sequence();
        let map = HashMap::from([(pair_key(&ia, &ib), 0.92)]);
        let capabilities = FilterCapabilities {
            correlation: Some(Arc::new(FixedCorrelations(map))),
        };

        let filtered = CorrelationAwareFilter
            .apply(
                vec![sequence],
                &PlannerConfig::default(),
                &PlanningContext::default(),
                &capabilities,
            )
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn test_reverse_key_is_found() {
        let (sequence, ia, ib) = two_buy_sequence();
        // Stored under B:A, looked up as A:B.
        let map = HashMap::from([(pair_key(&ib, &ia), -0.95)]);
        let capabilities = FilterCapabilities {
            correlation: Some(Arc::new(FixedCorrelations(map))),
        };

        let filtered = CorrelationAwareFilter
            .apply(
                vec![sequence],
                &PlannerConfig::default(),
                &PlanningContext::default(),
                &capabilities,
            )
            .await
            .unwrap();
        // |-0.95| breaches the 0.7 default threshold.
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn test_missing_provider_passes_through() {
        let (sequence, _, _) = two_buy_sequence();
        let filtered = CorrelationAwareFilter
            .apply(
                vec![sequence],
                &PlannerConfig::default(),
                &PlanningContext::default(),
                &FilterCapabilities::default(),
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_provider_passes_through() {
        let (sequence, _, _) = two_buy_sequence();
        let capabilities = FilterCapabilities {
            correlation: Some(Arc::new(FailingSource)),
        };
        let filtered = CorrelationAwareFilter
            .apply(
                vec![sequence],
                &PlannerConfig::default(),
                &PlanningContext::default(),
                &capabilities,
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn test_single_buy_sequences_are_untouched() {
        use rust_decimal_macros::dec;
        let sequence = ActionSequence::new(
            "direct_buy",
            vec![candidate("AAA", TradeSide::Buy, dec!(300))],
        );
        let map = HashMap::new();
        let capabilities = FilterCapabilities {
            correlation: Some(Arc::new(FixedCorrelations(map))),
        };
        let filtered = CorrelationAwareFilter
            .apply(
                vec![sequence],
                &PlannerConfig::default(),
                &PlanningContext::default(),
                &capabilities,
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }
}
