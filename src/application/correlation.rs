use crate::application::planner::filters::CorrelationSource;
use crate::application::planner::filters::correlation::pair_key;
use crate::domain::formulas;
use crate::infrastructure::persistence::repositories::HistoryRepository;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builds the pairwise correlation map for the correlation-aware filter from
/// the per-symbol price-history stores. Symbols without enough history are
/// silently absent from the map, which the filter treats as "no data".
pub struct HistoryCorrelationService {
    history: Arc<HistoryRepository>,
}

impl HistoryCorrelationService {
    pub fn new(history: Arc<HistoryRepository>) -> Self {
        Self { history }
    }

    fn pearson(a: &[f64], b: &[f64]) -> f64 {
        let len = a.len().min(b.len());
        if len < 2 {
            return 0.0;
        }
        let a = &a[..len];
        let b = &b[..len];

        let mean_a = a.iter().sum::<f64>() / len as f64;
        let mean_b = b.iter().sum::<f64>() / len as f64;

        let mut numerator = 0.0;
        let mut denom_a = 0.0;
        let mut denom_b = 0.0;
        for i in 0..len {
            let da = a[i] - mean_a;
            let db = b[i] - mean_b;
            numerator += da * db;
            denom_a += da * da;
            denom_b += db * db;
        }
        if denom_a == 0.0 || denom_b == 0.0 {
            return 0.0;
        }
        numerator / (denom_a.sqrt() * denom_b.sqrt())
    }
}

#[async_trait]
impl CorrelationSource for HistoryCorrelationService {
    async fn correlation_map(
        &self,
        isins: &[String],
        lookback_days: u32,
    ) -> Result<HashMap<String, f64>> {
        let mut returns: HashMap<&str, Vec<f64>> = HashMap::new();
        for isin in isins {
            let closes = self.history.recent_closes(isin, lookback_days).await?;
            if closes.len() < 3 {
                continue;
            }
            returns.insert(isin.as_str(), formulas::returns(&closes));
        }

        let mut isins_with_data: Vec<&str> = returns.keys().copied().collect();
        isins_with_data.sort_unstable();

        let mut map = HashMap::new();
        for i in 0..isins_with_data.len() {
            for j in (i + 1)..isins_with_data.len() {
                let (a, b) = (isins_with_data[i], isins_with_data[j]);
                let correlation = Self::pearson(&returns[a], &returns[b]);
                // Bidirectional map, both key orders resolve.
                map.insert(pair_key(a, b), correlation);
                map.insert(pair_key(b, a), correlation);
            }
        }
        debug!(pairs = map.len() / 2, "correlation map built");
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::database::Stores;
    use chrono::NaiveDate;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;

    async fn service_with_histories(
        series: Vec<(&str, Vec<f64>)>,
    ) -> (tempfile::TempDir, HistoryCorrelationService) {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::open_all(dir.path()).await.unwrap();
        let history = Arc::new(HistoryRepository::new(stores));
        for (isin, closes) in series {
            for (i, close) in closes.iter().enumerate() {
                let day = NaiveDate::from_ymd_opt(2026, 1, 1)
                    .unwrap()
                    .checked_add_days(chrono::Days::new(i as u64))
                    .unwrap();
                history
                    .append_close(isin, day, Decimal::from_f64(*close).unwrap())
                    .await
                    .unwrap();
            }
        }
        (dir, HistoryCorrelationService::new(history))
    }

    #[tokio::test]
    async fn test_parallel_series_are_fully_correlated() {
        let (_dir, service) = service_with_histories(vec![
            ("AAA", vec![100.0, 110.0, 105.0, 120.0, 115.0]),
            ("BBB", vec![50.0, 55.0, 52.5, 60.0, 57.5]),
        ])
        .await;

        let map = service
            .correlation_map(&["AAA".to_string(), "BBB".to_string()], 90)
            .await
            .unwrap();
        let corr = map[&pair_key("AAA", "BBB")];
        assert!((corr - 1.0).abs() < 1e-9);
        // Both key orders resolve to the same value.
        assert_eq!(map[&pair_key("AAA", "BBB")], map[&pair_key("BBB", "AAA")]);
    }

    #[tokio::test]
    async fn test_symbols_without_history_are_absent() {
        let (_dir, service) = service_with_histories(vec![(
            "AAA",
            vec![100.0, 110.0, 105.0, 120.0],
        )])
        .await;

        let map = service
            .correlation_map(&["AAA".to_string(), "ZZZ".to_string()], 90)
            .await
            .unwrap();
        assert!(map.is_empty());
    }
}
