use crate::application::planner::action::{ActionSequence, TAG_RELAXED};
use crate::application::planner::context::PlanningContext;
use crate::application::planner::filters::{FilterCapabilities, SequenceFilter};
use crate::domain::config::PlannerConfig;
use crate::domain::types::TradeSide;
use anyhow::Result;
use async_trait::async_trait;

/// Per-symbol cooldown: after a trade, further trades of the same side are
/// suppressed for the configured number of days.
pub struct RecentlyTradedFilter;

#[async_trait]
impl SequenceFilter for RecentlyTradedFilter {
    fn name(&self) -> &'static str {
        "recently_traded"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.filters.recently_traded.enabled
    }

    async fn apply(
        &self,
        sequences: Vec<ActionSequence>,
        config: &PlannerConfig,
        ctx: &PlanningContext,
        _capabilities: &FilterCapabilities,
    ) -> Result<Vec<ActionSequence>> {
        Ok(sequences
            .into_iter()
            .filter(|sequence| {
                sequence.actions.iter().all(|action| {
                    if action.has_tag(TAG_RELAXED) {
                        return true;
                    }
                    let (last_traded, cooldown_days) = match action.side {
                        TradeSide::Sell => (
                            ctx.recently_sold.get(&action.isin),
                            config.sell_cooldown_days,
                        ),
                        TradeSide::Buy => (
                            ctx.recently_bought.get(&action.isin),
                            config.buy_cooldown_days,
                        ),
                    };
                    match last_traded {
                        Some(at) => (ctx.now - *at).num_days() >= cooldown_days as i64,
                        None => true,
                    }
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::planner::action::test_support::candidate;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn sequence_for(symbol: &str, side: TradeSide) -> (ActionSequence, String) {
        let c = candidate(symbol, side, dec!(300));
        let isin = c.isin.clone();
        (ActionSequence::new("profit_taking", vec![c]), isin)
    }

    #[tokio::test]
    async fn test_sell_inside_cooldown_is_dropped() {
        let (sequence, isin) = sequence_for("AAA", TradeSide::Sell);
        let mut ctx = PlanningContext {
            now: Utc::now(),
            ..Default::default()
        };
        ctx.recently_sold.insert(isin, ctx.now - Duration::days(5));

        let filtered = RecentlyTradedFilter
            .apply(
                vec![sequence],
                &PlannerConfig::default(),
                &ctx,
                &FilterCapabilities::default(),
            )
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn test_sell_after_cooldown_passes() {
        let (sequence, isin) = sequence_for("AAA", TradeSide::Sell);
        let mut ctx = PlanningContext {
            now: Utc::now(),
            ..Default::default()
        };
        ctx.recently_sold.insert(isin, ctx.now - Duration::days(45));

        let filtered = RecentlyTradedFilter
            .apply(
                vec![sequence],
                &PlannerConfig::default(),
                &ctx,
                &FilterCapabilities::default(),
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn test_opposite_side_is_not_suppressed() {
        // A recent sell does not block a buy of the same security.
        let (sequence, isin) = sequence_for("AAA", TradeSide::Buy);
        let mut ctx = PlanningContext {
            now: Utc::now(),
            ..Default::default()
        };
        ctx.recently_sold.insert(isin, ctx.now - Duration::days(2));

        let filtered = RecentlyTradedFilter
            .apply(
                vec![sequence],
                &PlannerConfig::default(),
                &ctx,
                &FilterCapabilities::default(),
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }
}
