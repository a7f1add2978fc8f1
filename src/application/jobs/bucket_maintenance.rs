//! Daily bucket lifecycle maintenance: high-water marks, drawdown
//! hibernation, and loss-budget pauses.

use crate::application::jobs::Job;
use crate::domain::buckets::{BucketTransition, CORE_BUCKET};
use crate::infrastructure::persistence::repositories::{
    BucketRepository, CashRepository, PositionRepository,
};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Drawdown from the high-water mark beyond which a bucket hibernates.
pub const HIBERNATE_DRAWDOWN: f64 = 0.35;

/// Supplies a bucket's current value. The core schema does not partition
/// positions into buckets, so valuation is a seam: the default implementation
/// values the core bucket at the whole portfolio and reports no data for
/// others, and a bucketed ledger can plug in without touching the job.
#[async_trait]
pub trait BucketValuation: Send + Sync {
    async fn current_value(&self, bucket_id: &str) -> Result<Option<Decimal>>;
}

pub struct CorePortfolioValuation {
    pub positions: Arc<PositionRepository>,
    pub cash: Arc<CashRepository>,
}

#[async_trait]
impl BucketValuation for CorePortfolioValuation {
    async fn current_value(&self, bucket_id: &str) -> Result<Option<Decimal>> {
        if bucket_id != CORE_BUCKET {
            return Ok(None);
        }
        let positions = self.positions.get_all().await?;
        let cash = self.cash.load().await?;
        let total = positions
            .values()
            .map(|p| p.market_value_eur)
            .sum::<Decimal>()
            + cash.get("EUR");
        Ok(Some(total))
    }
}

pub struct BucketMaintenanceJob {
    pub buckets: Arc<BucketRepository>,
    pub valuation: Arc<dyn BucketValuation>,
}

#[async_trait]
impl Job for BucketMaintenanceJob {
    fn name(&self) -> &'static str {
        "bucket_maintenance"
    }

    async fn run(&self) -> Result<()> {
        self.buckets.ensure_core().await?;

        for mut bucket in self.buckets.get_all().await? {
            let value = match self.valuation.current_value(&bucket.id).await? {
                Some(value) => value,
                None => continue,
            };

            let transitions = bucket.evaluate(value, HIBERNATE_DRAWDOWN);
            for transition in &transitions {
                match transition {
                    BucketTransition::NewHighWaterMark { previous, current } => {
                        info!(bucket = %bucket.id, %previous, %current, "new high-water mark");
                    }
                    BucketTransition::Hibernated { drawdown } => {
                        info!(bucket = %bucket.id, drawdown, "bucket hibernated on drawdown");
                    }
                    BucketTransition::Paused { losses } => {
                        info!(bucket = %bucket.id, losses, "bucket paused on loss budget");
                    }
                }
            }
            if !transitions.is_empty() {
                self.buckets.save(&bucket).await?;
            }
        }
        Ok(())
    }
}
