use crate::domain::errors::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier of the bucket that can never be retired.
pub const CORE_BUCKET: &str = "core";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketStatus {
    Active,
    Paused,
    Hibernating,
    Retired,
}

impl BucketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketStatus::Active => "active",
            BucketStatus::Paused => "paused",
            BucketStatus::Hibernating => "hibernating",
            BucketStatus::Retired => "retired",
        }
    }
}

impl std::str::FromStr for BucketStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BucketStatus::Active),
            "paused" => Ok(BucketStatus::Paused),
            "hibernating" => Ok(BucketStatus::Hibernating),
            "retired" => Ok(BucketStatus::Retired),
            other => Err(ValidationError::Invalid {
                reason: format!("invalid bucket status: {}", other),
            }),
        }
    }
}

/// Outcome of one maintenance evaluation over a bucket.
#[derive(Debug, Clone, PartialEq)]
pub enum BucketTransition {
    NewHighWaterMark { previous: Decimal, current: Decimal },
    Hibernated { drawdown: f64 },
    Paused { losses: u32 },
}

/// An isolated sub-portfolio with its own cash, positions, and lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub id: String,
    pub status: BucketStatus,
    pub high_water_mark: Decimal,
    pub consecutive_losses: u32,
    pub max_consecutive_losses: u32,
}

impl Bucket {
    pub fn new(id: &str, max_consecutive_losses: u32) -> Self {
        Self {
            id: id.to_string(),
            status: BucketStatus::Active,
            high_water_mark: Decimal::ZERO,
            consecutive_losses: 0,
            max_consecutive_losses,
        }
    }

    pub fn is_core(&self) -> bool {
        self.id == CORE_BUCKET
    }

    /// Drawdown from the high-water mark as a fraction in [0, 1]. Zero when
    /// no mark has been set yet.
    pub fn drawdown(&self, current_value: Decimal) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        if self.high_water_mark <= Decimal::ZERO {
            return 0.0;
        }
        let dd = (self.high_water_mark - current_value) / self.high_water_mark;
        dd.to_f64().unwrap_or(0.0).max(0.0)
    }

    /// Apply the daily maintenance rules for the given current value.
    ///
    /// A new high-water mark revives paused and hibernating buckets and
    /// resets the loss counter. A drawdown beyond `hibernate_threshold`
    /// hibernates any non-retired, non-hibernating bucket. Exhausting the
    /// loss budget pauses an active bucket.
    pub fn evaluate(
        &mut self,
        current_value: Decimal,
        hibernate_threshold: f64,
    ) -> Vec<BucketTransition> {
        let mut transitions = Vec::new();

        if self.status == BucketStatus::Retired {
            return transitions;
        }

        if current_value > self.high_water_mark {
            let previous = self.high_water_mark;
            self.high_water_mark = current_value;
            self.consecutive_losses = 0;
            if matches!(self.status, BucketStatus::Paused | BucketStatus::Hibernating) {
                self.status = BucketStatus::Active;
            }
            transitions.push(BucketTransition::NewHighWaterMark {
                previous,
                current: current_value,
            });
            return transitions;
        }

        let drawdown = self.drawdown(current_value);
        if drawdown > hibernate_threshold && self.status != BucketStatus::Hibernating {
            self.status = BucketStatus::Hibernating;
            transitions.push(BucketTransition::Hibernated { drawdown });
            return transitions;
        }

        if self.status == BucketStatus::Active
            && self.max_consecutive_losses > 0
            && self.consecutive_losses >= self.max_consecutive_losses
        {
            self.status = BucketStatus::Paused;
            transitions.push(BucketTransition::Paused {
                losses: self.consecutive_losses,
            });
        }

        transitions
    }

    pub fn record_loss(&mut self) {
        self.consecutive_losses += 1;
    }

    /// Explicit, terminal retirement. The core bucket is protected.
    pub fn retire(&mut self) -> Result<(), ValidationError> {
        if self.is_core() {
            return Err(ValidationError::Invalid {
                reason: "the core bucket cannot be retired".to_string(),
            });
        }
        self.status = BucketStatus::Retired;
        Ok(())
    }
}
