use crate::domain::types::TradeSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One executable step of a holistic plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub isin: String,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub value_eur: Decimal,
    pub reason: String,
}

/// The ranked, user-facing output of one planner invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolisticPlan {
    pub steps: Vec<PlanStep>,
    pub current_score: f64,
    pub end_state_score: f64,
    pub improvement: f64,
    pub cash_required: Decimal,
    pub cash_generated: Decimal,
    pub feasible: bool,
    pub summary: String,
    pub cache_key: String,
}

impl HolisticPlan {
    /// The do-nothing plan: no opportunities is a valid, feasible outcome,
    /// not a failure.
    pub fn empty(cache_key: &str, current_score: f64) -> Self {
        Self {
            steps: Vec::new(),
            current_score,
            end_state_score: current_score,
            improvement: 0.0,
            cash_required: Decimal::ZERO,
            cash_generated: Decimal::ZERO,
            feasible: true,
            summary: "No actionable opportunities in the current portfolio state".to_string(),
            cache_key: cache_key.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
