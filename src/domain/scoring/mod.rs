//! Per-security scoring used by opportunity calculators and the evaluator.

pub mod opportunity;
pub mod quality;
pub mod sell;
pub mod windfall;

pub use opportunity::{opportunity_score, OpportunityWeights};
pub use quality::{quality_score, QualityWeights};
pub use sell::{sell_score, SellInputs, SellWeights};
pub use windfall::{assess_windfall, WindfallAssessment};

/// Observable metrics for one security, assembled from price history and
/// fundamental data by the sync layer.
#[derive(Debug, Clone, Default)]
pub struct SecurityMetrics {
    /// Annualized growth rate over the available history.
    pub historical_cagr: f64,
    /// Fraction of rolling one-year windows with a positive return, 0..1.
    pub consistency: f64,
    /// Composite fundamental-strength score, 0..1.
    pub financial_strength: f64,
    pub sharpe: f64,
    /// Maximum historical drawdown, 0..1.
    pub max_drawdown: f64,
    /// Distance below the 52-week high as a fraction, 0..1.
    pub discount_from_high: f64,
    /// (price - ema) / ema; negative when trading below trend.
    pub ema_distance: f64,
    pub pe_ratio: Option<f64>,
    pub rsi: Option<f64>,
    /// Position inside the Bollinger band, 0..1.
    pub bollinger_position: Option<f64>,
    /// Annualized volatility, as a fraction.
    pub volatility: f64,
}

/// The three planning-facing scores for one security, each 0..1.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityScores {
    pub quality: f64,
    pub opportunity: f64,
    pub sell_pressure: f64,
}

pub fn score_security(metrics: &SecurityMetrics) -> SecurityScores {
    SecurityScores {
        quality: quality_score(metrics, &QualityWeights::default()),
        opportunity: opportunity_score(metrics, &OpportunityWeights::default()),
        sell_pressure: 0.0,
    }
}
