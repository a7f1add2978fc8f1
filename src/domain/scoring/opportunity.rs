use crate::domain::scoring::SecurityMetrics;

/// Component weights for the opportunity score. Must sum to 1.0.
#[derive(Debug, Clone, Copy)]
pub struct OpportunityWeights {
    pub high_discount: f64,
    pub ema_distance: f64,
    pub pe: f64,
    pub rsi: f64,
    pub bollinger: f64,
}

impl Default for OpportunityWeights {
    fn default() -> Self {
        Self {
            high_discount: 0.30,
            ema_distance: 0.20,
            pe: 0.15,
            rsi: 0.20,
            bollinger: 0.15,
        }
    }
}

impl OpportunityWeights {
    pub fn sum(&self) -> f64 {
        self.high_discount + self.ema_distance + self.pe + self.rsi + self.bollinger
    }
}

/// Discount from the 52-week high: a 0..30% discount maps linearly to 0..1.
fn discount_fit(discount: f64) -> f64 {
    (discount / 0.30).clamp(0.0, 1.0)
}

/// Trading below trend is the buying signal: -10% below the EMA maps to 1.0,
/// at or above the EMA maps to 0.
fn ema_fit(distance: f64) -> f64 {
    (-distance / 0.10).clamp(0.0, 1.0)
}

/// Cheaper earnings multiples score higher; unknown P/E is neutral.
fn pe_fit(pe: Option<f64>) -> f64 {
    match pe {
        Some(pe) if pe > 0.0 => ((30.0 - pe) / 25.0).clamp(0.0, 1.0),
        _ => 0.5,
    }
}

/// Oversold RSI scores higher: 30 and below maps to 1.0, 70 and above to 0.
fn rsi_fit(rsi: Option<f64>) -> f64 {
    match rsi {
        Some(rsi) => ((70.0 - rsi) / 40.0).clamp(0.0, 1.0),
        None => 0.5,
    }
}

/// Low placement in the Bollinger band scores higher.
fn bollinger_fit(position: Option<f64>) -> f64 {
    match position {
        Some(p) => 1.0 - p.clamp(0.0, 1.0),
        None => 0.5,
    }
}

/// Weighted opportunity score in [0, 1].
pub fn opportunity_score(metrics: &SecurityMetrics, weights: &OpportunityWeights) -> f64 {
    let score = weights.high_discount * discount_fit(metrics.discount_from_high)
        + weights.ema_distance * ema_fit(metrics.ema_distance)
        + weights.pe * pe_fit(metrics.pe_ratio)
        + weights.rsi * rsi_fit(metrics.rsi)
        + weights.bollinger * bollinger_fit(metrics.bollinger_position);
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((OpportunityWeights::default().sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_beaten_down_security_scores_high() {
        let metrics = SecurityMetrics {
            discount_from_high: 0.30,
            ema_distance: -0.12,
            pe_ratio: Some(8.0),
            rsi: Some(25.0),
            bollinger_position: Some(0.05),
            ..Default::default()
        };
        let score = opportunity_score(&metrics, &OpportunityWeights::default());
        assert!(score > 0.9, "score = {}", score);
    }

    #[test]
    fn test_overheated_security_scores_low() {
        let metrics = SecurityMetrics {
            discount_from_high: 0.0,
            ema_distance: 0.15,
            pe_ratio: Some(45.0),
            rsi: Some(80.0),
            bollinger_position: Some(0.98),
            ..Default::default()
        };
        let score = opportunity_score(&metrics, &OpportunityWeights::default());
        assert!(score < 0.1, "score = {}", score);
    }

    #[test]
    fn test_missing_fundamentals_are_neutral() {
        let metrics = SecurityMetrics::default();
        let score = opportunity_score(&metrics, &OpportunityWeights::default());
        assert!(score > 0.2 && score < 0.5, "score = {}", score);
    }
}
