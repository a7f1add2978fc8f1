use crate::domain::scoring::SecurityMetrics;

/// Target annualized return the quality bell curve is centered on.
const CAGR_CENTER: f64 = 0.11;
/// Below-center spread; shortfalls decay quickly.
const SIGMA_BELOW: f64 = 0.05;
/// Above-center spread; outperformance is penalized gently (suspiciously hot
/// growth is discounted, not celebrated).
const SIGMA_ABOVE: f64 = 0.20;

/// Component weights for the quality score. Must sum to 1.0.
#[derive(Debug, Clone, Copy)]
pub struct QualityWeights {
    pub total_return: f64,
    pub consistency: f64,
    pub financial_strength: f64,
    pub sharpe: f64,
    pub drawdown: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            total_return: 0.30,
            consistency: 0.20,
            financial_strength: 0.20,
            sharpe: 0.15,
            drawdown: 0.15,
        }
    }
}

impl QualityWeights {
    pub fn sum(&self) -> f64 {
        self.total_return + self.consistency + self.financial_strength + self.sharpe + self.drawdown
    }
}

/// Bell-curve fit of the historical CAGR against the target, with an
/// asymmetric sigma on each side of the center.
pub fn total_return_fit(cagr: f64) -> f64 {
    let sigma = if cagr < CAGR_CENTER {
        SIGMA_BELOW
    } else {
        SIGMA_ABOVE
    };
    let z = (cagr - CAGR_CENTER) / sigma;
    (-0.5 * z * z).exp()
}

fn sharpe_fit(sharpe: f64) -> f64 {
    (sharpe / 2.5).clamp(0.0, 1.0)
}

/// Weighted quality score in [0, 1].
pub fn quality_score(metrics: &SecurityMetrics, weights: &QualityWeights) -> f64 {
    let score = weights.total_return * total_return_fit(metrics.historical_cagr)
        + weights.consistency * metrics.consistency.clamp(0.0, 1.0)
        + weights.financial_strength * metrics.financial_strength.clamp(0.0, 1.0)
        + weights.sharpe * sharpe_fit(metrics.sharpe)
        + weights.drawdown * (1.0 - metrics.max_drawdown.clamp(0.0, 1.0));
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((QualityWeights::default().sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_return_fit_peaks_at_center() {
        assert!((total_return_fit(0.11) - 1.0).abs() < 1e-12);
        assert!(total_return_fit(0.11) > total_return_fit(0.05));
        assert!(total_return_fit(0.11) > total_return_fit(0.30));
    }

    #[test]
    fn test_return_fit_is_asymmetric() {
        // A 6-point shortfall hurts more than a 6-point overshoot.
        assert!(total_return_fit(0.05) < total_return_fit(0.17));
    }

    #[test]
    fn test_strong_steady_grower_scores_high() {
        let metrics = SecurityMetrics {
            historical_cagr: 0.11,
            consistency: 0.9,
            financial_strength: 0.8,
            sharpe: 1.5,
            max_drawdown: 0.15,
            ..Default::default()
        };
        let score = quality_score(&metrics, &QualityWeights::default());
        assert!(score > 0.75, "score = {}", score);
    }

    #[test]
    fn test_volatile_loser_scores_low() {
        let metrics = SecurityMetrics {
            historical_cagr: -0.10,
            consistency: 0.2,
            financial_strength: 0.3,
            sharpe: -0.5,
            max_drawdown: 0.60,
            ..Default::default()
        };
        let score = quality_score(&metrics, &QualityWeights::default());
        assert!(score < 0.35, "score = {}", score);
    }
}
