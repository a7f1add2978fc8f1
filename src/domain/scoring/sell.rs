/// Component weights for the sell-pressure score. Must sum to 1.0.
#[derive(Debug, Clone, Copy)]
pub struct SellWeights {
    pub underperformance: f64,
    pub time_held: f64,
    pub portfolio_balance: f64,
    pub instability: f64,
    pub drawdown: f64,
}

impl Default for SellWeights {
    fn default() -> Self {
        Self {
            underperformance: 0.30,
            time_held: 0.15,
            portfolio_balance: 0.20,
            instability: 0.15,
            drawdown: 0.20,
        }
    }
}

impl SellWeights {
    pub fn sum(&self) -> f64 {
        self.underperformance
            + self.time_held
            + self.portfolio_balance
            + self.instability
            + self.drawdown
    }
}

/// Inputs for scoring how much pressure there is to exit a holding.
#[derive(Debug, Clone, Copy, Default)]
pub struct SellInputs {
    /// Shortfall of the realized gain against the expected gain for the
    /// holding period, as a fraction (positive = underperforming).
    pub underperformance: f64,
    pub years_held: f64,
    /// Current weight of the holding in the portfolio, 0..1.
    pub weight_fraction: f64,
    /// Maximum target weight for this security, 0..1. Zero disables the
    /// balance component.
    pub max_weight_target: f64,
    /// Annualized volatility, as a fraction.
    pub volatility: f64,
    /// Current drawdown of the position from its own peak, 0..1.
    pub drawdown: f64,
}

fn underperformance_fit(shortfall: f64) -> f64 {
    // A 25% shortfall saturates the component.
    (shortfall / 0.25).clamp(0.0, 1.0)
}

fn time_held_fit(years: f64) -> f64 {
    // Pressure builds over roughly five years of holding.
    (years / 5.0).clamp(0.0, 1.0)
}

fn balance_fit(weight: f64, max_target: f64) -> f64 {
    if max_target <= 0.0 {
        return 0.0;
    }
    // Overweight beyond the target by half the target saturates.
    ((weight - max_target) / (max_target * 0.5)).clamp(0.0, 1.0)
}

fn instability_fit(volatility: f64) -> f64 {
    // 60% annualized volatility saturates.
    (volatility / 0.60).clamp(0.0, 1.0)
}

/// Weighted sell-pressure score in [0, 1].
pub fn sell_score(inputs: &SellInputs, weights: &SellWeights) -> f64 {
    let score = weights.underperformance * underperformance_fit(inputs.underperformance)
        + weights.time_held * time_held_fit(inputs.years_held)
        + weights.portfolio_balance * balance_fit(inputs.weight_fraction, inputs.max_weight_target)
        + weights.instability * instability_fit(inputs.volatility)
        + weights.drawdown * inputs.drawdown.clamp(0.0, 1.0);
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((SellWeights::default().sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_chronic_underperformer_scores_high() {
        let inputs = SellInputs {
            underperformance: 0.30,
            years_held: 6.0,
            weight_fraction: 0.12,
            max_weight_target: 0.05,
            volatility: 0.50,
            drawdown: 0.40,
        };
        let score = sell_score(&inputs, &SellWeights::default());
        assert!(score > 0.8, "score = {}", score);
    }

    #[test]
    fn test_fresh_performer_scores_low() {
        let inputs = SellInputs {
            underperformance: 0.0,
            years_held: 0.5,
            weight_fraction: 0.03,
            max_weight_target: 0.05,
            volatility: 0.15,
            drawdown: 0.05,
        };
        let score = sell_score(&inputs, &SellWeights::default());
        assert!(score < 0.15, "score = {}", score);
    }

    #[test]
    fn test_missing_weight_target_disables_balance_component() {
        let inputs = SellInputs {
            weight_fraction: 0.50,
            max_weight_target: 0.0,
            ..Default::default()
        };
        assert_eq!(sell_score(&inputs, &SellWeights::default()), 0.0);
    }
}
