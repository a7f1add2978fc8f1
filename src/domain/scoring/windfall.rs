//! Windfall detection: gains materially above what the security's own
//! history would predict for the holding period.

/// Excess gain at which the windfall score saturates at 1.0.
const SCORE_SATURATION: f64 = 0.70;

#[derive(Debug, Clone, PartialEq)]
pub struct WindfallAssessment {
    /// Gain above the historically expected gain for the holding period.
    pub excess_gain: f64,
    /// Normalized windfall intensity, 0..1.
    pub windfall_score: f64,
    pub should_sell: bool,
    /// Recommended fraction of the position to sell.
    pub sell_pct: f64,
    pub reason: &'static str,
}

/// Compare the current unrealized gain against what the historical CAGR
/// compounds to over the holding period, and recommend a sell fraction by
/// excess-gain bucket.
pub fn assess_windfall(
    current_gain: f64,
    years_held: f64,
    historical_cagr: f64,
) -> WindfallAssessment {
    let expected_gain = if years_held > 0.0 {
        (1.0 + historical_cagr).powf(years_held) - 1.0
    } else {
        0.0
    };
    let excess_gain = current_gain - expected_gain;
    let windfall_score = (excess_gain / SCORE_SATURATION).clamp(0.0, 1.0);

    let (should_sell, sell_pct, reason) = if excess_gain < 0.10 {
        (false, 0.0, "Within expectations")
    } else if excess_gain < 0.30 {
        (true, 0.20, "Moderate windfall")
    } else if excess_gain < 1.00 {
        (true, 0.40, "High windfall")
    } else {
        (true, 0.50, "Extreme windfall")
    };

    WindfallAssessment {
        excess_gain,
        windfall_score,
        should_sell,
        sell_pct,
        reason,
    }
}
