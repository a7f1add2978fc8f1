//! Shared financial math used by scoring and evaluation.
//!
//! All functions take plain `f64` series; money stays `Decimal` elsewhere and
//! is converted at the boundary. Ratios follow daily-series conventions with
//! 252 trading days per year.

use statrs::statistics::Statistics;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Simple returns from a price series.
pub fn returns(prices: &[f64]) -> Vec<f64> {
    if prices.len() < 2 {
        return Vec::new();
    }
    prices
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Annualized Sharpe ratio from daily returns.
pub fn sharpe_ratio(daily_returns: &[f64], annual_risk_free: f64) -> f64 {
    if daily_returns.len() < 2 {
        return 0.0;
    }
    let rf_daily = annual_risk_free / TRADING_DAYS_PER_YEAR;
    let mean = daily_returns.iter().mean();
    let std = daily_returns.iter().std_dev();
    if std == 0.0 || !std.is_finite() {
        return 0.0;
    }
    (mean - rf_daily) / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualized Sortino ratio with downside deviation measured below the MAR
/// (minimum acceptable return, annualized). Returns at or above the MAR
/// contribute zero downside.
pub fn sortino_ratio(daily_returns: &[f64], annual_mar: f64) -> f64 {
    if daily_returns.len() < 2 {
        return 0.0;
    }
    let mar_daily = annual_mar / TRADING_DAYS_PER_YEAR;
    let mean = daily_returns.iter().mean();

    let downside_sq: f64 = daily_returns
        .iter()
        .map(|r| (r - mar_daily).min(0.0).powi(2))
        .sum::<f64>()
        / daily_returns.len() as f64;
    let downside = downside_sq.sqrt();
    if downside == 0.0 {
        return 0.0;
    }
    (mean - mar_daily) / downside * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Maximum peak-to-trough drawdown of a value series, as a fraction in [0, 1].
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0;
    for &value in values {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Relative Strength Index with Wilder smoothing, in [0, 100].
/// Returns `None` when fewer than `period + 1` prices are available.
pub fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for w in prices[..=period].windows(2) {
        let change = w[1] - w[0];
        if change >= 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }
    let mut avg_gain = gains / period as f64;
    let mut avg_loss = losses / period as f64;

    for w in prices[period..].windows(2) {
        let change = w[1] - w[0];
        let (gain, loss) = if change >= 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Last value of the exponential moving average over `prices`.
pub fn ema(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut value = prices[..period].iter().sum::<f64>() / period as f64;
    for &price in &prices[period..] {
        value = alpha * price + (1.0 - alpha) * value;
    }
    Some(value)
}

/// Annualized volatility of a daily return series.
pub fn annualized_volatility(daily_returns: &[f64]) -> f64 {
    if daily_returns.len() < 2 {
        return 0.0;
    }
    let std = daily_returns.iter().std_dev();
    if !std.is_finite() {
        return 0.0;
    }
    std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Position of the last price inside its Bollinger band, 0.0 at the lower
/// band and 1.0 at the upper band, clamped.
pub fn bollinger_position(prices: &[f64], period: usize, k: f64) -> Option<f64> {
    if period < 2 || prices.len() < period {
        return None;
    }
    let tail = &prices[prices.len() - period..];
    let mean = tail.iter().mean();
    let std = tail.iter().std_dev();
    if std == 0.0 || !std.is_finite() {
        return Some(0.5);
    }
    let lower = mean - k * std;
    let upper = mean + k * std;
    let last = *prices.last()?;
    Some(((last - lower) / (upper - lower)).clamp(0.0, 1.0))
}

/// Compound annual growth rate from a total gain over `years`.
pub fn cagr(total_gain: f64, years: f64) -> f64 {
    if years <= 0.0 || total_gain <= -1.0 {
        return 0.0;
    }
    (1.0 + total_gain).powf(1.0 / years) - 1.0
}
