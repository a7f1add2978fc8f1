use crate::application::planner::action::{ActionCandidate, ActionSequence};
use crate::application::planner::context::PlanningContext;
use crate::application::planner::patterns::{CandidatePool, SequencePattern};
use crate::domain::config::PlannerConfig;
use crate::domain::types::TradeSide;
use anyhow::Result;

/// Sequences weighted by the recent-behavior signal: a positive signal
/// scales buy-side priorities up, a negative one favors the sell side.
pub struct AdaptivePattern;

impl SequencePattern for AdaptivePattern {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.patterns.adaptive.enabled
    }

    fn generate(
        &self,
        pool: &CandidatePool,
        _config: &PlannerConfig,
        ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        let signal = ctx.adaptive_signal.clamp(-1.0, 1.0);
        let mut sequences = Vec::new();

        for candidate in pool.all() {
            let bias = match candidate.side {
                TradeSide::Buy => 1.0 + signal,
                TradeSide::Sell => 1.0 - signal,
            };
            if bias <= 0.5 {
                continue;
            }
            let mut weighted = candidate.clone();
            weighted.priority *= bias;
            sequences.push(ActionSequence::new(self.name(), vec![weighted]));
        }
        Ok(sequences)
    }
}

/// Splits the sequence budget between buy, sell and neutral shapes from the
/// regime score. The buy and sell shares are floored; the neutral share is
/// whatever remains, so the split is intentionally asymmetric under some
/// scores rather than renormalized.
pub struct MarketRegimePattern;

/// Fraction of the budget contested between the buy and sell sides; the rest
/// seeds the neutral floor.
const DIRECTIONAL_BUDGET: f64 = 0.8;

pub fn regime_split(max_sequences: usize, regime: f64) -> (usize, usize, usize) {
    let regime = regime.clamp(-1.0, 1.0);
    let buy_fraction = (1.0 + regime) / 2.0 * DIRECTIONAL_BUDGET;
    let sell_fraction = (1.0 - regime) / 2.0 * DIRECTIONAL_BUDGET;
    let buys = (max_sequences as f64 * buy_fraction).floor() as usize;
    let sells = (max_sequences as f64 * sell_fraction).floor() as usize;
    let neutral = max_sequences.saturating_sub(buys + sells);
    (buys, sells, neutral)
}

impl SequencePattern for MarketRegimePattern {
    fn name(&self) -> &'static str {
        "market_regime"
    }

    fn enabled(&self, config: &PlannerConfig) -> bool {
        config.patterns.market_regime.enabled
    }

    fn generate(
        &self,
        pool: &CandidatePool,
        config: &PlannerConfig,
        ctx: &PlanningContext,
    ) -> Result<Vec<ActionSequence>> {
        let (buy_budget, sell_budget, neutral_budget) = regime_split(
            config.patterns.market_regime.max_sequences,
            ctx.market_regime,
        );

        let buys = pool.by_side(TradeSide::Buy);
        let sells = pool.by_side(TradeSide::Sell);
        let mut sequences = Vec::new();

        for candidate in buys.iter().take(buy_budget) {
            sequences.push(ActionSequence::new(self.name(), vec![(*candidate).clone()]));
        }
        for candidate in sells.iter().take(sell_budget) {
            sequences.push(ActionSequence::new(self.name(), vec![(*candidate).clone()]));
        }
        // Neutral shapes: a sell funding a buy, pairing down the ranks.
        for (sell, buy) in sells.iter().zip(buys.iter()).take(neutral_budget) {
            let actions: Vec<ActionCandidate> = vec![(*sell).clone(), (*buy).clone()];
            sequences.push(ActionSequence::new(self.name(), actions));
        }
        Ok(sequences)
    }
}
