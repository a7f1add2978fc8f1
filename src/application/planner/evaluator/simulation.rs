use crate::application::planner::action::ActionSequence;
use crate::domain::config::PlannerConfig;
use crate::domain::portfolio::PortfolioState;
use crate::domain::types::TradeSide;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Outcome of walking one sequence against a portfolio state.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub end_state: PortfolioState,
    pub executed_steps: usize,
    pub skipped_steps: usize,
    pub total_costs: Decimal,
}

fn adjusted_value(
    value_eur: Decimal,
    isin: &str,
    adjustments: Option<&HashMap<String, f64>>,
) -> Decimal {
    match adjustments.and_then(|map| map.get(isin)) {
        Some(multiplier) => value_eur * Decimal::from_f64(*multiplier).unwrap_or(Decimal::ONE),
        None => value_eur,
    }
}

/// Simulate a sequence action by action, strictly in order.
///
/// BUYs that cannot be funded (value plus costs) are skipped and counted, not
/// fatal; SELLs are capped at current exposure. Total portfolio value is
/// preserved across every executed action except for the explicit transaction
/// costs, which accumulate in `total_costs`.
pub fn simulate_sequence(
    sequence: &ActionSequence,
    start: &PortfolioState,
    config: &PlannerConfig,
    price_adjustments: Option<&HashMap<String, f64>>,
) -> SimulationResult {
    let mut state = start.clone();
    let mut executed_steps = 0;
    let mut skipped_steps = 0;
    let mut total_costs = Decimal::ZERO;

    for action in &sequence.actions {
        let value = adjusted_value(action.value_eur, &action.isin, price_adjustments);
        match action.side {
            TradeSide::Buy => {
                let cost = config.transaction_cost(value);
                if value + cost > state.cash || !state.apply_buy(&action.isin, value) {
                    skipped_steps += 1;
                    continue;
                }
                state.cash -= cost;
                total_costs += cost;
                executed_steps += 1;
            }
            TradeSide::Sell => {
                let proceeds = state.apply_sell(&action.isin, value);
                if proceeds <= Decimal::ZERO {
                    skipped_steps += 1;
                    continue;
                }
                let cost = config.transaction_cost(proceeds);
                state.cash -= cost;
                total_costs += cost;
                executed_steps += 1;
            }
        }
    }

    SimulationResult {
        end_state: state,
        executed_steps,
        skipped_steps,
        total_costs,
    }
}

/// Fast cash-only pre-filter: walks the sequence tracking nothing but cash
/// and fails on the first BUY that exceeds the running balance. Sell
/// proceeds become available to later buys.
pub fn check_sequence_feasibility(sequence: &ActionSequence, starting_cash: Decimal) -> bool {
    let mut cash = starting_cash;
    for action in &sequence.actions {
        match action.side {
            TradeSide::Buy => {
                if action.value_eur > cash {
                    return false;
                }
                cash -= action.value_eur;
            }
            TradeSide::Sell => {
                cash += action.value_eur;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::planner::action::test_support::candidate;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn state(positions: &[(&str, Decimal)], cash: Decimal) -> PortfolioState {
        PortfolioState {
            position_values: positions
                .iter()
                .map(|(isin, value)| (isin.to_string(), *value))
                .collect(),
            cash,
            country_values: Arc::new(HashMap::new()),
            industry_values: Arc::new(HashMap::new()),
            attribution: Arc::new(HashMap::new()),
        }
    }

    fn seq(actions: Vec<(&str, TradeSide, Decimal)>) -> ActionSequence {
        let candidates = actions
            .into_iter()
            .map(|(symbol, side, value)| candidate(symbol, side, value))
            .collect();
        ActionSequence::new("mixed_strategy", candidates)
    }

    fn isin_of(symbol: &str) -> String {
        candidate(symbol, TradeSide::Buy, dec!(100)).isin
    }

    #[test]
    fn test_value_preserved_modulo_costs() {
        let sequence = seq(vec![
            ("AAA", TradeSide::Sell, dec!(400)),
            ("BBB", TradeSide::Buy, dec!(300)),
        ]);
        let start = state(&[(&isin_of("AAA"), dec!(500))], dec!(100));
        let before = start.total_value();

        let result = simulate_sequence(&sequence, &start, &PlannerConfig::default(), None);
        assert_eq!(result.executed_steps, 2);
        assert_eq!(result.end_state.total_value(), before - result.total_costs);
    }

    #[test]
    fn test_infeasible_buy_is_skipped_not_fatal() {
        let sequence = seq(vec![
            ("AAA", TradeSide::Buy, dec!(900)),
            ("BBB", TradeSide::Buy, dec!(300)),
        ]);
        let start = state(&[], dec!(500));

        let result = simulate_sequence(&sequence, &start, &PlannerConfig::default(), None);
        assert_eq!(result.skipped_steps, 1);
        assert_eq!(result.executed_steps, 1);
        assert!(result
            .end_state
            .position_values
            .contains_key(&isin_of("BBB")));
    }

    #[test]
    fn test_sell_only_sequence_increases_cash() {
        let sequence = seq(vec![
            ("AAA", TradeSide::Sell, dec!(300)),
            ("BBB", TradeSide::Sell, dec!(300)),
        ]);
        let start = state(
            &[(&isin_of("AAA"), dec!(400)), (&isin_of("BBB"), dec!(400))],
            dec!(50),
        );

        let result = simulate_sequence(&sequence, &start, &PlannerConfig::default(), None);
        assert!(result.end_state.cash > start.cash);
    }

    #[test]
    fn test_sell_of_missing_position_is_skipped() {
        let sequence = seq(vec![("ZZZ", TradeSide::Sell, dec!(300))]);
        let start = state(&[], dec!(100));
        let result = simulate_sequence(&sequence, &start, &PlannerConfig::default(), None);
        assert_eq!(result.skipped_steps, 1);
        assert_eq!(result.total_costs, Decimal::ZERO);
    }

    #[test]
    fn test_price_adjustment_scales_action_value() {
        let sequence = seq(vec![("AAA", TradeSide::Sell, dec!(400))]);
        let start = state(&[(&isin_of("AAA"), dec!(1000))], dec!(0));

        let adjustments = HashMap::from([(isin_of("AAA"), 0.5)]);
        let result = simulate_sequence(
            &sequence,
            &start,
            &PlannerConfig::default(),
            Some(&adjustments),
        );
        // Sell proceeds halve under the adjusted price.
        let expected_proceeds = dec!(200);
        assert_eq!(result.end_state.cash, expected_proceeds - result.total_costs);
    }

    #[test]
    fn test_feasibility_fails_on_first_overdraft_buy() {
        // Total flow is positive, but the first BUY overdraws.
        let sequence = seq(vec![
            ("AAA", TradeSide::Buy, dec!(600)),
            ("BBB", TradeSide::Sell, dec!(400)),
            ("CCC", TradeSide::Buy, dec!(200)),
        ]);
        assert!(!check_sequence_feasibility(&sequence, dec!(500)));
    }

    #[test]
    fn test_feasibility_uses_sell_proceeds() {
        let sequence = seq(vec![
            ("AAA", TradeSide::Sell, dec!(400)),
            ("BBB", TradeSide::Buy, dec!(600)),
        ]);
        assert!(check_sequence_feasibility(&sequence, dec!(300)));
        assert!(check_sequence_feasibility(&sequence, dec!(200)));

        let buy_first = seq(vec![
            ("BBB", TradeSide::Buy, dec!(600)),
            ("AAA", TradeSide::Sell, dec!(400)),
        ]);
        assert!(!check_sequence_feasibility(&buy_first, dec!(300)));
    }
}
