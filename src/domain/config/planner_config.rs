use crate::domain::errors::ValidationError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How surviving sequences are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    Single,
    Stochastic,
    MonteCarlo,
}

impl Default for EvaluationMode {
    fn default() -> Self {
        EvaluationMode::Single
    }
}

// ---------------------------------------------------------------------------
// Calculator parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProfitTakingParams {
    pub enabled: bool,
    /// Unrealized gain required before a sell candidate is emitted.
    pub min_gain_threshold: f64,
    /// Gain beyond which the candidate is tagged as a windfall.
    pub windfall_threshold: f64,
    /// Days a position must be held before profit taking applies.
    pub min_hold_days: u32,
}

impl Default for ProfitTakingParams {
    fn default() -> Self {
        Self {
            enabled: true,
            min_gain_threshold: 0.15,
            windfall_threshold: 0.30,
            min_hold_days: 45,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AveragingDownParams {
    pub enabled: bool,
    /// Unrealized loss at which averaging down starts to apply.
    pub loss_threshold: f64,
    /// Losses beyond this are considered broken theses, not discounts.
    pub max_loss_allowed: f64,
    /// Cap on the buy size as a fraction of the existing position value.
    pub max_add_fraction: f64,
}

impl Default for AveragingDownParams {
    fn default() -> Self {
        Self {
            enabled: true,
            loss_threshold: 0.10,
            max_loss_allowed: 0.35,
            max_add_fraction: 0.50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OpportunityBuysParams {
    pub enabled: bool,
    pub min_score: f64,
    pub max_value_per_position: Decimal,
    pub max_positions: usize,
    /// Skip securities that are already held.
    pub exclude_existing: bool,
}

impl Default for OpportunityBuysParams {
    fn default() -> Self {
        Self {
            enabled: true,
            min_score: 0.55,
            max_value_per_position: dec!(1000),
            max_positions: 5,
            exclude_existing: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RebalanceSellsParams {
    pub enabled: bool,
    /// Overweight (current minus target) required before selling down.
    pub threshold: f64,
}

impl Default for RebalanceSellsParams {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RebalanceBuysParams {
    pub enabled: bool,
    pub min_underweight_threshold: f64,
}

impl Default for RebalanceBuysParams {
    fn default() -> Self {
        Self {
            enabled: true,
            min_underweight_threshold: 0.03,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WeightBasedParams {
    pub enabled: bool,
    /// Deviation from a security's own min/max target that triggers action.
    pub deviation_threshold: f64,
}

impl Default for WeightBasedParams {
    fn default() -> Self {
        Self {
            enabled: true,
            deviation_threshold: 0.01,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CalculatorsConfig {
    pub profit_taking: ProfitTakingParams,
    pub averaging_down: AveragingDownParams,
    pub opportunity_buys: OpportunityBuysParams,
    pub rebalance_sells: RebalanceSellsParams,
    pub rebalance_buys: RebalanceBuysParams,
    pub weight_based: WeightBasedParams,
}

impl CalculatorsConfig {
    pub fn any_enabled(&self) -> bool {
        self.profit_taking.enabled
            || self.averaging_down.enabled
            || self.opportunity_buys.enabled
            || self.rebalance_sells.enabled
            || self.rebalance_buys.enabled
            || self.weight_based.enabled
    }
}

// ---------------------------------------------------------------------------
// Pattern parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PatternToggle {
    pub enabled: bool,
}

impl Default for PatternToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProfitTakingPatternParams {
    pub enabled: bool,
    /// Order windfall-tagged candidates ahead of the rest.
    pub windfalls_first: bool,
}

impl Default for ProfitTakingPatternParams {
    fn default() -> Self {
        Self {
            enabled: true,
            windfalls_first: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MultiSellParams {
    pub enabled: bool,
    pub max_sells: usize,
}

impl Default for MultiSellParams {
    fn default() -> Self {
        Self {
            enabled: true,
            max_sells: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MixedStrategyParams {
    pub enabled: bool,
    pub max_actions: usize,
}

impl Default for MixedStrategyParams {
    fn default() -> Self {
        Self {
            enabled: true,
            max_actions: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DeepRebalanceParams {
    pub enabled: bool,
    pub max_sequences: usize,
}

impl Default for DeepRebalanceParams {
    fn default() -> Self {
        Self {
            enabled: true,
            max_sequences: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CashGenerationParams {
    pub enabled: bool,
    pub cash_target_eur: Decimal,
}

impl Default for CashGenerationParams {
    fn default() -> Self {
        Self {
            enabled: true,
            cash_target_eur: dec!(1000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MarketRegimeParams {
    pub enabled: bool,
    pub max_sequences: usize,
}

impl Default for MarketRegimeParams {
    fn default() -> Self {
        Self {
            enabled: true,
            max_sequences: 9,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PatternsConfig {
    pub direct_buy: PatternToggle,
    pub profit_taking: ProfitTakingPatternParams,
    pub rebalance: PatternToggle,
    pub averaging_down: PatternToggle,
    pub single_best: PatternToggle,
    pub multi_sell: MultiSellParams,
    pub mixed_strategy: MixedStrategyParams,
    pub opportunity_first: PatternToggle,
    pub deep_rebalance: DeepRebalanceParams,
    pub cash_generation: CashGenerationParams,
    pub cost_optimized: PatternToggle,
    pub adaptive: PatternToggle,
    pub market_regime: MarketRegimeParams,
}

impl PatternsConfig {
    pub fn any_enabled(&self) -> bool {
        self.direct_buy.enabled
            || self.profit_taking.enabled
            || self.rebalance.enabled
            || self.averaging_down.enabled
            || self.single_best.enabled
            || self.multi_sell.enabled
            || self.mixed_strategy.enabled
            || self.opportunity_first.enabled
            || self.deep_rebalance.enabled
            || self.cash_generation.enabled
            || self.cost_optimized.enabled
            || self.adaptive.enabled
            || self.market_regime.enabled
    }
}

// ---------------------------------------------------------------------------
// Generator parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CombinatorialParams {
    pub enabled: bool,
    pub max_combinations: usize,
}

impl Default for CombinatorialParams {
    fn default() -> Self {
        Self {
            enabled: true,
            max_combinations: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EnhancedCombinatorialParams {
    pub enabled: bool,
    pub max_combinations: usize,
    /// Combinations whose aggregate priority falls below this cutoff are
    /// pruned before expansion. Zero disables pruning.
    pub pruning_threshold: f64,
}

impl Default for EnhancedCombinatorialParams {
    fn default() -> Self {
        Self {
            enabled: true,
            max_combinations: 100,
            pruning_threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PartialExecutionParams {
    pub enabled: bool,
    /// Smallest prefix of a sequence worth emitting, as a fraction of steps.
    pub min_completion_ratio: f64,
}

impl Default for PartialExecutionParams {
    fn default() -> Self {
        Self {
            enabled: true,
            min_completion_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConstraintRelaxationParams {
    pub enabled: bool,
}

impl Default for ConstraintRelaxationParams {
    fn default() -> Self {
        Self { enabled: false }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GeneratorsConfig {
    pub combinatorial: CombinatorialParams,
    pub enhanced_combinatorial: EnhancedCombinatorialParams,
    pub partial_execution: PartialExecutionParams,
    pub constraint_relaxation: ConstraintRelaxationParams,
}

impl GeneratorsConfig {
    pub fn any_enabled(&self) -> bool {
        self.combinatorial.enabled
            || self.enhanced_combinatorial.enabled
            || self.partial_execution.enabled
            || self.constraint_relaxation.enabled
    }
}

// ---------------------------------------------------------------------------
// Filter parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DiversityFilterParams {
    pub enabled: bool,
    /// Fraction of shared actions beyond which two sequences are considered
    /// near-duplicates.
    pub similarity_threshold: f64,
}

impl Default for DiversityFilterParams {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CorrelationFilterParams {
    pub enabled: bool,
    pub max_correlation: f64,
    pub lookback_days: u32,
}

impl Default for CorrelationFilterParams {
    fn default() -> Self {
        Self {
            enabled: true,
            max_correlation: 0.7,
            lookback_days: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FilterToggle {
    pub enabled: bool,
}

impl Default for FilterToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FiltersConfig {
    pub eligibility: FilterToggle,
    pub recently_traded: FilterToggle,
    pub diversity: DiversityFilterParams,
    pub correlation_aware: CorrelationFilterParams,
}

impl FiltersConfig {
    pub fn any_enabled(&self) -> bool {
        self.eligibility.enabled
            || self.recently_traded.enabled
            || self.diversity.enabled
            || self.correlation_aware.enabled
    }
}

// ---------------------------------------------------------------------------
// Evaluation parameters
// ---------------------------------------------------------------------------

/// Weights for the end-state portfolio score. Must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EvaluationWeights {
    pub quality: f64,
    pub opportunity: f64,
    pub sell_pressure_relief: f64,
    pub allocation_fit: f64,
    pub diversification: f64,
}

impl Default for EvaluationWeights {
    fn default() -> Self {
        Self {
            quality: 0.30,
            opportunity: 0.20,
            sell_pressure_relief: 0.10,
            allocation_fit: 0.20,
            diversification: 0.20,
        }
    }
}

impl EvaluationWeights {
    pub fn sum(&self) -> f64 {
        self.quality
            + self.opportunity
            + self.sell_pressure_relief
            + self.allocation_fit
            + self.diversification
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StochasticParams {
    /// Price shifts applied to every symbol in the sequence, with scenario
    /// weights keyed by the shift's string form.
    pub shifts: Vec<f64>,
    pub weights: BTreeMap<String, f64>,
}

impl Default for StochasticParams {
    fn default() -> Self {
        let shifts = vec![-0.10, -0.05, 0.0, 0.05, 0.10];
        let weights = [
            ("-0.10", 0.10),
            ("-0.05", 0.20),
            ("0.00", 0.40),
            ("0.05", 0.20),
            ("0.10", 0.10),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self { shifts, weights }
    }
}

pub fn shift_key(shift: f64) -> String {
    format!("{:.2}", shift)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MonteCarloParams {
    pub paths: usize,
}

impl Default for MonteCarloParams {
    fn default() -> Self {
        Self { paths: 100 }
    }
}

// ---------------------------------------------------------------------------
// Top-level configuration
// ---------------------------------------------------------------------------

/// The planner configuration document. One serialized tree; missing fields
/// fall back to defaults; unknown module names fail deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PlannerConfig {
    pub name: String,
    pub evaluation_mode: EvaluationMode,

    pub max_depth: u32,
    pub max_opportunities_per_category: usize,
    pub priority_threshold: f64,
    pub beam_width: usize,
    pub diversity_weight: f64,

    pub transaction_cost_fixed: Decimal,
    pub transaction_cost_percent: Decimal,
    pub cost_penalty_factor: f64,
    pub max_cost_ratio: Decimal,

    pub allow_buy: bool,
    pub allow_sell: bool,

    /// Per-symbol sell cooldown, cross-checked against profit-taking holds.
    pub sell_cooldown_days: u32,
    /// Per-symbol buy cooldown.
    pub buy_cooldown_days: u32,

    pub calculators: CalculatorsConfig,
    pub patterns: PatternsConfig,
    pub generators: GeneratorsConfig,
    pub filters: FiltersConfig,

    pub evaluation_weights: EvaluationWeights,
    pub stochastic: StochasticParams,
    pub monte_carlo: MonteCarloParams,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            evaluation_mode: EvaluationMode::Single,
            max_depth: 3,
            max_opportunities_per_category: 10,
            priority_threshold: 0.0,
            beam_width: 25,
            diversity_weight: 0.3,
            transaction_cost_fixed: dec!(2.00),
            transaction_cost_percent: dec!(0.002),
            cost_penalty_factor: 1.0,
            max_cost_ratio: dec!(0.01),
            allow_buy: true,
            allow_sell: true,
            sell_cooldown_days: 30,
            buy_cooldown_days: 7,
            calculators: CalculatorsConfig::default(),
            patterns: PatternsConfig::default(),
            generators: GeneratorsConfig::default(),
            filters: FiltersConfig::default(),
            evaluation_weights: EvaluationWeights::default(),
            stochastic: StochasticParams::default(),
            monte_carlo: MonteCarloParams::default(),
        }
    }
}

impl PlannerConfig {
    /// Smallest trade worth placing given the cost structure: the value at
    /// which total costs hit `max_cost_ratio`.
    pub fn min_trade_amount(&self) -> Decimal {
        let denominator = self.max_cost_ratio - self.transaction_cost_percent;
        if denominator <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.transaction_cost_fixed / denominator
    }

    /// Total cost charged on top of a trade of `value_eur`.
    pub fn transaction_cost(&self, value_eur: Decimal) -> Decimal {
        self.transaction_cost_fixed + self.transaction_cost_percent * value_eur
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if !(1..=10).contains(&self.max_depth) {
            return Err(ValidationError::OutOfRange {
                param: "max_depth".to_string(),
                value: self.max_depth as f64,
                min: 1.0,
                max: 10.0,
            });
        }
        range_check("diversity_weight", self.diversity_weight, 0.0, 1.0)?;
        range_check("priority_threshold", self.priority_threshold, 0.0, 100.0)?;
        range_check("cost_penalty_factor", self.cost_penalty_factor, 0.0, 100.0)?;
        if self.beam_width == 0 {
            return Err(ValidationError::OutOfRange {
                param: "beam_width".to_string(),
                value: 0.0,
                min: 1.0,
                max: f64::MAX,
            });
        }

        if !self.allow_buy && !self.allow_sell {
            return Err(ValidationError::TradingDisabled);
        }
        if !self.calculators.any_enabled() {
            return Err(ValidationError::AllModulesDisabled {
                kind: "calculator".to_string(),
            });
        }
        if !self.patterns.any_enabled() {
            return Err(ValidationError::AllModulesDisabled {
                kind: "pattern".to_string(),
            });
        }
        if !self.generators.any_enabled() {
            return Err(ValidationError::AllModulesDisabled {
                kind: "generator".to_string(),
            });
        }
        if !self.filters.any_enabled() {
            return Err(ValidationError::AllModulesDisabled {
                kind: "filter".to_string(),
            });
        }

        let pt = &self.calculators.profit_taking;
        range_check("profit_taking.min_gain_threshold", pt.min_gain_threshold, 0.0, 10.0)?;
        range_check("profit_taking.windfall_threshold", pt.windfall_threshold, 0.0, 10.0)?;
        if pt.enabled && pt.min_hold_days < self.sell_cooldown_days {
            return Err(ValidationError::CrossParameter {
                reason: format!(
                    "profit_taking.min_hold_days ({}) must be at least the sell cooldown ({})",
                    pt.min_hold_days, self.sell_cooldown_days
                ),
            });
        }

        let ad = &self.calculators.averaging_down;
        range_check("averaging_down.loss_threshold", ad.loss_threshold, 0.0, 1.0)?;
        range_check("averaging_down.max_loss_allowed", ad.max_loss_allowed, 0.0, 1.0)?;
        if ad.enabled && ad.loss_threshold > ad.max_loss_allowed {
            return Err(ValidationError::CrossParameter {
                reason: format!(
                    "averaging_down.loss_threshold ({}) exceeds max_loss_allowed ({})",
                    ad.loss_threshold, ad.max_loss_allowed
                ),
            });
        }

        range_check(
            "opportunity_buys.min_score",
            self.calculators.opportunity_buys.min_score,
            0.0,
            1.0,
        )?;
        range_check(
            "rebalance_sells.threshold",
            self.calculators.rebalance_sells.threshold,
            0.0,
            1.0,
        )?;
        range_check(
            "rebalance_buys.min_underweight_threshold",
            self.calculators.rebalance_buys.min_underweight_threshold,
            0.0,
            1.0,
        )?;

        let ec = &self.generators.enhanced_combinatorial;
        range_check(
            "enhanced_combinatorial.pruning_threshold",
            ec.pruning_threshold,
            0.0,
            1.0,
        )?;
        if ec.enabled && ec.max_combinations > 1000 && ec.pruning_threshold > 0.9 {
            return Err(ValidationError::CrossParameter {
                reason: "enhanced_combinatorial: large max_combinations with near-total pruning \
                         spends the whole budget discarding its own output"
                    .to_string(),
            });
        }

        let pe = &self.generators.partial_execution;
        if pe.enabled && !(pe.min_completion_ratio > 0.0 && pe.min_completion_ratio <= 1.0) {
            return Err(ValidationError::OutOfRange {
                param: "partial_execution.min_completion_ratio".to_string(),
                value: pe.min_completion_ratio,
                min: f64::EPSILON,
                max: 1.0,
            });
        }

        range_check(
            "correlation_aware.max_correlation",
            self.filters.correlation_aware.max_correlation,
            0.0,
            1.0,
        )?;
        range_check(
            "diversity.similarity_threshold",
            self.filters.diversity.similarity_threshold,
            0.0,
            1.0,
        )?;

        let weight_sum = self.evaluation_weights.sum();
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(ValidationError::Invalid {
                reason: format!("evaluation weights must sum to 1.0, got {}", weight_sum),
            });
        }

        if self.monte_carlo.paths == 0 {
            return Err(ValidationError::OutOfRange {
                param: "monte_carlo.paths".to_string(),
                value: 0.0,
                min: 1.0,
                max: f64::MAX,
            });
        }
        if self.stochastic.shifts.is_empty() {
            return Err(ValidationError::Invalid {
                reason: "stochastic.shifts must not be empty".to_string(),
            });
        }

        if self.transaction_cost_percent >= self.max_cost_ratio {
            return Err(ValidationError::CrossParameter {
                reason: "transaction_cost_percent must stay below max_cost_ratio or no trade \
                         amount can satisfy the cost ceiling"
                    .to_string(),
            });
        }

        Ok(())
    }
}

fn range_check(param: &str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            param: param.to_string(),
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(PlannerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_min_trade_amount_at_default_costs() {
        let config = PlannerConfig::default();
        // 2.00 / (0.01 - 0.002) = 250 EUR.
        assert_eq!(config.min_trade_amount(), dec!(250));
    }

    #[test]
    fn test_empty_name_rejected() {
        let config = PlannerConfig {
            name: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::EmptyName));
    }

    #[test]
    fn test_max_depth_bounds() {
        for bad in [0, 11] {
            let config = PlannerConfig {
                max_depth: bad,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ValidationError::OutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_all_calculators_disabled_rejected() {
        let mut config = PlannerConfig::default();
        config.calculators.profit_taking.enabled = false;
        config.calculators.averaging_down.enabled = false;
        config.calculators.opportunity_buys.enabled = false;
        config.calculators.rebalance_sells.enabled = false;
        config.calculators.rebalance_buys.enabled = false;
        config.calculators.weight_based.enabled = false;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::AllModulesDisabled { .. })
        ));
    }

    #[test]
    fn test_both_sides_disabled_rejected() {
        let config = PlannerConfig {
            allow_buy: false,
            allow_sell: false,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::TradingDisabled));
    }

    #[test]
    fn test_min_hold_days_below_cooldown_rejected() {
        let mut config = PlannerConfig::default();
        config.sell_cooldown_days = 60;
        config.calculators.profit_taking.min_hold_days = 30;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::CrossParameter { .. })
        ));
    }

    #[test]
    fn test_averaging_down_threshold_ordering() {
        let mut config = PlannerConfig::default();
        config.calculators.averaging_down.loss_threshold = 0.40;
        config.calculators.averaging_down.max_loss_allowed = 0.35;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::CrossParameter { .. })
        ));
    }

    #[test]
    fn test_enhanced_combinatorial_budget_waste_rejected() {
        let mut config = PlannerConfig::default();
        config.generators.enhanced_combinatorial.max_combinations = 5000;
        config.generators.enhanced_combinatorial.pruning_threshold = 0.95;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::CrossParameter { .. })
        ));
    }

    #[test]
    fn test_unknown_module_name_fails_deserialization() {
        let doc = r#"
            name = "bad"
            [calculators.moon_phase]
            enabled = true
        "#;
        assert!(toml::from_str::<PlannerConfig>(doc).is_err());
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let doc = r#"name = "sparse""#;
        let config: PlannerConfig = toml::from_str(doc).unwrap();
        assert_eq!(config.max_depth, 3);
        assert!(config.calculators.profit_taking.enabled);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_document_round_trip() {
        let config = PlannerConfig::default();
        let doc = toml::to_string(&config).unwrap();
        let parsed: PlannerConfig = toml::from_str(&doc).unwrap();
        assert_eq!(parsed.max_depth, config.max_depth);
        assert_eq!(parsed.evaluation_mode, config.evaluation_mode);
    }
}
