use crate::domain::types::TradeSide;
use md5::{Digest, Md5};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;

/// Candidate categories emitted by the opportunity calculators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    ProfitTaking,
    AveragingDown,
    OpportunityBuys,
    RebalanceSells,
    RebalanceBuys,
    WeightBased,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::ProfitTaking => "profit_taking",
            Category::AveragingDown => "averaging_down",
            Category::OpportunityBuys => "opportunity_buys",
            Category::RebalanceSells => "rebalance_sells",
            Category::RebalanceBuys => "rebalance_buys",
            Category::WeightBased => "weight_based",
        }
    }
}

/// A single proposed trade. Ephemeral: owned by one planner invocation and
/// never persisted.
#[derive(Debug, Clone)]
pub struct ActionCandidate {
    pub side: TradeSide,
    pub isin: String,
    pub symbol: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub value_eur: Decimal,
    pub currency: String,
    pub priority: f64,
    pub reason: String,
    pub tags: BTreeSet<String>,
}

impl ActionCandidate {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

pub const TAG_WINDFALL: &str = "windfall";
pub const TAG_RELAXED: &str = "relaxed";

#[derive(Serialize)]
struct HashedAction<'a> {
    symbol: &'a str,
    side: &'a str,
    quantity: i64,
}

/// Order-dependent digest of a sequence's (symbol, side, quantity) triples.
/// The JSON encoding preserves field and list order, so reordering actions
/// changes the hash.
pub fn sequence_hash(actions: &[ActionCandidate]) -> String {
    let hashed: Vec<HashedAction<'_>> = actions
        .iter()
        .map(|a| HashedAction {
            symbol: &a.symbol,
            side: a.side.as_str(),
            quantity: a.quantity,
        })
        .collect();
    let json =
        serde_json::to_string(&hashed).expect("a slice of plain string/int fields serializes");
    hex::encode(Md5::digest(json.as_bytes()))
}

/// An ordered list of candidate actions with an aggregate priority and a
/// deterministic hash. Ephemeral like its candidates.
#[derive(Debug, Clone)]
pub struct ActionSequence {
    pub actions: Vec<ActionCandidate>,
    pub priority: f64,
    pub depth: usize,
    pub pattern_type: String,
    pub hash: String,
}

impl ActionSequence {
    pub fn new(pattern_type: &str, actions: Vec<ActionCandidate>) -> Self {
        let priority = if actions.is_empty() {
            0.0
        } else {
            actions.iter().map(|a| a.priority).sum::<f64>() / actions.len() as f64
        };
        let hash = sequence_hash(&actions);
        let depth = actions.len();
        Self {
            actions,
            priority,
            depth,
            pattern_type: pattern_type.to_string(),
            hash,
        }
    }

    /// Stable SELL-before-BUY reorder, so cash raised by sells is available
    /// to later buys during simulation. The hash is regenerated afterwards.
    pub fn sort_sells_first(&mut self) {
        self.actions.sort_by_key(|a| match a.side {
            TradeSide::Sell => 0,
            TradeSide::Buy => 1,
        });
        self.hash = sequence_hash(&self.actions);
    }

    pub fn symbols(&self) -> BTreeSet<&str> {
        self.actions.iter().map(|a| a.symbol.as_str()).collect()
    }

    pub fn isins(&self) -> BTreeSet<&str> {
        self.actions.iter().map(|a| a.isin.as_str()).collect()
    }

    pub fn buys(&self) -> impl Iterator<Item = &ActionCandidate> {
        self.actions.iter().filter(|a| a.side == TradeSide::Buy)
    }

    pub fn sells(&self) -> impl Iterator<Item = &ActionCandidate> {
        self.actions.iter().filter(|a| a.side == TradeSide::Sell)
    }

    pub fn total_buy_value(&self) -> Decimal {
        self.buys().map(|a| a.value_eur).sum()
    }

    pub fn total_sell_value(&self) -> Decimal {
        self.sells().map(|a| a.value_eur).sum()
    }

    /// Count of distinct (symbol, side) pairs, used as the diversity
    /// tiebreaker when two sequences score identically.
    pub fn composition_diversity(&self) -> usize {
        self.actions
            .iter()
            .map(|a| (a.symbol.as_str(), a.side))
            .collect::<BTreeSet<_>>()
            .len()
    }
}
