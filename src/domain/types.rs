use crate::domain::errors::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Side of a trade or candidate action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TradeSide {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

impl std::str::FromStr for TradeSide {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(TradeSide::Buy),
            "SELL" => Ok(TradeSide::Sell),
            other => Err(ValidationError::Invalid {
                reason: format!("invalid trade side: {}", other),
            }),
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tradable security. ISIN is the primary identity; `symbol` is a display
/// alias kept for the brokerage boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub isin: String,
    pub symbol: String,
    pub name: String,
    pub currency: String,
    pub country: String,
    pub industry: String,
    pub exchange: String,
    pub active: bool,
    pub allow_buy: bool,
    pub allow_sell: bool,
    pub min_weight_target: Option<Decimal>,
    pub max_weight_target: Option<Decimal>,
}

impl Security {
    /// Securities are never deleted; discovery creates them and retirement
    /// flips `active` off.
    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// A held position. quantity = 0 is represented by the absence of the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub isin: String,
    pub quantity: i64,
    pub average_cost: Decimal,
    pub currency: String,
    pub current_price: Decimal,
    pub market_value_eur: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl Position {
    pub fn unrealized_gain_fraction(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        if self.average_cost.is_zero() {
            return 0.0;
        }
        let gain = (self.current_price - self.average_cost) / self.average_cost;
        gain.to_f64().unwrap_or(0.0)
    }
}

/// Append-only ledger entry. Immutable once inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Option<i64>,
    pub isin: String,
    pub side: TradeSide,
    pub quantity: i64,
    pub price: Decimal,
    pub fees: Decimal,
    pub currency: String,
    pub executed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Per-currency cash amounts. Negative amounts are abnormal and trigger the
/// emergency-rebalance path in the sync cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CashBalances {
    pub amounts: HashMap<String, Decimal>,
}

impl CashBalances {
    pub fn get(&self, currency: &str) -> Decimal {
        self.amounts.get(currency).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn set(&mut self, currency: &str, amount: Decimal) {
        self.amounts.insert(currency.to_string(), amount);
    }

    pub fn negative_currencies(&self) -> Vec<(String, Decimal)> {
        let mut out: Vec<(String, Decimal)> = self
            .amounts
            .iter()
            .filter(|(_, amount)| amount.is_sign_negative() && !amount.is_zero())
            .map(|(ccy, amount)| (ccy.clone(), *amount))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

/// Dividend record, at most one per brokerage cash-flow id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dividend {
    pub id: Option<i64>,
    pub isin: String,
    pub cash_flow_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub amount_eur: Decimal,
    pub payment_date: NaiveDate,
    pub reinvested: bool,
    pub reinvested_at: Option<DateTime<Utc>>,
    pub reinvested_quantity: Option<i64>,
    pub pending_bonus: Decimal,
    pub bonus_cleared: bool,
}

impl Dividend {
    /// Transition `reinvested=false` to `reinvested=true`. Happens exactly
    /// once; afterwards the pending bonus is spent.
    pub fn mark_reinvested(
        &mut self,
        quantity: i64,
        at: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        if self.reinvested {
            return Err(ValidationError::Invalid {
                reason: format!("dividend for {} already reinvested", self.isin),
            });
        }
        if quantity <= 0 {
            return Err(ValidationError::Invalid {
                reason: "reinvested quantity must be positive".to_string(),
            });
        }
        self.reinvested = true;
        self.reinvested_at = Some(at);
        self.reinvested_quantity = Some(quantity);
        self.pending_bonus = Decimal::ZERO;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationKind {
    CountryGroup,
    IndustryGroup,
}

impl AllocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationKind::CountryGroup => "country_group",
            AllocationKind::IndustryGroup => "industry_group",
        }
    }
}

impl std::str::FromStr for AllocationKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "country_group" => Ok(AllocationKind::CountryGroup),
            "industry_group" => Ok(AllocationKind::IndustryGroup),
            other => Err(ValidationError::Invalid {
                reason: format!("invalid allocation kind: {}", other),
            }),
        }
    }
}

/// Target weight for a country or industry group, as a fraction of portfolio
/// value in [-1, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationTarget {
    pub kind: AllocationKind,
    pub name: String,
    pub target_pct: f64,
}

impl AllocationTarget {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if !(-1.0..=1.0).contains(&self.target_pct) {
            return Err(ValidationError::OutOfRange {
                param: format!("allocation target {}", self.name),
                value: self.target_pct,
                min: -1.0,
                max: 1.0,
            });
        }
        Ok(())
    }
}

/// Marker persisted for a group that exists but has no members, so "empty"
/// and "absent" stay distinguishable across a round-trip.
pub const EMPTY_GROUP_MARKER: &str = "__empty__";

/// Named groups of countries or industries used by allocation targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Grouping {
    pub groups: BTreeMap<String, BTreeSet<String>>,
}

impl Grouping {
    pub fn members(&self, group: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(group)
    }

    /// Group containing `member`, if any. Membership is unique by convention;
    /// the first matching group in name order wins otherwise.
    pub fn group_of(&self, member: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, members)| members.contains(member))
            .map(|(name, _)| name.as_str())
    }

    /// Serialized member list for persistence: empty groups map to the
    /// reserved marker.
    pub fn persisted_members(&self, group: &str) -> Option<Vec<String>> {
        self.groups.get(group).map(|members| {
            if members.is_empty() {
                vec![EMPTY_GROUP_MARKER.to_string()]
            } else {
                members.iter().cloned().collect()
            }
        })
    }

    pub fn from_persisted(rows: Vec<(String, String)>) -> Self {
        let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (group, member) in rows {
            let entry = groups.entry(group).or_default();
            if member != EMPTY_GROUP_MARKER {
                entry.insert(member);
            }
        }
        Self { groups }
    }
}

/// Pending (placed, not yet executed) order considered hypothetically by the
/// cache-key builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    pub isin: String,
    pub side: TradeSide,
    pub quantity: i64,
    pub price: Decimal,
}
