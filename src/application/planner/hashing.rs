//! Deterministic cache keys for recommendations.
//!
//! Three independent 8-hex-char components joined as
//! `portfolio:settings:allocations`. Each component is a truncated MD5 of a
//! canonical string built so logically equal inputs are bytewise equal:
//! canonicalization sorts rows, fixes number formats, and enumerates every
//! input that can influence a plan. Nothing else invalidates the cache.

use crate::application::planner::context::PlanningContext;
use crate::domain::settings::Settings;
use crate::domain::types::{AllocationTarget, TradeSide};
use md5::{Digest, Md5};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Distinguished component for an empty allocation set.
const EMPTY_ALLOCATIONS: &str = "00000000";

fn truncated_md5(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))[..8].to_string()
}

/// Canonical portfolio component.
///
/// Includes every security in the active universe (quantity zero when not
/// held, so a new listing invalidates the cache even with no exposure),
/// pending orders applied hypothetically, and positive per-currency cash
/// balances as `CASH.<CCY>` pseudo-rows.
pub fn portfolio_hash(ctx: &PlanningContext) -> String {
    let mut quantities: HashMap<&str, i64> = HashMap::new();
    for (isin, position) in &ctx.positions {
        quantities.insert(isin.as_str(), position.quantity);
    }

    // Hypothetical application of pending orders. A pending BUY consumes
    // cash and adds exposure; a pending SELL only sheds exposure. Cash is
    // allowed to go negative here, which simply drops its pseudo-row.
    let mut cash_eur = ctx.cash.get("EUR");
    for order in &ctx.pending_orders {
        let entry = quantities.entry(order.isin.as_str()).or_insert(0);
        match order.side {
            TradeSide::Buy => {
                *entry += order.quantity;
                cash_eur -= Decimal::from(order.quantity) * order.price;
            }
            TradeSide::Sell => {
                *entry -= order.quantity;
            }
        }
    }

    let mut rows: Vec<String> = Vec::with_capacity(ctx.securities.len() + ctx.cash.amounts.len());
    for (isin, security) in &ctx.securities {
        if !security.active {
            continue;
        }
        let quantity = quantities.get(isin.as_str()).copied().unwrap_or(0);
        let min_target = security
            .min_weight_target
            .map(|t| t.to_string())
            .unwrap_or_default();
        let max_target = security
            .max_weight_target
            .map(|t| t.to_string())
            .unwrap_or_default();
        rows.push(format!(
            "{}:{}:{}:{}:{}:{}:{}:{}",
            security.symbol,
            quantity,
            security.allow_buy,
            security.allow_sell,
            min_target,
            max_target,
            security.country,
            security.industry
        ));
    }

    for (currency, amount) in &ctx.cash.amounts {
        let amount = if currency == "EUR" { cash_eur } else { *amount };
        if amount > Decimal::ZERO {
            rows.push(format!("CASH.{}:{:.2}", currency, amount));
        }
    }

    rows.sort_unstable();
    truncated_md5(&rows.join("\n"))
}

/// Canonical settings component over the recommendation whitelist. Keys the
/// store has never seen stringify to the empty string.
pub fn settings_hash(settings: &Settings) -> String {
    let rows: Vec<String> = settings
        .recommendation_values()
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    truncated_md5(&rows.join("\n"))
}

/// Canonical allocations component: sorted `kind:name:value` rows with the
/// value at four decimal places. An empty set yields a distinguished
/// constant instead of hashing an empty string.
pub fn allocations_hash(allocations: &[AllocationTarget]) -> String {
    if allocations.is_empty() {
        return EMPTY_ALLOCATIONS.to_string();
    }
    let mut rows: Vec<String> = allocations
        .iter()
        .map(|a| format!("{}:{}:{:.4}", a.kind.as_str(), a.name, a.target_pct))
        .collect();
    rows.sort_unstable();
    truncated_md5(&rows.join("\n"))
}

/// The 26-character composite recommendation cache key.
pub fn cache_key(ctx: &PlanningContext) -> String {
    format!(
        "{}:{}:{}",
        portfolio_hash(ctx),
        settings_hash(&ctx.settings),
        allocations_hash(&ctx.allocations)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{AllocationKind, Position, Security};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn security(isin: &str, symbol: &str) -> Security {
        Security {
            isin: isin.to_string(),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            currency: "EUR".to_string(),
            country: "DE".to_string(),
            industry: "Tech".to_string(),
            exchange: "XETRA".to_string(),
            active: true,
            allow_buy: true,
            allow_sell: true,
            min_weight_target: None,
            max_weight_target: None,
        }
    }

    fn position(isin: &str, quantity: i64) -> Position {
        Position {
            isin: isin.to_string(),
            quantity,
            average_cost: dec!(10),
            currency: "EUR".to_string(),
            current_price: dec!(12),
            market_value_eur: Decimal::from(quantity) * dec!(12),
            last_updated: Utc::now(),
        }
    }

    fn base_context() -> PlanningContext {
        let mut ctx = PlanningContext::default();
        ctx.securities
            .insert("DE0001".to_string(), security("DE0001", "SAP"));
        ctx.securities
            .insert("DE0002".to_string(), security("DE0002", "BMW"));
        ctx.positions.insert("DE0001".to_string(), position("DE0001", 10));
        ctx.cash.set("EUR", dec!(1000.00));
        ctx
    }

    #[test]
    fn test_key_is_deterministic() {
        let ctx = base_context();
        assert_eq!(cache_key(&ctx), cache_key(&ctx));
        assert_eq!(cache_key(&ctx).len(), 26);
    }

    #[test]
    fn test_cash_change_changes_portfolio_hash() {
        let a = base_context();
        let mut b = base_context();
        b.cash.set("EUR", dec!(2000.00));
        assert_ne!(portfolio_hash(&a), portfolio_hash(&b));
    }

    #[test]
    fn test_quantity_change_changes_portfolio_hash() {
        let a = base_context();
        let mut b = base_context();
        b.positions.insert("DE0001".to_string(), position("DE0001", 20));
        assert_ne!(portfolio_hash(&a), portfolio_hash(&b));
    }

    #[test]
    fn test_new_zero_quantity_security_changes_hash() {
        let a = base_context();
        let mut b = base_context();
        b.securities
            .insert("NL0003".to_string(), security("NL0003", "ASML"));
        assert_ne!(portfolio_hash(&a), portfolio_hash(&b));
    }

    #[test]
    fn test_inactive_security_is_excluded() {
        let a = base_context();
        let mut b = base_context();
        let mut retired = security("NL0003", "ASML");
        retired.active = false;
        b.securities.insert("NL0003".to_string(), retired);
        assert_eq!(portfolio_hash(&a), portfolio_hash(&b));
    }

    #[test]
    fn test_pending_buy_adjusts_hash() {
        let a = base_context();
        let mut b = base_context();
        b.pending_orders.push(crate::domain::types::PendingOrder {
            isin: "DE0002".to_string(),
            side: TradeSide::Buy,
            quantity: 5,
            price: dec!(50),
        });
        assert_ne!(portfolio_hash(&a), portfolio_hash(&b));
    }

    #[test]
    fn test_settings_hash_tracks_whitelisted_keys_only() {
        let mut a = Settings::default();
        let mut b = Settings::default();
        assert_eq!(settings_hash(&a), settings_hash(&b));

        b.set("planner.max_depth", "5").unwrap();
        assert_ne!(settings_hash(&a), settings_hash(&b));

        // A non-whitelisted key does not move the hash.
        a.set("locks.stuck_after_minutes", "120").unwrap();
        let mut c = Settings::default();
        c.set("planner.max_depth", "5").unwrap();
        assert_eq!(settings_hash(&b), settings_hash(&c));
    }

    #[test]
    fn test_allocations_hash_sorted_and_empty_constant() {
        let x = AllocationTarget {
            kind: AllocationKind::CountryGroup,
            name: "dach".to_string(),
            target_pct: 0.25,
        };
        let y = AllocationTarget {
            kind: AllocationKind::IndustryGroup,
            name: "tech".to_string(),
            target_pct: 0.10,
        };
        assert_eq!(
            allocations_hash(&[x.clone(), y.clone()]),
            allocations_hash(&[y, x])
        );
        assert_eq!(allocations_hash(&[]), EMPTY_ALLOCATIONS);
    }
}
