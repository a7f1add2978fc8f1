use crate::domain::errors::ValidationError;
use std::collections::HashMap;

/// A registered setting: key, default value, and whether the value is
/// free-form text (string-typed) rather than a parseable scalar.
#[derive(Debug, Clone, Copy)]
pub struct SettingSpec {
    pub key: &'static str,
    pub default: &'static str,
    pub is_string: bool,
}

/// Static registry of every known setting and its default. Missing keys
/// resolve to these defaults; unknown keys are a precondition error.
pub const REGISTRY: &[SettingSpec] = &[
    SettingSpec { key: "trading.mode", default: "observe", is_string: true },
    SettingSpec { key: "trading.allow_buy", default: "true", is_string: false },
    SettingSpec { key: "trading.allow_sell", default: "true", is_string: false },
    SettingSpec { key: "trading.sell_cooldown_days", default: "30", is_string: false },
    SettingSpec { key: "trading.buy_cooldown_days", default: "7", is_string: false },
    SettingSpec { key: "costs.transaction_fixed_eur", default: "2.00", is_string: false },
    SettingSpec { key: "costs.transaction_percent", default: "0.002", is_string: false },
    SettingSpec { key: "costs.max_cost_ratio", default: "0.01", is_string: false },
    SettingSpec { key: "planner.evaluation_mode", default: "single", is_string: true },
    SettingSpec { key: "planner.timeout_seconds", default: "60", is_string: false },
    SettingSpec { key: "planner.max_depth", default: "3", is_string: false },
    SettingSpec { key: "scoring.min_opportunity_score", default: "0.55", is_string: false },
    SettingSpec { key: "sync.interval_minutes", default: "5", is_string: false },
    SettingSpec { key: "locks.stuck_after_minutes", default: "60", is_string: false },
    SettingSpec { key: "buckets.drawdown_hibernate_pct", default: "0.35", is_string: false },
    SettingSpec { key: "broker.api_key", default: "", is_string: true },
    SettingSpec { key: "broker.api_secret", default: "", is_string: true },
];

/// Keys whose values feed into recommendations; the settings component of the
/// plan cache key is built from exactly this whitelist.
pub const RECOMMENDATION_KEYS: &[&str] = &[
    "trading.allow_buy",
    "trading.allow_sell",
    "trading.sell_cooldown_days",
    "trading.buy_cooldown_days",
    "costs.transaction_fixed_eur",
    "costs.transaction_percent",
    "costs.max_cost_ratio",
    "planner.evaluation_mode",
    "planner.max_depth",
    "scoring.min_opportunity_score",
];

pub fn spec_for(key: &str) -> Option<&'static SettingSpec> {
    REGISTRY.iter().find(|spec| spec.key == key)
}

/// Key/value settings view over the persisted store, with registry-backed
/// defaults and typed accessors.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub fn from_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Result<String, ValidationError> {
        let spec = spec_for(key).ok_or_else(|| ValidationError::UnknownSetting {
            key: key.to_string(),
        })?;
        Ok(self
            .values
            .get(key)
            .cloned()
            .unwrap_or_else(|| spec.default.to_string()))
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ValidationError> {
        if spec_for(key).is_none() {
            return Err(ValidationError::UnknownSetting {
                key: key.to_string(),
            });
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ValidationError> {
        let raw = self.get(key)?;
        match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(ValidationError::Invalid {
                reason: format!("setting {} is not a boolean: {}", key, other),
            }),
        }
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, ValidationError> {
        let raw = self.get(key)?;
        raw.parse::<f64>().map_err(|_| ValidationError::Invalid {
            reason: format!("setting {} is not numeric: {}", key, raw),
        })
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, ValidationError> {
        let raw = self.get(key)?;
        raw.parse::<i64>().map_err(|_| ValidationError::Invalid {
            reason: format!("setting {} is not an integer: {}", key, raw),
        })
    }

    /// Deterministic stringification of the recommendation whitelist for the
    /// settings hash. Keys the store never saw stringify to the empty string
    /// so a later explicit write (even to the default value) changes the hash
    /// input only when the stored value actually changes.
    pub fn recommendation_values(&self) -> Vec<(String, String)> {
        RECOMMENDATION_KEYS
            .iter()
            .map(|key| {
                let value = self.values.get(*key).cloned().unwrap_or_default();
                (key.to_string(), value)
            })
            .collect()
    }
}

/// Brokerage credential provisioning state. The `partial -> set` edge fires
/// exactly once per process and triggers the first full synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsState {
    Unset,
    Partial,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsEvent {
    BecameSet,
}

#[derive(Debug, Default)]
pub struct CredentialsTracker {
    has_key: bool,
    has_secret: bool,
    announced: bool,
}

impl CredentialsTracker {
    pub fn new(has_key: bool, has_secret: bool) -> Self {
        Self {
            has_key,
            has_secret,
            // Credentials already complete at startup do not re-trigger
            // onboarding.
            announced: has_key && has_secret,
        }
    }

    pub fn state(&self) -> CredentialsState {
        match (self.has_key, self.has_secret) {
            (false, false) => CredentialsState::Unset,
            (true, true) => CredentialsState::Set,
            _ => CredentialsState::Partial,
        }
    }

    /// Record a credential write. Returns `BecameSet` on the transition into
    /// the fully-provisioned state, once.
    pub fn record_update(&mut self, key_set: bool, secret_set: bool) -> Option<CredentialsEvent> {
        if key_set {
            self.has_key = true;
        }
        if secret_set {
            self.has_secret = true;
        }
        if self.state() == CredentialsState::Set && !self.announced {
            self.announced = true;
            return Some(CredentialsEvent::BecameSet);
        }
        None
    }
}
