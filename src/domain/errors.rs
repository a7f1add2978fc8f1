use thiserror::Error;

/// Precondition failures: bad arguments, invalid configuration, unknown keys.
///
/// Surfaced to the caller and never logged as severe.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("configuration name must not be empty")]
    EmptyName,

    #[error("{param} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        param: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("unknown module: {name}")]
    UnknownModule { name: String },

    #[error("all {kind} modules are disabled; at least one must be enabled")]
    AllModulesDisabled { kind: String },

    #[error("both allow_buy and allow_sell are disabled")]
    TradingDisabled,

    #[error("invalid parameter combination: {reason}")]
    CrossParameter { reason: String },

    #[error("unknown setting key: {key}")]
    UnknownSetting { key: String },

    #[error("invalid trading mode: {mode}")]
    InvalidTradingMode { mode: String },

    #[error("{reason}")]
    Invalid { reason: String },
}

/// Store-level failures discovered by I/O or the health job.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("integrity check failed for store {store}: {detail}")]
    IntegrityCheckFailed { store: String, detail: String },

    #[error("store {store} unavailable: {reason}")]
    Unavailable { store: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Core,
    Ledger,
    Dividends,
    Snapshots,
    Locks,
    SymbolHistory,
}

impl StoreKind {
    /// Per-symbol history stores are rebuilt from upstream data and may be
    /// deleted when corrupt. Every other store is fatal when corrupt.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreKind::SymbolHistory)
    }
}

/// Failures inside a single planner invocation.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    #[error("planner deadline expired before any sequence was scored")]
    DeadlineExpired,

    #[error("planner invocation cancelled")]
    Cancelled,
}

/// Lock acquisition outcomes. `AlreadyHeld` is ordinary control flow for
/// periodic jobs (the job skips its tick), not an error to escalate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LockError {
    #[error("lock {name} already held by {owner}")]
    AlreadyHeld { name: String, owner: String },
}
