pub mod core_repositories;
pub mod dividend_repository;
pub mod history_repository;
pub mod lock_repository;
pub mod trade_repository;

pub use core_repositories::{
    AllocationRepository, BucketRepository, CashRepository, PositionRepository,
    SecurityRepository, SettingsRepository,
};
pub use dividend_repository::DividendRepository;
pub use history_repository::HistoryRepository;
pub use lock_repository::{LockRepository, LockRow};
pub use trade_repository::TradeRepository;
