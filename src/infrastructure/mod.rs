pub mod brokerage;
pub mod display;
pub mod mock;
pub mod persistence;
pub mod quotes;
