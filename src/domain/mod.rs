//! Core domain types and logic.

pub mod ohlcv;
pub mod position;
pub mod ledger;
pub mod volatility;
pub mod prediction;
pub mod indicator;
pub mod fund;
pub mod strategy;
pub mod params;
pub mod execution;
pub mod trade_log;
pub mod trader;
pub mod metrics;
pub mod config_validation;
pub mod error;
