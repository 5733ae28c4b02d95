// Core modules
pub mod backtest;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod persistence;
pub mod risk;
pub mod session;
pub mod strategy;

// Re-export commonly used types
pub use config::BotConfig;
pub use error::{DataError, GatewayError, RiskError, TradingError};
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, TradingError>;
