// Trading strategy module
pub mod fusion;
pub mod signals;

use chrono::{DateTime, Utc};

use crate::indicators::IndicatorSnapshot;
use crate::models::Signal;

pub use fusion::SignalFusion;
pub use signals::{ConditionSet, SignalConfig};

/// Exit levels of the open position, fixed at entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitLevels {
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
}

/// Everything a strategy sees in one evaluation cycle
#[derive(Debug, Clone)]
pub struct StrategyInput<'a> {
    /// (previous, current) snapshots, present only on cycles where a new bar
    /// closed
    pub indicators: Option<(&'a IndicatorSnapshot, &'a IndicatorSnapshot)>,
    /// Live price of the pair
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    /// Set while a position is open
    pub position: Option<ExitLevels>,
    pub trading_allowed: bool,
    pub daily_trades: u32,
    pub max_daily_trades: u32,
}

/// Base trait for trading strategies
pub trait Strategy: Send + Sync {
    /// Produce this cycle's signal
    fn evaluate(&self, input: &StrategyInput<'_>) -> Signal;

    /// Get strategy name
    fn name(&self) -> &str;
}
