pub mod metrics;
pub mod runner;
pub mod synthetic;

pub use metrics::{BacktestMetrics, EquityPoint, SignalMarker, TradeRecord};
pub use runner::{BacktestReport, BacktestRunner};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
