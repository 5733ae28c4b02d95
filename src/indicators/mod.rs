// Technical indicators module
// EMA, RSI, MACD and Bollinger Bands, each as a streaming accumulator plus a
// from-scratch function over a price slice

pub mod bollinger;
pub mod engine;
pub mod macd;
pub mod moving_average;
pub mod rsi;

pub use bollinger::{calculate_bollinger, Bollinger, BollingerValue};
pub use engine::{compute_snapshot, IndicatorConfig, IndicatorEngine, IndicatorSnapshot};
pub use macd::{calculate_macd, Macd, MacdValue};
pub use moving_average::{calculate_ema, calculate_ema_series, calculate_sma, Ema};
pub use rsi::{calculate_rsi, Rsi};
