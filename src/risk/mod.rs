// Risk management module
pub mod circuit_breakers;
pub mod sizer;

pub use circuit_breakers::{CircuitBreakerTrip, CircuitBreakers, TradingState};
pub use sizer::{RiskConfig, RiskSizer};
