use chrono::{DateTime, NaiveTime, Utc};
use thiserror::Error;

/// Problems with the market data itself. A cycle that hits one of these is
/// skipped; the loop carries on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("insufficient history: have {have} bars, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("malformed bar at {timestamp}: {reason}")]
    MalformedBar {
        timestamp: DateTime<Utc>,
        reason: String,
    },

    #[error("bar at {got} is not newer than {previous}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        got: DateTime<Utc>,
    },
}

/// Failures reported by an exchange gateway
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("connectivity error: {0}")]
    Connectivity(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("order rejected: {0}")]
    Rejected(String),
}

impl GatewayError {
    /// Transient failures worth another attempt after a backoff
    pub fn is_retriable(&self) -> bool {
        matches!(self, GatewayError::Connectivity(_))
    }

    /// Failures that must halt trading
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::Auth(_))
    }
}

/// Reasons a candidate entry is refused by the risk sizer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    #[error("stop-loss price equals entry price ({price})")]
    ZeroStopDistance { price: f64 },

    #[error("balance must be positive, got {balance}")]
    NonPositiveBalance { balance: f64 },

    #[error("quantity {quantity} exceeds exchange maximum {max}")]
    QuantityAboveMax { quantity: f64, max: f64 },

    #[error("order notional {notional:.2} below minimum {min:.2}")]
    BelowMinNotional { notional: f64, min: f64 },
}

/// An unusable trading window
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("session start {start} must be before end {end}")]
    InvertedWindow { start: NaiveTime, end: NaiveTime },

    #[error("invalid UTC offset: {0}s")]
    InvalidOffset(i32),
}

/// Top-level error type for the trading agent
#[derive(Debug, Error)]
pub enum TradingError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("invalid risk: {0}")]
    InvalidRisk(#[from] RiskError),

    #[error("could not confirm order {order_id} after {attempts} attempts")]
    Reconciliation { order_id: String, attempts: u32 },

    #[error("invalid position transition: {0}")]
    InvalidTransition(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("config error: {0}")]
    Session(#[from] SessionError),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<config::ConfigError> for TradingError {
    fn from(err: config::ConfigError) -> Self {
        TradingError::Config(err.to_string())
    }
}

impl TradingError {
    /// Errors that stop the polling loop instead of skipping a cycle
    pub fn is_fatal(&self) -> bool {
        match self {
            TradingError::Gateway(e) => e.is_fatal(),
            TradingError::Reconciliation { .. }
            | TradingError::Config(_)
            | TradingError::Session(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_classes() {
        assert!(GatewayError::Connectivity("timeout".into()).is_retriable());
        assert!(!GatewayError::Connectivity("timeout".into()).is_fatal());
        assert!(GatewayError::Auth("bad key".into()).is_fatal());
        assert!(!GatewayError::Rejected("funds".into()).is_retriable());
    }

    #[test]
    fn test_trading_error_fatality() {
        let auth: TradingError = GatewayError::Auth("bad key".into()).into();
        assert!(auth.is_fatal());

        let data: TradingError = DataError::InsufficientHistory { have: 3, need: 50 }.into();
        assert!(!data.is_fatal());
        assert_eq!(
            data.to_string(),
            "insufficient history: have 3 bars, need 50"
        );

        let risk: TradingError = RiskError::ZeroStopDistance { price: 100.0 }.into();
        assert!(!risk.is_fatal());

        let recon = TradingError::Reconciliation {
            order_id: "abc".into(),
            attempts: 5,
        };
        assert!(recon.is_fatal());

        let session: TradingError = SessionError::InvalidOffset(90_000).into();
        assert!(session.is_fatal());
        assert_eq!(session.to_string(), "config error: invalid UTC offset: 90000s");
    }
}
