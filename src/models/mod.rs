use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// OHLCV bar for the traded pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Reject bars an exchange should never have produced
    pub fn validate(&self) -> Result<(), DataError> {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(self.malformed("non-finite value"));
        }
        if self.close <= 0.0 || self.open <= 0.0 || self.low <= 0.0 {
            return Err(self.malformed("non-positive price"));
        }
        if self.volume < 0.0 {
            return Err(self.malformed("negative volume"));
        }
        if self.high < self.low {
            return Err(self.malformed("high below low"));
        }
        if self.close > self.high || self.close < self.low {
            return Err(self.malformed("close outside high/low range"));
        }
        Ok(())
    }

    fn malformed(&self, reason: &str) -> DataError {
        DataError::MalformedBar {
            timestamp: self.timestamp,
            reason: reason.to_string(),
        }
    }
}

/// Trading signal direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SignalDirection {
    Buy,
    Sell,
    Hold,
}

/// What produced a signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SignalReason {
    /// Enough indicator conditions matched
    Technical,
    TakeProfit,
    StopLoss,
    /// Nothing fired (HOLD) or a BUY was gated off
    None,
}

/// Output of one evaluation cycle. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub direction: SignalDirection,
    pub matched_condition_count: u8,
    pub reason: SignalReason,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    pub fn hold(matched_condition_count: u8, timestamp: DateTime<Utc>) -> Self {
        Self {
            direction: SignalDirection::Hold,
            matched_condition_count,
            reason: SignalReason::None,
            timestamp,
        }
    }

    pub fn is_buy(&self) -> bool {
        self.direction == SignalDirection::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.direction == SignalDirection::Sell
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Fill confirmation returned by the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderResult {
    pub order_id: String,
    pub client_order_id: String,
    pub side: OrderSide,
    pub filled_price: f64,
    pub filled_quantity: f64,
}

/// Exchange-side view of an order, used for reconciliation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OrderStatus {
    Filled(OrderResult),
    /// Accepted but not yet filled
    Pending,
    Rejected,
    Canceled,
    /// The exchange has never seen this client order id
    NotFound,
}

/// Free balances on the account
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Balance {
    /// Quote currency available for entries (e.g. USDT)
    pub quote_free: f64,
    /// Base currency held, when the gateway reports it (e.g. BTC)
    pub base_free: Option<f64>,
}
