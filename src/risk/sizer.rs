use serde::{Deserialize, Serialize};

use crate::error::RiskError;

/// Risk parameters applied to every entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Fraction of the quote balance put at risk per trade (0.02 = 2%)
    pub risk_per_trade: f64,
    pub leverage: f64,
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    /// Exchange cap on order size, in base units
    pub max_order_quantity: Option<f64>,
    /// Exchange floor on order value, in quote units
    pub min_order_notional: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: 0.02,
            leverage: 1.0,
            take_profit_pct: 0.03,
            stop_loss_pct: 0.01,
            max_order_quantity: None,
            min_order_notional: 10.0,
        }
    }
}

impl RiskConfig {
    /// Stop-loss price for a long entered at `entry_price`
    pub fn stop_loss_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 - self.stop_loss_pct)
    }

    /// Take-profit price for a long entered at `entry_price`
    pub fn take_profit_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 + self.take_profit_pct)
    }
}

/// Fixed-fractional position sizing
///
/// quantity = balance * risk_per_trade * leverage / |entry - stop|
#[derive(Debug, Clone, Default)]
pub struct RiskSizer {
    config: RiskConfig,
}

impl RiskSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Size an entry at `entry_price` with the configured stop distance
    pub fn size_entry(&self, balance: f64, entry_price: f64) -> Result<f64, RiskError> {
        let stop = self.config.stop_loss_price(entry_price);
        self.size(balance, entry_price, stop)
    }

    /// Base-currency quantity risking `risk_per_trade` of `balance` between
    /// `entry_price` and `stop_loss_price`
    pub fn size(
        &self,
        balance: f64,
        entry_price: f64,
        stop_loss_price: f64,
    ) -> Result<f64, RiskError> {
        if balance <= 0.0 || !balance.is_finite() {
            return Err(RiskError::NonPositiveBalance { balance });
        }

        let stop_distance = (entry_price - stop_loss_price).abs();
        if stop_distance == 0.0 {
            return Err(RiskError::ZeroStopDistance { price: entry_price });
        }

        let risk_amount = balance * self.config.risk_per_trade * self.config.leverage;
        let quantity = risk_amount / stop_distance;

        if let Some(max) = self.config.max_order_quantity {
            if quantity > max {
                return Err(RiskError::QuantityAboveMax { quantity, max });
            }
        }

        let notional = quantity * entry_price;
        if notional < self.config.min_order_notional {
            return Err(RiskError::BelowMinNotional {
                notional,
                min: self.config.min_order_notional,
            });
        }

        tracing::debug!(
            balance,
            entry_price,
            stop_loss_price,
            risk_amount,
            "Sized entry: {:.8} units",
            quantity
        );

        Ok(quantity)
    }
}
