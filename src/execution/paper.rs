//! Paper gateway
//!
//! Replays a fixed bar series and fills market orders at the close of the
//! current (forming) bar, charging a flat fee. Used by the backtest runner and
//! by `daytrader run` when no live exchange is wired in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::GatewayError;
use crate::execution::gateway::ExchangeGateway;
use crate::models::{Balance, OrderResult, OrderSide, OrderStatus, PriceBar};

/// Binance spot taker fee
pub const DEFAULT_FEE_RATE: f64 = 0.001;

struct PaperState {
    cursor: usize,
    quote: f64,
    base: f64,
    orders: HashMap<String, OrderResult>,
    next_order_id: u64,
    fees_paid: f64,
}

pub struct PaperGateway {
    bars: Vec<PriceBar>,
    fee_rate: f64,
    state: Mutex<PaperState>,
}

impl PaperGateway {
    /// `start` is the index of the first bar exposed as forming
    pub fn new(bars: Vec<PriceBar>, initial_quote: f64, fee_rate: f64, start: usize) -> Self {
        let cursor = start.min(bars.len().saturating_sub(1));
        Self {
            bars,
            fee_rate,
            state: Mutex::new(PaperState {
                cursor,
                quote: initial_quote,
                base: 0.0,
                orders: HashMap::new(),
                next_order_id: 1,
                fees_paid: 0.0,
            }),
        }
    }

    /// Move to the next bar. Returns false once the series is exhausted.
    pub async fn advance(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.cursor + 1 >= self.bars.len() {
            return false;
        }
        state.cursor += 1;
        true
    }

    /// The bar currently treated as forming
    pub async fn current_bar(&self) -> Option<PriceBar> {
        let state = self.state.lock().await;
        self.bars.get(state.cursor).cloned()
    }

    pub async fn now(&self) -> Option<DateTime<Utc>> {
        self.current_bar().await.map(|bar| bar.timestamp)
    }

    /// Quote balance plus base holdings marked at the current close
    pub async fn equity(&self) -> f64 {
        let state = self.state.lock().await;
        let mark = self.bars.get(state.cursor).map_or(0.0, |bar| bar.close);
        state.quote + state.base * mark
    }

    pub async fn fees_paid(&self) -> f64 {
        self.state.lock().await.fees_paid
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }
}

#[async_trait]
impl ExchangeGateway for PaperGateway {
    async fn fetch_recent_bars(
        &self,
        _pair: &str,
        _timeframe: &str,
        count: usize,
    ) -> Result<Vec<PriceBar>, GatewayError> {
        let state = self.state.lock().await;
        if self.bars.is_empty() {
            return Err(GatewayError::Connectivity("no market data loaded".to_string()));
        }
        let end = state.cursor + 1;
        let start = end.saturating_sub(count);
        Ok(self.bars[start..end].to_vec())
    }

    async fn fetch_balance(&self) -> Result<Balance, GatewayError> {
        let state = self.state.lock().await;
        Ok(Balance {
            quote_free: state.quote,
            base_free: Some(state.base),
        })
    }

    async fn place_market_order(
        &self,
        side: OrderSide,
        quantity: f64,
        client_order_id: &str,
    ) -> Result<OrderResult, GatewayError> {
        if !(quantity > 0.0 && quantity.is_finite()) {
            return Err(GatewayError::Rejected(format!("invalid quantity {}", quantity)));
        }

        let mut state = self.state.lock().await;
        if let Some(existing) = state.orders.get(client_order_id) {
            // Same client id twice is the same order
            return Ok(existing.clone());
        }

        let price = self
            .bars
            .get(state.cursor)
            .map(|bar| bar.close)
            .ok_or_else(|| GatewayError::Connectivity("no market data loaded".to_string()))?;
        let notional = price * quantity;
        let fee = notional * self.fee_rate;

        match side {
            OrderSide::Buy => {
                if notional + fee > state.quote + 1e-9 {
                    return Err(GatewayError::Rejected(format!(
                        "insufficient quote balance: need {:.2}, have {:.2}",
                        notional + fee,
                        state.quote
                    )));
                }
                state.quote -= notional + fee;
                state.base += quantity;
            }
            OrderSide::Sell => {
                if quantity > state.base + 1e-12 {
                    return Err(GatewayError::Rejected(format!(
                        "insufficient base balance: need {:.8}, have {:.8}",
                        quantity, state.base
                    )));
                }
                state.base = (state.base - quantity).max(0.0);
                state.quote += notional - fee;
            }
        }
        state.fees_paid += fee;

        let order_id = format!("paper-{}", state.next_order_id);
        state.next_order_id += 1;

        let result = OrderResult {
            order_id,
            client_order_id: client_order_id.to_string(),
            side,
            filled_price: price,
            filled_quantity: quantity,
        };
        state
            .orders
            .insert(client_order_id.to_string(), result.clone());

        tracing::debug!(
            "Paper fill {:?} {:.8} @ {:.2} (fee {:.4})",
            side,
            quantity,
            price,
            fee
        );

        Ok(result)
    }

    async fn cancel_order(&self, client_order_id: &str) -> Result<(), GatewayError> {
        // Paper orders fill on placement, so there is never anything to cancel
        let state = self.state.lock().await;
        if state.orders.contains_key(client_order_id) {
            Err(GatewayError::Rejected(format!(
                "order {} already filled",
                client_order_id
            )))
        } else {
            Err(GatewayError::Rejected(format!(
                "unknown order {}",
                client_order_id
            )))
        }
    }

    async fn order_status(&self, client_order_id: &str) -> Result<OrderStatus, GatewayError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .get(client_order_id)
            .cloned()
            .map(OrderStatus::Filled)
            .unwrap_or(OrderStatus::NotFound))
    }
}
