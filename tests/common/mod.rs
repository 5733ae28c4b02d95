#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use daytrader::error::GatewayError;
use daytrader::execution::{AgentParts, AgentSettings, ExchangeGateway, RetryPolicy, TradingAgent};
use daytrader::models::{
    Balance, OrderResult, OrderSide, OrderStatus, PriceBar, Signal, SignalDirection, SignalReason,
};
use daytrader::strategy::{SignalFusion, Strategy, StrategyInput};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PAIR: &str = "BTC/USDT";

pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0).unwrap()
}

pub fn day(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

pub fn bar(timestamp: DateTime<Utc>, close: f64) -> PriceBar {
    PriceBar {
        timestamp,
        open: close,
        high: close,
        low: close,
        close,
        volume: 10.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub side: OrderSide,
    pub quantity: f64,
    pub client_order_id: String,
}

#[derive(Default)]
struct Script {
    bars: Vec<PriceBar>,
    fetch_errors: VecDeque<GatewayError>,
    balance_errors: VecDeque<GatewayError>,
    order_errors: VecDeque<GatewayError>,
    statuses: VecDeque<OrderStatus>,
    fills: HashMap<String, OrderResult>,
    placed: Vec<PlacedOrder>,
    filled: Vec<PlacedOrder>,
    canceled: Vec<String>,
    quote: f64,
    base: Option<f64>,
}

/// Exchange double driven by queued responses
///
/// Fetches return every bar pushed so far (the last one forming). Orders
/// fill at the forming bar's close unless an error is queued. Status
/// queries pop the queue first, then fall back to the recorded fills.
pub struct ScriptedGateway {
    script: Mutex<Script>,
}

impl ScriptedGateway {
    pub fn new(quote: f64) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                quote,
                ..Script::default()
            }),
        })
    }

    pub fn push_bar(&self, timestamp: DateTime<Utc>, close: f64) {
        self.script.lock().unwrap().bars.push(bar(timestamp, close));
    }

    pub fn push_raw_bar(&self, bar: PriceBar) {
        self.script.lock().unwrap().bars.push(bar);
    }

    pub fn fail_fetch(&self, error: GatewayError, times: usize) {
        let mut script = self.script.lock().unwrap();
        for _ in 0..times {
            script.fetch_errors.push_back(error.clone());
        }
    }

    pub fn fail_balance(&self, error: GatewayError) {
        self.script.lock().unwrap().balance_errors.push_back(error);
    }

    pub fn fail_next_order(&self, error: GatewayError) {
        self.script.lock().unwrap().order_errors.push_back(error);
    }

    pub fn queue_status(&self, status: OrderStatus) {
        self.script.lock().unwrap().statuses.push_back(status);
    }

    pub fn set_base_balance(&self, base: Option<f64>) {
        self.script.lock().unwrap().base = base;
    }

    /// Every order sent, including the ones that failed
    pub fn placed(&self) -> Vec<PlacedOrder> {
        self.script.lock().unwrap().placed.clone()
    }

    /// Orders that filled, in order
    pub fn filled(&self) -> Vec<PlacedOrder> {
        self.script.lock().unwrap().filled.clone()
    }

    /// Client order ids of every cancel request
    pub fn canceled(&self) -> Vec<String> {
        self.script.lock().unwrap().canceled.clone()
    }

    fn forming_close(script: &Script) -> Result<f64, GatewayError> {
        script
            .bars
            .last()
            .map(|b| b.close)
            .ok_or_else(|| GatewayError::Connectivity("no bars".to_string()))
    }
}

#[async_trait]
impl ExchangeGateway for ScriptedGateway {
    async fn fetch_recent_bars(
        &self,
        _pair: &str,
        _timeframe: &str,
        count: usize,
    ) -> Result<Vec<PriceBar>, GatewayError> {
        let mut script = self.script.lock().unwrap();
        if let Some(error) = script.fetch_errors.pop_front() {
            return Err(error);
        }
        let start = script.bars.len().saturating_sub(count);
        Ok(script.bars[start..].to_vec())
    }

    async fn fetch_balance(&self) -> Result<Balance, GatewayError> {
        let mut script = self.script.lock().unwrap();
        if let Some(error) = script.balance_errors.pop_front() {
            return Err(error);
        }
        Ok(Balance {
            quote_free: script.quote,
            base_free: script.base,
        })
    }

    async fn place_market_order(
        &self,
        side: OrderSide,
        quantity: f64,
        client_order_id: &str,
    ) -> Result<OrderResult, GatewayError> {
        let mut script = self.script.lock().unwrap();
        let order = PlacedOrder {
            side,
            quantity,
            client_order_id: client_order_id.to_string(),
        };
        script.placed.push(order.clone());
        if let Some(error) = script.order_errors.pop_front() {
            return Err(error);
        }
        script.filled.push(order);

        let price = Self::forming_close(&script)?;
        let fill = OrderResult {
            order_id: format!("ex-{}", script.placed.len()),
            client_order_id: client_order_id.to_string(),
            side,
            filled_price: price,
            filled_quantity: quantity,
        };
        script
            .fills
            .insert(client_order_id.to_string(), fill.clone());
        Ok(fill)
    }

    async fn cancel_order(&self, client_order_id: &str) -> Result<(), GatewayError> {
        self.script
            .lock()
            .unwrap()
            .canceled
            .push(client_order_id.to_string());
        Ok(())
    }

    async fn order_status(&self, client_order_id: &str) -> Result<OrderStatus, GatewayError> {
        let mut script = self.script.lock().unwrap();
        if let Some(status) = script.statuses.pop_front() {
            return Ok(status);
        }
        Ok(script
            .fills
            .get(client_order_id)
            .cloned()
            .map(OrderStatus::Filled)
            .unwrap_or(OrderStatus::NotFound))
    }
}

/// Buys whenever flat and the session is open; price exits as usual.
/// The daily cap is left to the executor.
pub struct EagerStrategy {
    exits: SignalFusion,
}

impl EagerStrategy {
    pub fn new() -> Self {
        Self {
            exits: SignalFusion::default(),
        }
    }
}

impl Strategy for EagerStrategy {
    fn evaluate(&self, input: &StrategyInput<'_>) -> Signal {
        if input.position.is_some() {
            return self.exits.evaluate(input);
        }
        if !input.trading_allowed {
            return Signal::hold(0, input.timestamp);
        }
        Signal {
            direction: SignalDirection::Buy,
            matched_condition_count: 4,
            reason: SignalReason::Technical,
            timestamp: input.timestamp,
        }
    }

    fn name(&self) -> &str {
        "eager"
    }
}

pub fn parts() -> AgentParts {
    AgentParts {
        settings: AgentSettings {
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
            },
            max_reconcile_attempts: 3,
            ..AgentSettings::default()
        },
        ..AgentParts::default()
    }
}

pub type TestAgent = TradingAgent<Arc<ScriptedGateway>, EagerStrategy>;

pub type FusionAgent = TradingAgent<Arc<ScriptedGateway>>;

pub fn agent(gateway: &Arc<ScriptedGateway>, parts: AgentParts, now: DateTime<Utc>) -> TestAgent {
    TradingAgent::with_strategy(Arc::clone(gateway), EagerStrategy::new(), parts, now)
}

/// Agent running the indicator-fusion strategy
pub fn fusion_agent(
    gateway: &Arc<ScriptedGateway>,
    parts: AgentParts,
    now: DateTime<Utc>,
) -> FusionAgent {
    TradingAgent::new(Arc::clone(gateway), parts, now)
}
