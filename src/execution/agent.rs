//! Trading agent: one polling cycle at a time against a single position
//!
//! Cycle order:
//! 1. roll the daily counters on a new session day
//! 2. fetch recent bars (connectivity retried with backoff)
//! 3. ingest newly closed bars into the indicator engine; on bad data only
//!    the live price is used and the cycle ends after the exit side
//! 4. reconcile an exit order left in flight
//! 5. with a position: forced exit outside its session, else TP/SL/technical
//! 6. flat: entry on a qualifying BUY, sized from the free balance
//! 7. persist state, journal closed trades

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use crate::config::BotConfig;
use crate::error::{GatewayError, TradingError};
use crate::execution::gateway::{with_retry, ExchangeGateway, RetryPolicy};
use crate::execution::{
    ClosedTrade, ExecutionAction, Executor, ExitReason, PositionManager, PositionStatus, PriceFeed,
};
use crate::indicators::{IndicatorConfig, IndicatorSnapshot};
use crate::models::{Balance, OrderResult, OrderSide, OrderStatus, PriceBar, Signal};
use crate::persistence::{PersistedState, StateStore, TradeJournal};
use crate::risk::{CircuitBreakers, RiskConfig, RiskSizer};
use crate::session::{SessionClock, SessionWindow};
use crate::strategy::{SignalConfig, SignalFusion, Strategy, StrategyInput};
use crate::Result;

/// Closed bars kept in memory for inspection
const RETAINED_BARS: usize = 500;

/// Static settings for the agent loop
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub symbol: String,
    pub timeframe: String,
    /// Bars requested per fetch, forming bar included
    pub history_bars: usize,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    pub max_reconcile_attempts: u32,
    pub flatten_on_shutdown: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            symbol: "BTC/USDT".to_string(),
            timeframe: "15m".to_string(),
            history_bars: 100,
            poll_interval: Duration::from_secs(300),
            retry: RetryPolicy::default(),
            max_reconcile_attempts: 5,
            flatten_on_shutdown: true,
        }
    }
}

impl AgentSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            symbol: config.symbol.clone(),
            timeframe: config.timeframe.clone(),
            history_bars: config.history_bars,
            poll_interval: config.poll_interval(),
            retry: RetryPolicy {
                max_attempts: config.max_fetch_retries,
                base_delay: config.retry_base_delay(),
            },
            max_reconcile_attempts: config.max_reconcile_attempts,
            flatten_on_shutdown: config.flatten_on_shutdown,
        }
    }
}

/// Everything the agent is built from besides the gateway
#[derive(Debug, Clone, Default)]
pub struct AgentParts {
    pub settings: AgentSettings,
    pub risk: RiskConfig,
    pub circuit_breakers: CircuitBreakers,
    pub window: SessionWindow,
    pub signals: SignalConfig,
    pub indicators: IndicatorConfig,
}

impl AgentParts {
    pub fn from_config(config: &BotConfig) -> Result<Self> {
        Ok(Self {
            settings: AgentSettings::from_config(config),
            risk: config.risk_config(),
            circuit_breakers: config.circuit_breakers(),
            window: config.session_window()?,
            signals: config.signal_config(),
            indicators: config.indicator_config(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nothing could be evaluated this cycle
    Skipped(String),
    Held,
    Entered { position_id: Uuid, price: f64 },
    Exited(ClosedTrade),
    /// Exit was attempted but the exchange refused it; still OPEN
    ExitFailed(String),
    /// Exit order still unconfirmed; still CLOSING
    Reconciling,
}

/// What one cycle saw and did
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub price: Option<f64>,
    /// Snapshots of bars that closed since the previous cycle
    pub snapshots: Vec<IndicatorSnapshot>,
    pub signal: Option<Signal>,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            price: None,
            snapshots: Vec::new(),
            signal: None,
            outcome: CycleOutcome::Held,
        }
    }

    fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.outcome = CycleOutcome::Skipped(reason.into());
        self
    }
}

pub struct TradingAgent<G: ExchangeGateway, S: Strategy = SignalFusion> {
    gateway: G,
    strategy: S,
    feed: PriceFeed,
    positions: PositionManager,
    executor: Executor,
    clock: SessionClock,
    settings: AgentSettings,
    journal: Option<TradeJournal>,
    state_store: Option<StateStore>,
}

impl<G: ExchangeGateway> TradingAgent<G, SignalFusion> {
    /// Agent running the indicator-fusion strategy
    pub fn new(gateway: G, parts: AgentParts, now: DateTime<Utc>) -> Self {
        let strategy = SignalFusion::new(parts.signals.clone());
        Self::with_strategy(gateway, strategy, parts, now)
    }
}

impl<G: ExchangeGateway, S: Strategy> TradingAgent<G, S> {
    pub fn with_strategy(gateway: G, strategy: S, parts: AgentParts, now: DateTime<Utc>) -> Self {
        let clock = SessionClock::new(parts.window);
        let positions = PositionManager::new(
            parts.risk.clone(),
            parts.circuit_breakers.clone(),
            clock.session_day(now),
        );

        Self {
            gateway,
            strategy,
            feed: PriceFeed::new(parts.indicators.clone(), RETAINED_BARS),
            positions,
            executor: Executor::new(RiskSizer::new(parts.risk)),
            clock,
            settings: parts.settings,
            journal: None,
            state_store: None,
        }
    }

    /// Attach the trade journal and state store, restoring any saved
    /// position and daily counters
    pub fn with_persistence(mut self, journal: TradeJournal, store: StateStore) -> Result<Self> {
        if let Some(saved) = store.load()? {
            if let Some(ref position) = saved.position {
                tracing::warn!(
                    "Recovering {:?} position {} from a previous run",
                    position.status,
                    position.id
                );
            }
            self.positions = PositionManager::with_position(
                self.positions.risk().clone(),
                self.positions.circuit_breakers().clone(),
                saved.trading_state,
                saved.position,
            );
        }
        self.journal = Some(journal);
        self.state_store = Some(store);
        Ok(self)
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    pub fn feed(&self) -> &PriceFeed {
        &self.feed
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Smoke test before trading: credentials (balance) and market data
    /// (bars). Warms the indicator engine with the fetched history.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!(
            "Starting on {} {} (strategy {})",
            self.settings.symbol,
            self.settings.timeframe,
            self.strategy.name()
        );

        let balance = self.fetch_balance().await.map_err(|e| {
            tracing::error!("Smoke test failed, cannot read balance: {}", e);
            e
        })?;
        tracing::info!(
            "Balance check passed: {:.2} quote free{}",
            balance.quote_free,
            balance
                .base_free
                .map(|b| format!(", {:.8} base", b))
                .unwrap_or_default()
        );

        let bars = self.fetch_bars().await.map_err(|e| {
            tracing::error!("Smoke test failed, cannot fetch market data: {}", e);
            e
        })?;
        let update = self.feed.ingest(&bars)?;
        tracing::info!(
            "Market data check passed: {} bars, live price {:.2}",
            bars.len(),
            update.live_price
        );

        if self.feed.engine().latest().is_err() {
            tracing::warn!(
                "Indicators still warming up ({} of {} bars)",
                self.feed.engine().bars_seen(),
                self.feed.engine().min_history()
            );
        }
        Ok(())
    }

    /// Poll on a fixed interval until `shutdown` flips to true or a fatal
    /// error occurs
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            "Polling every {:?}, session {}-{}",
            self.settings.poll_interval,
            self.clock.window().start,
            self.clock.window().end
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if *shutdown.borrow() {
                break;
            }

            match self.run_cycle(Utc::now()).await {
                Ok(report) => {
                    tracing::debug!("Cycle done: {:?}", report.outcome);
                }
                Err(e) => {
                    tracing::error!("Halting trading loop: {}", e);
                    self.persist_state(Utc::now());
                    return Err(e);
                }
            }
        }

        self.shutdown(Utc::now()).await
    }

    /// One evaluation cycle at `now`
    ///
    /// Non-fatal problems skip the cycle and come back as
    /// [`CycleOutcome::Skipped`]; only auth failures, escalated
    /// reconciliation and broken invariants are returned as errors.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        let mut report = CycleReport::new(now);

        if self.positions.roll_day(self.clock.session_day(now)) {
            self.persist_state(now);
        }

        let bars = match self.fetch_bars().await {
            Ok(bars) => bars,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Skipping cycle, market data unavailable: {}", e);
                return Ok(report.skipped(e.to_string()));
            }
        };

        // Bad closed bars cost the indicators one cycle, never the exits
        let (price, new_bars, data_error) = match self.feed.ingest(&bars) {
            Ok(update) => {
                report.snapshots = update.snapshots;
                (update.live_price, update.new_bars, None)
            }
            Err(e) => match PriceFeed::live_price(&bars) {
                Some(price) => {
                    tracing::warn!("Bad market data ({}), exit checks only this cycle", e);
                    (price, 0, Some(e.to_string()))
                }
                None => {
                    tracing::warn!("Skipping cycle, bad market data: {}", e);
                    return Ok(report.skipped(e.to_string()));
                }
            },
        };
        report.price = Some(price);

        if self.positions.status() == PositionStatus::Closing {
            match self.reconcile_exit(now).await? {
                Some(trade) => {
                    report.outcome = CycleOutcome::Exited(trade);
                    return Ok(report);
                }
                None if self.positions.status() == PositionStatus::Closing => {
                    report.outcome = CycleOutcome::Reconciling;
                    return Ok(report);
                }
                None => {}
            }
        }

        // Indicator conditions only count on the cycle a new bar closed
        let signal = {
            let indicators = if new_bars > 0 {
                self.feed.latest_pair().ok()
            } else {
                None
            };
            let input = StrategyInput {
                indicators,
                price,
                timestamp: now,
                position: self.positions.exit_levels(),
                trading_allowed: self.clock.is_trading_allowed(now),
                daily_trades: self.positions.trading_state().daily_trades,
                max_daily_trades: self.positions.circuit_breakers().max_daily_trades,
            };
            self.strategy.evaluate(&input)
        };
        report.signal = Some(signal.clone());

        if self.positions.status() == PositionStatus::Open {
            let force_flatten = self
                .positions
                .position()
                .map_or(false, |p| self.clock.must_be_flat(p.opened_at, now));
            let decision = self.executor.decide_exit(&self.positions, &signal, force_flatten);
            if let ExecutionAction::Exit { exit_reason } = decision.action {
                tracing::info!("Exiting: {}", decision.reason);
                report.outcome = self.execute_exit(exit_reason, now).await?;
            } else if let Some(reason) = data_error {
                report.outcome = CycleOutcome::Skipped(reason);
            }
            // No entry in a cycle that started with a position
            return Ok(report);
        }

        if let Some(reason) = data_error {
            return Ok(report.skipped(reason));
        }

        if signal.is_buy() {
            report.outcome = self.try_enter(&signal, price, now).await?;
        }

        Ok(report)
    }

    /// Graceful stop: never enters; exits an open position when configured
    /// to, otherwise leaves it persisted for the next start
    pub async fn shutdown(&mut self, now: DateTime<Utc>) -> Result<()> {
        tracing::info!("Shutting down");

        match self.positions.status() {
            PositionStatus::Open if self.settings.flatten_on_shutdown => {
                match self.flatten(ExitReason::Shutdown, now).await? {
                    CycleOutcome::Exited(trade) => {
                        tracing::info!("Flattened on shutdown, PnL {:+.2}", trade.pnl);
                    }
                    other => {
                        tracing::error!(
                            "Could not confirm shutdown exit ({:?}); position left for recovery on next start",
                            other
                        );
                    }
                }
            }
            PositionStatus::Closing => {
                if self.reconcile_exit(now).await?.is_none()
                    && self.positions.status() != PositionStatus::None
                {
                    tracing::error!(
                        "Exit still unconfirmed at shutdown; position left for recovery on next start"
                    );
                }
            }
            PositionStatus::Open => {
                if let Some(p) = self.positions.position() {
                    tracing::warn!(
                        "Leaving position {} OPEN ({:.8} @ {:.2}, SL {:.2}, TP {:.2}) for recovery on next start",
                        p.id,
                        p.quantity,
                        p.entry_price,
                        p.stop_loss_price,
                        p.take_profit_price
                    );
                }
            }
            PositionStatus::None | PositionStatus::Closed => {}
        }

        self.persist_state(now);
        tracing::info!(
            "Stopped. Session PnL {:+.2} over {} closed trades",
            self.positions.total_pnl(),
            self.positions.closed_trades()
        );
        Ok(())
    }

    /// Exit an OPEN position outside the normal cycle. Anything else is a
    /// no-op that reports [`CycleOutcome::Held`].
    pub async fn flatten(&mut self, reason: ExitReason, now: DateTime<Utc>) -> Result<CycleOutcome> {
        if self.positions.status() != PositionStatus::Open {
            return Ok(CycleOutcome::Held);
        }
        self.execute_exit(reason, now).await
    }

    async fn fetch_bars(&self) -> Result<Vec<PriceBar>> {
        let bars = with_retry(&self.settings.retry, "fetch bars", || {
            self.gateway.fetch_recent_bars(
                &self.settings.symbol,
                &self.settings.timeframe,
                self.settings.history_bars,
            )
        })
        .await
        .map_err(log_auth)?;
        Ok(bars)
    }

    async fn fetch_balance(&self) -> Result<Balance> {
        let balance = with_retry(&self.settings.retry, "fetch balance", || {
            self.gateway.fetch_balance()
        })
        .await
        .map_err(log_auth)?;
        Ok(balance)
    }

    async fn try_enter(
        &mut self,
        signal: &Signal,
        price: f64,
        now: DateTime<Utc>,
    ) -> Result<CycleOutcome> {
        let balance = match self.fetch_balance().await {
            Ok(balance) => balance,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Skipping entry, balance unavailable: {}", e);
                return Ok(CycleOutcome::Skipped(e.to_string()));
            }
        };

        let decision = self
            .executor
            .decide_entry(&self.positions, signal, &balance, price);
        let ExecutionAction::Enter { quantity } = decision.action else {
            tracing::info!("Entry skipped: {}", decision.reason);
            return Ok(CycleOutcome::Skipped(decision.reason));
        };
        tracing::info!("Entering: {}", decision.reason);

        let client_order_id = Uuid::new_v4().to_string();
        let fill = match self
            .gateway
            .place_market_order(OrderSide::Buy, quantity, &client_order_id)
            .await
        {
            Ok(fill) => Some(fill),
            Err(GatewayError::Rejected(msg)) => {
                tracing::warn!("Entry order rejected: {}", msg);
                return Ok(CycleOutcome::Skipped(msg));
            }
            Err(e) if e.is_fatal() => return Err(log_auth(e).into()),
            Err(e) => {
                tracing::warn!(
                    "Entry order {} outcome unknown ({}), checking with exchange",
                    client_order_id,
                    e
                );
                self.resolve_order(&client_order_id).await?
            }
        };

        let Some(fill) = fill else {
            return Ok(CycleOutcome::Skipped("entry order did not execute".to_string()));
        };

        let position_id = self
            .positions
            .open_position_at(&self.settings.symbol, &fill, now)?;
        self.persist_state(now);

        Ok(CycleOutcome::Entered {
            position_id,
            price: fill.filled_price,
        })
    }

    /// Look up an order whose placement outcome is unknown, retrying up to
    /// the reconcile limit. `None` means the exchange confirms it never
    /// executed.
    async fn resolve_order(&self, client_order_id: &str) -> Result<Option<OrderResult>> {
        let max_attempts = self.settings.max_reconcile_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self.gateway.order_status(client_order_id).await {
                Ok(OrderStatus::Filled(fill)) => return Ok(Some(fill)),
                Ok(OrderStatus::NotFound | OrderStatus::Rejected | OrderStatus::Canceled) => {
                    return Ok(None)
                }
                Err(e) if e.is_fatal() => return Err(log_auth(e).into()),
                Ok(OrderStatus::Pending) | Err(_) => {
                    let backoff = self.settings.retry.backoff(attempt);
                    tracing::warn!(
                        "Order {} unresolved, re-checking in {:?} (attempt {}/{})",
                        client_order_id,
                        backoff,
                        attempt,
                        max_attempts
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        match self.cancel_unresolved(client_order_id).await? {
            Some(OrderStatus::Filled(fill)) => return Ok(Some(fill)),
            Some(OrderStatus::NotFound | OrderStatus::Rejected | OrderStatus::Canceled) => {
                return Ok(None)
            }
            Some(OrderStatus::Pending) | None => {}
        }

        tracing::error!(
            "Order {} could not be resolved after {} attempts, operator intervention required",
            client_order_id,
            max_attempts
        );
        Err(TradingError::Reconciliation {
            order_id: client_order_id.to_string(),
            attempts: max_attempts,
        })
    }

    /// Cancel an order left unresolved at the reconcile limit, then query it
    /// once more. `None` means its fate is still unknown.
    async fn cancel_unresolved(&self, client_order_id: &str) -> Result<Option<OrderStatus>> {
        match self.gateway.cancel_order(client_order_id).await {
            Ok(()) => tracing::warn!("Cancel sent for unresolved order {}", client_order_id),
            Err(e) if e.is_fatal() => return Err(log_auth(e).into()),
            Err(e) => tracing::warn!("Cancel of order {} failed: {}", client_order_id, e),
        }

        match self.gateway.order_status(client_order_id).await {
            Ok(OrderStatus::Pending) => Ok(None),
            Ok(status) => Ok(Some(status)),
            Err(e) if e.is_fatal() => Err(log_auth(e).into()),
            Err(e) => {
                tracing::warn!("Order {} status after cancel unknown: {}", client_order_id, e);
                Ok(None)
            }
        }
    }

    /// OPEN -> CLOSING -> CLOSED, or back to OPEN when the exchange refuses
    async fn execute_exit(&mut self, reason: ExitReason, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let base_free = match self.fetch_balance().await {
            Ok(balance) => balance.base_free,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Balance unavailable before exit ({}), selling full position", e);
                None
            }
        };
        let quantity = match self.positions.position() {
            Some(position) => Executor::exit_quantity(position, base_free),
            None => return Ok(CycleOutcome::Held),
        };
        let Some(quantity) = quantity else {
            return Ok(CycleOutcome::ExitFailed(
                "no base balance to sell".to_string(),
            ));
        };

        let client_order_id = Uuid::new_v4().to_string();
        self.positions
            .begin_exit(&client_order_id, reason, quantity, now)?;
        // CLOSING is on disk before the order goes out
        self.persist_state(now);

        match self
            .gateway
            .place_market_order(OrderSide::Sell, quantity, &client_order_id)
            .await
        {
            Ok(fill) => {
                let trade = self.finish_exit(&fill, now)?;
                Ok(CycleOutcome::Exited(trade))
            }
            Err(GatewayError::Rejected(msg)) => {
                tracing::error!("Exit order rejected: {}", msg);
                self.positions.abort_exit()?;
                self.persist_state(now);
                Ok(CycleOutcome::ExitFailed(msg))
            }
            Err(e) if e.is_fatal() => Err(log_auth(e).into()),
            Err(e) => {
                tracing::warn!(
                    "Exit order {} outcome unknown ({}), reconciling",
                    client_order_id,
                    e
                );
                match self.reconcile_exit(now).await? {
                    Some(trade) => Ok(CycleOutcome::Exited(trade)),
                    None if self.positions.status() == PositionStatus::Closing => {
                        Ok(CycleOutcome::Reconciling)
                    }
                    None => Ok(CycleOutcome::ExitFailed(e.to_string())),
                }
            }
        }
    }

    /// One status query for the in-flight exit
    ///
    /// Filled closes the position; a definitive "never executed" reopens it;
    /// anything else stays CLOSING and counts towards the escalation limit.
    async fn reconcile_exit(&mut self, now: DateTime<Utc>) -> Result<Option<ClosedTrade>> {
        let Some(pending) = self
            .positions
            .position()
            .and_then(|p| p.pending_exit.clone())
        else {
            return Ok(None);
        };

        let status = with_retry(&self.settings.retry, "order status", || {
            self.gateway.order_status(&pending.client_order_id)
        })
        .await;

        match status {
            Ok(OrderStatus::Filled(fill)) => {
                tracing::info!("Exit order {} confirmed filled", pending.client_order_id);
                self.finish_exit(&fill, now).map(Some)
            }
            Ok(OrderStatus::NotFound | OrderStatus::Rejected | OrderStatus::Canceled) => {
                self.positions.abort_exit()?;
                self.persist_state(now);
                Ok(None)
            }
            Err(e) if e.is_fatal() => Err(log_auth(e).into()),
            Ok(OrderStatus::Pending) | Err(_) => {
                let attempts = self.positions.record_reconcile_attempt()?;
                self.persist_state(now);
                if attempts >= self.settings.max_reconcile_attempts {
                    match self.cancel_unresolved(&pending.client_order_id).await? {
                        Some(OrderStatus::Filled(fill)) => {
                            tracing::info!(
                                "Exit order {} filled before it could be canceled",
                                pending.client_order_id
                            );
                            return self.finish_exit(&fill, now).map(Some);
                        }
                        Some(_) => {
                            self.positions.abort_exit()?;
                            self.persist_state(now);
                            return Ok(None);
                        }
                        None => {}
                    }
                    tracing::error!(
                        "Exit order {} unconfirmed after {} attempts, operator intervention required",
                        pending.client_order_id,
                        attempts
                    );
                    return Err(TradingError::Reconciliation {
                        order_id: pending.client_order_id,
                        attempts,
                    });
                }
                tracing::warn!(
                    "Exit order {} still unconfirmed (attempt {}/{})",
                    pending.client_order_id,
                    attempts,
                    self.settings.max_reconcile_attempts
                );
                Ok(None)
            }
        }
    }

    fn finish_exit(&mut self, fill: &OrderResult, now: DateTime<Utc>) -> Result<ClosedTrade> {
        let trade = self.positions.confirm_exit(fill, now)?;
        if let Some(ref journal) = self.journal {
            if let Err(e) = journal.append(&trade) {
                tracing::error!("Failed to journal trade {}: {}", trade.id, e);
            }
        }
        self.persist_state(now);
        Ok(trade)
    }

    fn persist_state(&self, now: DateTime<Utc>) {
        let Some(ref store) = self.state_store else {
            return;
        };
        let state = PersistedState {
            position: self.positions.position().cloned(),
            trading_state: self.positions.trading_state().clone(),
            saved_at: now,
        };
        if let Err(e) = store.save(&state) {
            tracing::error!("Failed to persist state to {}: {}", store.path().display(), e);
        }
    }
}

fn log_auth(e: GatewayError) -> GatewayError {
    if e.is_fatal() {
        tracing::error!("Exchange rejected credentials: {}", e);
    }
    e
}
