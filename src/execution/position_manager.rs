use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TradingError;
use crate::models::OrderResult;
use crate::risk::{CircuitBreakerTrip, CircuitBreakers, RiskConfig, TradingState};
use crate::strategy::ExitLevels;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    /// Flat
    None,
    Open,
    /// Exit order sent, fill not yet confirmed
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    SessionEnd,
    Signal, // Bearish indicator fusion
    Shutdown,
}

/// Exit order in flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingExit {
    pub client_order_id: String,
    pub reason: ExitReason,
    pub quantity: f64,
    pub requested_at: DateTime<Utc>,
    /// Status queries made without a definitive answer
    pub reconcile_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub entry_price: f64,
    pub quantity: f64,
    pub stop_loss_price: f64,   // Fixed at entry
    pub take_profit_price: f64, // Fixed at entry
    pub opened_at: DateTime<Utc>,
    pub entry_order_id: String,
    pub status: PositionStatus,
    pub pending_exit: Option<PendingExit>,
}

impl Position {
    pub fn exit_levels(&self) -> ExitLevels {
        ExitLevels {
            stop_loss_price: self.stop_loss_price,
            take_profit_price: self.take_profit_price,
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity
    }
}

/// A position after its exit fill was confirmed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub id: Uuid,
    pub symbol: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub exit_reason: ExitReason,
    pub pnl: f64,
    pub pnl_pct: f64,
}

/// Owner of the single position and the daily counters
///
/// Transitions: NONE -> OPEN (confirmed entry fill), OPEN -> CLOSING (exit
/// order sent), CLOSING -> CLOSED (confirmed exit fill) or CLOSING -> OPEN
/// (exchange confirms no exit happened). CLOSED positions are handed back as
/// a [`ClosedTrade`] and the manager returns to NONE.
pub struct PositionManager {
    position: Option<Position>,
    risk: RiskConfig,
    circuit_breakers: CircuitBreakers,
    trading_state: TradingState,
    total_pnl: f64,
    closed_trades: u32,
}

impl PositionManager {
    pub fn new(risk: RiskConfig, circuit_breakers: CircuitBreakers, session_day: NaiveDate) -> Self {
        Self {
            position: None,
            risk,
            circuit_breakers,
            trading_state: TradingState::new(session_day),
            total_pnl: 0.0,
            closed_trades: 0,
        }
    }

    /// Create PositionManager and restore persisted state
    pub fn with_position(
        risk: RiskConfig,
        circuit_breakers: CircuitBreakers,
        trading_state: TradingState,
        position: Option<Position>,
    ) -> Self {
        if let Some(ref p) = position {
            tracing::info!(
                "Restored {:?} position {} ({:.8} {} @ {:.2}, SL {:.2}, TP {:.2})",
                p.status,
                p.id,
                p.quantity,
                p.symbol,
                p.entry_price,
                p.stop_loss_price,
                p.take_profit_price
            );
        }

        Self {
            position,
            risk,
            circuit_breakers,
            trading_state,
            total_pnl: 0.0,
            closed_trades: 0,
        }
    }

    pub fn status(&self) -> PositionStatus {
        self.position
            .as_ref()
            .map(|p| p.status)
            .unwrap_or(PositionStatus::None)
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Exit levels of the position, while it is OPEN
    pub fn exit_levels(&self) -> Option<ExitLevels> {
        self.position
            .as_ref()
            .filter(|p| p.status == PositionStatus::Open)
            .map(Position::exit_levels)
    }

    pub fn trading_state(&self) -> &TradingState {
        &self.trading_state
    }

    pub fn circuit_breakers(&self) -> &CircuitBreakers {
        &self.circuit_breakers
    }

    pub fn risk(&self) -> &RiskConfig {
        &self.risk
    }

    pub fn total_pnl(&self) -> f64 {
        self.total_pnl
    }

    pub fn closed_trades(&self) -> u32 {
        self.closed_trades
    }

    /// Reset daily counters on a new session day
    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        self.trading_state.roll_day(today)
    }

    /// Check the daily entry budget
    pub fn check_limits(&self) -> std::result::Result<(), CircuitBreakerTrip> {
        self.circuit_breakers.check(&self.trading_state)
    }

    /// NONE -> OPEN from a confirmed entry fill
    ///
    /// Stop-loss and take-profit are derived from the filled price and never
    /// move afterwards.
    pub fn open_position_at(
        &mut self,
        symbol: &str,
        fill: &OrderResult,
        timestamp: DateTime<Utc>,
    ) -> Result<Uuid> {
        if let Some(ref existing) = self.position {
            return Err(TradingError::InvalidTransition(format!(
                "already have a {:?} position {}",
                existing.status, existing.id
            )));
        }
        if let Err(trip) = self.check_limits() {
            return Err(TradingError::InvalidTransition(format!(
                "entry blocked by circuit breaker: {:?}",
                trip
            )));
        }
        if fill.filled_quantity <= 0.0 || fill.filled_price <= 0.0 {
            return Err(TradingError::InvalidTransition(format!(
                "entry fill {} has no quantity or price",
                fill.order_id
            )));
        }

        let id = Uuid::new_v4();
        let position = Position {
            id,
            symbol: symbol.to_string(),
            entry_price: fill.filled_price,
            quantity: fill.filled_quantity,
            stop_loss_price: self.risk.stop_loss_price(fill.filled_price),
            take_profit_price: self.risk.take_profit_price(fill.filled_price),
            opened_at: timestamp,
            entry_order_id: fill.order_id.clone(),
            status: PositionStatus::Open,
            pending_exit: None,
        };

        tracing::info!(
            "OPEN {} {:.8} @ {:.2} (SL {:.2}, TP {:.2}, trade {}/{} today)",
            position.symbol,
            position.quantity,
            position.entry_price,
            position.stop_loss_price,
            position.take_profit_price,
            self.trading_state.daily_trades + 1,
            self.circuit_breakers.max_daily_trades
        );

        self.position = Some(position);
        self.trading_state.record_entry();
        Ok(id)
    }

    /// OPEN -> CLOSING once an exit order has been sent
    pub fn begin_exit(
        &mut self,
        client_order_id: &str,
        reason: ExitReason,
        quantity: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let position = self.position_in(PositionStatus::Open, "begin exit")?;
        position.status = PositionStatus::Closing;
        position.pending_exit = Some(PendingExit {
            client_order_id: client_order_id.to_string(),
            reason,
            quantity,
            requested_at: timestamp,
            reconcile_attempts: 0,
        });
        tracing::info!("CLOSING {} ({:?})", position.id, reason);
        Ok(())
    }

    /// Count an inconclusive order-status query; returns the attempts so far
    pub fn record_reconcile_attempt(&mut self) -> Result<u32> {
        let position = self.position_in(PositionStatus::Closing, "reconcile")?;
        let pending = position.pending_exit.as_mut().ok_or_else(|| {
            TradingError::InvalidTransition("CLOSING position without exit order".to_string())
        })?;
        pending.reconcile_attempts += 1;
        Ok(pending.reconcile_attempts)
    }

    /// CLOSING -> CLOSED from a confirmed exit fill
    pub fn confirm_exit(&mut self, fill: &OrderResult, timestamp: DateTime<Utc>) -> Result<ClosedTrade> {
        let position = self.position_in(PositionStatus::Closing, "confirm exit")?;
        let reason = position
            .pending_exit
            .as_ref()
            .map(|p| p.reason)
            .unwrap_or(ExitReason::Signal);

        // A partial exit fill still closes the position; the remainder is
        // dust below what the exchange would let us sell
        let quantity = position.quantity.min(fill.filled_quantity.max(0.0));
        let pnl = (fill.filled_price - position.entry_price) * quantity;
        let pnl_pct = (fill.filled_price - position.entry_price) / position.entry_price * 100.0;

        let trade = ClosedTrade {
            id: position.id,
            symbol: position.symbol.clone(),
            entry_price: position.entry_price,
            exit_price: fill.filled_price,
            quantity,
            opened_at: position.opened_at,
            closed_at: timestamp,
            exit_reason: reason,
            pnl,
            pnl_pct,
        };

        self.position = None;
        self.trading_state.record_exit(pnl);
        self.total_pnl += pnl;
        self.closed_trades += 1;

        tracing::info!(
            "CLOSED {} @ {:.2} ({:?}): PnL {:+.2} ({:+.2}%)",
            trade.symbol,
            trade.exit_price,
            reason,
            pnl,
            pnl_pct
        );

        Ok(trade)
    }

    /// CLOSING -> OPEN once the exchange confirms the exit never executed
    pub fn abort_exit(&mut self) -> Result<()> {
        let position = self.position_in(PositionStatus::Closing, "abort exit")?;
        tracing::warn!(
            "Exit order for {} did not execute, position back to OPEN",
            position.id
        );
        position.status = PositionStatus::Open;
        position.pending_exit = None;
        Ok(())
    }

    fn position_in(&mut self, status: PositionStatus, action: &str) -> Result<&mut Position> {
        match self.position.as_ref().map(|p| p.status) {
            None => {
                return Err(TradingError::InvalidTransition(format!(
                    "cannot {} without a position",
                    action
                )))
            }
            Some(current) if current != status => {
                return Err(TradingError::InvalidTransition(format!(
                    "cannot {} a {:?} position",
                    action, current
                )))
            }
            Some(_) => {}
        }
        self.position.as_mut().ok_or_else(|| {
            TradingError::InvalidTransition(format!("cannot {} without a position", action))
        })
    }
}
