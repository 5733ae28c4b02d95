use crate::execution::{ExitReason, Position, PositionManager, PositionStatus};
use crate::models::{Balance, Signal, SignalReason};
use crate::risk::RiskSizer;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionAction {
    Enter { quantity: f64 },
    Exit { exit_reason: ExitReason },
    Skip,
}

#[derive(Debug, Clone)]
pub struct ExecutionDecision {
    pub action: ExecutionAction,
    pub reason: String,
}

impl ExecutionDecision {
    fn skip(reason: impl Into<String>) -> Self {
        Self {
            action: ExecutionAction::Skip,
            reason: reason.into(),
        }
    }
}

/// Turns signals into order intents
///
/// Exits and entries are decided separately so the caller can always run the
/// exit side first and skip entry whenever a position exists.
pub struct Executor {
    sizer: RiskSizer,
}

impl Executor {
    pub fn new(sizer: RiskSizer) -> Self {
        Self { sizer }
    }

    pub fn sizer(&self) -> &RiskSizer {
        &self.sizer
    }

    /// Exit decision for an OPEN position. A forced flatten (window closed or
    /// position carried over from an earlier session) overrides any signal.
    pub fn decide_exit(
        &self,
        pm: &PositionManager,
        signal: &Signal,
        force_flatten: bool,
    ) -> ExecutionDecision {
        if pm.status() != PositionStatus::Open {
            return ExecutionDecision::skip("No open position");
        }

        if force_flatten {
            return ExecutionDecision {
                action: ExecutionAction::Exit {
                    exit_reason: ExitReason::SessionEnd,
                },
                reason: "Outside the position's session window".to_string(),
            };
        }

        if !signal.is_sell() {
            return ExecutionDecision::skip("Holding position");
        }

        let exit_reason = match signal.reason {
            SignalReason::TakeProfit => ExitReason::TakeProfit,
            SignalReason::StopLoss => ExitReason::StopLoss,
            SignalReason::Technical | SignalReason::None => ExitReason::Signal,
        };

        ExecutionDecision {
            action: ExecutionAction::Exit { exit_reason },
            reason: format!(
                "Sell signal ({:?}, {} conditions)",
                signal.reason, signal.matched_condition_count
            ),
        }
    }

    /// Entry decision while flat: position check, daily limit, then sizing
    pub fn decide_entry(
        &self,
        pm: &PositionManager,
        signal: &Signal,
        balance: &Balance,
        price: f64,
    ) -> ExecutionDecision {
        if !signal.is_buy() {
            return ExecutionDecision::skip("No buy signal");
        }

        if !pm.is_flat() {
            return ExecutionDecision::skip("Already have open position");
        }

        if let Err(trip) = pm.check_limits() {
            return ExecutionDecision::skip(format!("Circuit breaker: {:?}", trip));
        }

        match self.sizer.size_entry(balance.quote_free, price) {
            Ok(quantity) => ExecutionDecision {
                action: ExecutionAction::Enter { quantity },
                reason: format!(
                    "Buy signal ({} conditions), risking {:.2}% of {:.2}",
                    signal.matched_condition_count,
                    self.sizer.config().risk_per_trade * 100.0,
                    balance.quote_free
                ),
            },
            Err(e) => {
                tracing::warn!("Rejected buy signal: {}", e);
                ExecutionDecision::skip(format!("Rejected: {}", e))
            }
        }
    }

    /// Quantity to sell: the position, clamped to what the account holds.
    /// `None` when the account holds nothing to sell.
    pub fn exit_quantity(position: &Position, base_free: Option<f64>) -> Option<f64> {
        match base_free {
            Some(held) if held <= 0.0 => {
                tracing::error!(
                    "Position {} holds {:.8} but the account has no base balance, not selling",
                    position.id,
                    position.quantity
                );
                None
            }
            Some(held) if held < position.quantity => {
                tracing::warn!(
                    "Position {} holds {:.8} but account has {:.8}, selling what is available",
                    position.id,
                    position.quantity,
                    held
                );
                Some(held)
            }
            _ => Some(position.quantity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderResult, OrderSide, SignalDirection};
    use crate::risk::{CircuitBreakers, RiskConfig};
    use chrono::{NaiveDate, Utc};

    fn manager() -> PositionManager {
        PositionManager::new(
            RiskConfig::default(),
            CircuitBreakers::default(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
    }

    fn signal(direction: SignalDirection, reason: SignalReason) -> Signal {
        Signal {
            direction,
            matched_condition_count: 2,
            reason,
            timestamp: Utc::now(),
        }
    }

    fn buy() -> Signal {
        signal(SignalDirection::Buy, SignalReason::Technical)
    }

    fn balance(quote: f64) -> Balance {
        Balance {
            quote_free: quote,
            base_free: None,
        }
    }

    fn open(pm: &mut PositionManager, price: f64, quantity: f64) {
        let fill = OrderResult {
            order_id: "1".to_string(),
            client_order_id: "c1".to_string(),
            side: OrderSide::Buy,
            filled_price: price,
            filled_quantity: quantity,
        };
        pm.open_position_at("BTC/USDT", &fill, Utc::now()).unwrap();
    }

    #[test]
    fn test_enter_with_risk_sized_quantity() {
        let executor = Executor::new(RiskSizer::default());
        let decision = executor.decide_entry(&manager(), &buy(), &balance(10_000.0), 50_000.0);

        match decision.action {
            ExecutionAction::Enter { quantity } => assert!((quantity - 0.4).abs() < 1e-9),
            other => panic!("expected entry, got {:?}", other),
        }
    }

    #[test]
    fn test_skip_buy_when_already_positioned() {
        let mut pm = manager();
        open(&mut pm, 100.0, 1.0);

        let executor = Executor::new(RiskSizer::default());
        let decision = executor.decide_entry(&pm, &buy(), &balance(10_000.0), 105.0);

        assert!(matches!(decision.action, ExecutionAction::Skip));
        assert!(decision.reason.contains("Already have"));
    }

    #[test]
    fn test_circuit_breaker_blocks_entry() {
        let mut pm = manager();
        for _ in 0..3 {
            open(&mut pm, 100.0, 1.0);
            pm.begin_exit("x", ExitReason::Signal, 1.0, Utc::now()).unwrap();
            let fill = OrderResult {
                order_id: "2".to_string(),
                client_order_id: "x".to_string(),
                side: OrderSide::Sell,
                filled_price: 100.0,
                filled_quantity: 1.0,
            };
            pm.confirm_exit(&fill, Utc::now()).unwrap();
        }

        let executor = Executor::new(RiskSizer::default());
        let decision = executor.decide_entry(&pm, &buy(), &balance(10_000.0), 100.0);
        assert!(matches!(decision.action, ExecutionAction::Skip));
        assert!(decision.reason.contains("Circuit breaker"));
    }

    #[test]
    fn test_invalid_risk_rejects_entry() {
        let executor = Executor::new(RiskSizer::default());
        let decision = executor.decide_entry(&manager(), &buy(), &balance(0.0), 100.0);
        assert!(matches!(decision.action, ExecutionAction::Skip));
        assert!(decision.reason.contains("Rejected"));
    }

    #[test]
    fn test_hold_signal_skips() {
        let executor = Executor::new(RiskSizer::default());
        let hold = Signal::hold(1, Utc::now());
        let decision = executor.decide_entry(&manager(), &hold, &balance(10_000.0), 100.0);
        assert!(matches!(decision.action, ExecutionAction::Skip));
    }

    #[test]
    fn test_exit_reasons_follow_signal() {
        let mut pm = manager();
        open(&mut pm, 100.0, 1.0);
        let executor = Executor::new(RiskSizer::default());

        let cases = [
            (SignalReason::StopLoss, ExitReason::StopLoss),
            (SignalReason::TakeProfit, ExitReason::TakeProfit),
            (SignalReason::Technical, ExitReason::Signal),
        ];
        for (signal_reason, exit_reason) in cases {
            let decision =
                executor.decide_exit(&pm, &signal(SignalDirection::Sell, signal_reason), false);
            assert_eq!(decision.action, ExecutionAction::Exit { exit_reason });
        }
    }

    #[test]
    fn test_session_end_overrides_hold() {
        let mut pm = manager();
        open(&mut pm, 100.0, 1.0);
        let executor = Executor::new(RiskSizer::default());

        let hold = Signal::hold(0, Utc::now());
        assert!(matches!(
            executor.decide_exit(&pm, &hold, false).action,
            ExecutionAction::Skip
        ));
        assert_eq!(
            executor.decide_exit(&pm, &hold, true).action,
            ExecutionAction::Exit {
                exit_reason: ExitReason::SessionEnd
            }
        );
    }

    #[test]
    fn test_skip_exit_when_flat() {
        let executor = Executor::new(RiskSizer::default());
        let sell = signal(SignalDirection::Sell, SignalReason::StopLoss);
        let decision = executor.decide_exit(&manager(), &sell, true);
        assert!(matches!(decision.action, ExecutionAction::Skip));
    }

    #[test]
    fn test_exit_quantity_clamped_to_holdings() {
        let mut pm = manager();
        open(&mut pm, 100.0, 2.0);
        let position = pm.position().unwrap();

        assert_eq!(Executor::exit_quantity(position, None), Some(2.0));
        assert_eq!(Executor::exit_quantity(position, Some(5.0)), Some(2.0));
        assert_eq!(Executor::exit_quantity(position, Some(1.998)), Some(1.998));
    }

    #[test]
    fn test_nothing_to_sell() {
        let mut pm = manager();
        open(&mut pm, 100.0, 2.0);
        let position = pm.position().unwrap();

        assert_eq!(Executor::exit_quantity(position, Some(0.0)), None);
        assert_eq!(Executor::exit_quantity(position, Some(-1e-9)), None);
    }
}
