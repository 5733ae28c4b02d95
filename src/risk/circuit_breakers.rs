use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-day entry cap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakers {
    pub max_daily_trades: u32,
}

impl Default for CircuitBreakers {
    fn default() -> Self {
        Self {
            max_daily_trades: 3, // 3 entries per session day
        }
    }
}

/// Counters that reset with the session day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingState {
    pub daily_trades: u32,
    pub daily_pnl: f64,
    pub session_day: NaiveDate,
}

impl TradingState {
    pub fn new(session_day: NaiveDate) -> Self {
        Self {
            daily_trades: 0,
            daily_pnl: 0.0,
            session_day,
        }
    }

    /// Reset the counters when `today` is a new session day. Returns true if
    /// a reset happened.
    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        if today == self.session_day {
            return false;
        }
        tracing::info!(
            "New session day {} (previous {}: {} trades, pnl {:.2})",
            today,
            self.session_day,
            self.daily_trades,
            self.daily_pnl
        );
        self.session_day = today;
        self.daily_trades = 0;
        self.daily_pnl = 0.0;
        true
    }

    pub fn record_entry(&mut self) {
        self.daily_trades += 1;
    }

    pub fn record_exit(&mut self, pnl: f64) {
        self.daily_pnl += pnl;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CircuitBreakerTrip {
    DailyTradeLimit,
}

impl CircuitBreakers {
    pub fn check(&self, state: &TradingState) -> Result<(), CircuitBreakerTrip> {
        if state.daily_trades >= self.max_daily_trades {
            return Err(CircuitBreakerTrip::DailyTradeLimit);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_daily_trade_limit() {
        let breakers = CircuitBreakers::default();
        let mut state = TradingState::new(day(1));

        for _ in 0..3 {
            assert!(breakers.check(&state).is_ok());
            state.record_entry();
        }

        assert_eq!(
            breakers.check(&state),
            Err(CircuitBreakerTrip::DailyTradeLimit)
        );
    }

    #[test]
    fn test_roll_day_resets_counters() {
        let breakers = CircuitBreakers::default();
        let mut state = TradingState::new(day(1));
        state.daily_trades = 3;
        state.record_exit(-12.5);

        assert!(!state.roll_day(day(1)));
        assert_eq!(state.daily_trades, 3);

        assert!(state.roll_day(day(2)));
        assert_eq!(state.daily_trades, 0);
        assert_eq!(state.daily_pnl, 0.0);
        assert!(breakers.check(&state).is_ok());
    }

    #[test]
    fn test_zero_limit_blocks_everything() {
        let breakers = CircuitBreakers { max_daily_trades: 0 };
        let state = TradingState::new(day(1));
        assert!(breakers.check(&state).is_err());
    }
}
