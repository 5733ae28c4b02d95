use super::signals::{bearish_conditions, bullish_conditions, SignalConfig};
use super::{Strategy, StrategyInput};
use crate::models::{Signal, SignalDirection, SignalReason};

/// Multi-indicator voting strategy
///
/// - Flat: BUY when at least `min_matches` bullish conditions agree, the
///   session is open and the daily entry budget is not spent.
/// - In a position: SELL on take-profit, stop-loss, or at least
///   `min_matches` bearish conditions. Price levels are checked on every
///   cycle, indicator conditions only when a new bar closed.
#[derive(Debug, Clone, Default)]
pub struct SignalFusion {
    config: SignalConfig,
}

impl SignalFusion {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    fn evaluate_exit(&self, input: &StrategyInput<'_>) -> Signal {
        let Some(levels) = input.position else {
            return Signal::hold(0, input.timestamp);
        };

        let price_exit = if input.price >= levels.take_profit_price {
            Some(SignalReason::TakeProfit)
        } else if input.price <= levels.stop_loss_price {
            Some(SignalReason::StopLoss)
        } else {
            None
        };

        if let Some(reason) = price_exit {
            tracing::info!(
                price = input.price,
                take_profit = levels.take_profit_price,
                stop_loss = levels.stop_loss_price,
                "Exit level reached: {:?}",
                reason
            );
            return Signal {
                direction: SignalDirection::Sell,
                matched_condition_count: 0,
                reason,
                timestamp: input.timestamp,
            };
        }

        let Some((prev, curr)) = input.indicators else {
            return Signal::hold(0, input.timestamp);
        };

        let bearish = bearish_conditions(prev, curr, input.price, &self.config);
        let count = bearish.count();
        if count >= self.config.min_matches {
            tracing::info!("Technical sell signal: {:?} ({} matched)", bearish, count);
            return Signal {
                direction: SignalDirection::Sell,
                matched_condition_count: count,
                reason: SignalReason::Technical,
                timestamp: input.timestamp,
            };
        }

        Signal::hold(count, input.timestamp)
    }

    fn evaluate_entry(&self, input: &StrategyInput<'_>) -> Signal {
        let Some((prev, curr)) = input.indicators else {
            return Signal::hold(0, input.timestamp);
        };

        let bullish = bullish_conditions(prev, curr, input.price, &self.config);
        let count = bullish.count();
        if count < self.config.min_matches {
            tracing::debug!(
                ema_fast = curr.ema_fast,
                ema_slow = curr.ema_slow,
                rsi = curr.rsi,
                macd = curr.macd_line,
                macd_signal = curr.macd_signal,
                "No buy signal ({} matched)",
                count
            );
            return Signal::hold(count, input.timestamp);
        }

        if !input.trading_allowed {
            tracing::info!("Buy signal ({} matched) suppressed: outside trading window", count);
            return Signal::hold(count, input.timestamp);
        }

        if input.daily_trades >= input.max_daily_trades {
            tracing::info!(
                "Buy signal ({} matched) suppressed: daily trade limit {}/{}",
                count,
                input.daily_trades,
                input.max_daily_trades
            );
            return Signal::hold(count, input.timestamp);
        }

        tracing::info!("Buy signal: {:?} ({} matched)", bullish, count);
        Signal {
            direction: SignalDirection::Buy,
            matched_condition_count: count,
            reason: SignalReason::Technical,
            timestamp: input.timestamp,
        }
    }
}

impl Strategy for SignalFusion {
    fn evaluate(&self, input: &StrategyInput<'_>) -> Signal {
        // Long only: with a position open only exits are considered, so a
        // cycle where both sides match resolves to the exit
        if input.position.is_some() {
            self.evaluate_exit(input)
        } else {
            self.evaluate_entry(input)
        }
    }

    fn name(&self) -> &str {
        "SignalFusion"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorSnapshot;
    use crate::strategy::signals::tests::neutral_snapshot;
    use crate::strategy::ExitLevels;
    use chrono::Utc;

    fn bullish_pair() -> (IndicatorSnapshot, IndicatorSnapshot) {
        // EMA cross and RSI leaving oversold on the same bar
        let prev = IndicatorSnapshot {
            rsi: 27.0,
            ..neutral_snapshot()
        };
        let curr = IndicatorSnapshot {
            ema_fast: 100.5,
            rsi: 32.0,
            ..neutral_snapshot()
        };
        (prev, curr)
    }

    fn input<'a>(
        pair: Option<(&'a IndicatorSnapshot, &'a IndicatorSnapshot)>,
        price: f64,
        position: Option<ExitLevels>,
    ) -> StrategyInput<'a> {
        StrategyInput {
            indicators: pair,
            price,
            timestamp: Utc::now(),
            position,
            trading_allowed: true,
            daily_trades: 0,
            max_daily_trades: 3,
        }
    }

    fn levels() -> ExitLevels {
        ExitLevels {
            stop_loss_price: 99.0,
            take_profit_price: 103.0,
        }
    }

    #[test]
    fn test_two_matches_buy() {
        let (prev, curr) = bullish_pair();
        let signal = SignalFusion::default().evaluate(&input(Some((&prev, &curr)), 100.0, None));
        assert_eq!(signal.direction, SignalDirection::Buy);
        assert_eq!(signal.matched_condition_count, 2);
        assert_eq!(signal.reason, SignalReason::Technical);
    }

    #[test]
    fn test_one_match_holds() {
        let prev = neutral_snapshot();
        let curr = IndicatorSnapshot {
            ema_fast: 100.5,
            ..neutral_snapshot()
        };
        let signal = SignalFusion::default().evaluate(&input(Some((&prev, &curr)), 100.0, None));
        assert_eq!(signal.direction, SignalDirection::Hold);
        assert_eq!(signal.matched_condition_count, 1);
    }

    #[test]
    fn test_buy_suppressed_outside_window() {
        let (prev, curr) = bullish_pair();
        let mut inp = input(Some((&prev, &curr)), 100.0, None);
        inp.trading_allowed = false;
        let signal = SignalFusion::default().evaluate(&inp);
        assert_eq!(signal.direction, SignalDirection::Hold);
        assert_eq!(signal.matched_condition_count, 2);
    }

    #[test]
    fn test_buy_suppressed_at_daily_limit() {
        let (prev, curr) = bullish_pair();
        let mut inp = input(Some((&prev, &curr)), 100.0, None);
        inp.daily_trades = 3;
        let signal = SignalFusion::default().evaluate(&inp);
        assert_eq!(signal.direction, SignalDirection::Hold);
    }

    #[test]
    fn test_no_indicators_holds_when_flat() {
        let signal = SignalFusion::default().evaluate(&input(None, 100.0, None));
        assert_eq!(signal.direction, SignalDirection::Hold);
        assert_eq!(signal.matched_condition_count, 0);
    }

    #[test]
    fn test_stop_loss_without_indicators() {
        let signal = SignalFusion::default().evaluate(&input(None, 99.0, Some(levels())));
        assert_eq!(signal.direction, SignalDirection::Sell);
        assert_eq!(signal.reason, SignalReason::StopLoss);
    }

    #[test]
    fn test_take_profit_precedes_indicators() {
        let (prev, curr) = bullish_pair();
        let signal =
            SignalFusion::default().evaluate(&input(Some((&prev, &curr)), 103.5, Some(levels())));
        assert_eq!(signal.direction, SignalDirection::Sell);
        assert_eq!(signal.reason, SignalReason::TakeProfit);
    }

    #[test]
    fn test_technical_sell() {
        let prev = IndicatorSnapshot {
            ema_fast: 101.0,
            macd_line: 0.5,
            ..neutral_snapshot()
        };
        let curr = IndicatorSnapshot {
            ema_fast: 99.5,
            macd_line: -0.1,
            ..neutral_snapshot()
        };
        let signal =
            SignalFusion::default().evaluate(&input(Some((&prev, &curr)), 100.0, Some(levels())));
        assert_eq!(signal.direction, SignalDirection::Sell);
        assert_eq!(signal.reason, SignalReason::Technical);
        assert_eq!(signal.matched_condition_count, 2);
    }

    #[test]
    fn test_bullish_conditions_ignored_while_positioned() {
        let (prev, curr) = bullish_pair();
        let signal =
            SignalFusion::default().evaluate(&input(Some((&prev, &curr)), 100.0, Some(levels())));
        assert_eq!(signal.direction, SignalDirection::Hold);
    }

    #[test]
    fn test_sustained_cross_fires_once() {
        // fast stays above slow for several bars after crossing
        let fusion = SignalFusion::default();
        let config = fusion.config().clone();
        let series: Vec<IndicatorSnapshot> = [99.0, 100.5, 101.0, 101.5, 102.0]
            .iter()
            .map(|&fast| IndicatorSnapshot {
                ema_fast: fast,
                ..neutral_snapshot()
            })
            .collect();

        let crosses = series
            .windows(2)
            .filter(|w| bullish_conditions(&w[0], &w[1], 100.0, &config).ema_cross)
            .count();
        assert_eq!(crosses, 1);
    }
}
