use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorSnapshot;

/// Thresholds for the indicator conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Distance from a Bollinger band that still counts as touching it,
    /// as a fraction of the band (0.01 = 1%)
    pub bb_proximity_pct: f64,
    /// Conditions that must agree before a technical BUY/SELL fires
    pub min_matches: u8,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            bb_proximity_pct: 0.01,
            min_matches: 2,
        }
    }
}

/// `a` moved from at-or-below `b` to strictly above it
pub fn crossed_above(prev_a: f64, prev_b: f64, curr_a: f64, curr_b: f64) -> bool {
    prev_a <= prev_b && curr_a > curr_b
}

/// `a` moved from at-or-above `b` to strictly below it
pub fn crossed_below(prev_a: f64, prev_b: f64, curr_a: f64, curr_b: f64) -> bool {
    prev_a >= prev_b && curr_a < curr_b
}

/// Outcome of the four indicator conditions for one side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSet {
    pub ema_cross: bool,
    pub rsi_cross: bool,
    pub macd_cross: bool,
    pub band_touch: bool,
}

impl ConditionSet {
    pub fn count(&self) -> u8 {
        [self.ema_cross, self.rsi_cross, self.macd_cross, self.band_touch]
            .iter()
            .filter(|&&matched| matched)
            .count() as u8
    }
}

/// Bullish conditions between two consecutive snapshots
///
/// EMA, RSI and MACD only count on the bar where the crossing happens. The
/// band condition is a level check against the lower band.
pub fn bullish_conditions(
    prev: &IndicatorSnapshot,
    curr: &IndicatorSnapshot,
    price: f64,
    config: &SignalConfig,
) -> ConditionSet {
    ConditionSet {
        ema_cross: crossed_above(prev.ema_fast, prev.ema_slow, curr.ema_fast, curr.ema_slow),
        rsi_cross: crossed_above(
            prev.rsi,
            config.rsi_oversold,
            curr.rsi,
            config.rsi_oversold,
        ),
        macd_cross: crossed_above(
            prev.macd_line,
            prev.macd_signal,
            curr.macd_line,
            curr.macd_signal,
        ),
        band_touch: price <= curr.bb_lower * (1.0 + config.bb_proximity_pct),
    }
}

/// Mirror of [`bullish_conditions`]: bearish EMA and MACD crosses, RSI
/// entering overbought, price near the upper band
pub fn bearish_conditions(
    prev: &IndicatorSnapshot,
    curr: &IndicatorSnapshot,
    price: f64,
    config: &SignalConfig,
) -> ConditionSet {
    ConditionSet {
        ema_cross: crossed_below(prev.ema_fast, prev.ema_slow, curr.ema_fast, curr.ema_slow),
        rsi_cross: crossed_above(
            prev.rsi,
            config.rsi_overbought,
            curr.rsi,
            config.rsi_overbought,
        ),
        macd_cross: crossed_below(
            prev.macd_line,
            prev.macd_signal,
            curr.macd_line,
            curr.macd_signal,
        ),
        band_touch: price >= curr.bb_upper * (1.0 - config.bb_proximity_pct),
    }
}
