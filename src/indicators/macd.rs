//! MACD built from three streaming EMAs.
//!
//! line = EMA(fast) - EMA(slow); signal = EMA(signal) of the line. The signal
//! EMA only starts consuming once the slow EMA is seeded.

use serde::{Deserialize, Serialize};

use super::moving_average::{calculate_ema, calculate_ema_series, Ema};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
        }
    }

    /// Bars needed before the first full value
    pub fn warmup(&self) -> usize {
        self.fast.period().max(self.slow.period()) + self.signal.period() - 1
    }

    pub fn update(&mut self, close: f64) -> Option<MacdValue> {
        let fast = self.fast.update(close);
        let slow = self.slow.update(close);

        let line = fast? - slow?;
        let signal = self.signal.update(line)?;

        Some(MacdValue {
            line,
            signal,
            histogram: line - signal,
        })
    }
}

/// From-scratch MACD for the last price
pub fn calculate_macd(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Option<MacdValue> {
    let fast_series = calculate_ema_series(prices, fast);
    let slow_series = calculate_ema_series(prices, slow);

    let lines: Vec<f64> = fast_series
        .iter()
        .zip(&slow_series)
        .filter_map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let line = *lines.last()?;
    let signal = calculate_ema(&lines, signal)?;

    Some(MacdValue {
        line,
        signal,
        histogram: line - signal,
    })
}
