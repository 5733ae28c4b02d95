use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bollinger::{calculate_bollinger, Bollinger};
use super::macd::{calculate_macd, Macd};
use super::moving_average::{calculate_ema, Ema};
use super::rsi::{calculate_rsi, Rsi};
use crate::error::DataError;
use crate::models::PriceBar;

/// Indicator periods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_stddev: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_fast: 20,
            ema_slow: 50,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_stddev: 2.0,
        }
    }
}

impl IndicatorConfig {
    /// Bars required before the first snapshot (longest lookback)
    pub fn min_history(&self) -> usize {
        let macd = self.macd_fast.max(self.macd_slow) + self.macd_signal.saturating_sub(1);
        self.ema_fast
            .max(self.ema_slow)
            .max(self.rsi_period + 1)
            .max(macd)
            .max(self.bb_period)
    }
}

/// Indicator values for one bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
}

/// Streaming indicator state for the traded pair
///
/// Each accepted bar advances every accumulator once, so a snapshot costs
/// O(1) regardless of how much history has been seen. The engine keeps the
/// last two snapshots because signal fusion works on crossings.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
    ema_fast: Ema,
    ema_slow: Ema,
    rsi: Rsi,
    macd: Macd,
    bollinger: Bollinger,
    bars_seen: usize,
    last_timestamp: Option<DateTime<Utc>>,
    current: Option<IndicatorSnapshot>,
    previous: Option<IndicatorSnapshot>,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self {
            ema_fast: Ema::new(config.ema_fast),
            ema_slow: Ema::new(config.ema_slow),
            rsi: Rsi::new(config.rsi_period),
            macd: Macd::new(config.macd_fast, config.macd_slow, config.macd_signal),
            bollinger: Bollinger::new(config.bb_period, config.bb_stddev),
            bars_seen: 0,
            last_timestamp: None,
            current: None,
            previous: None,
            config,
        }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn min_history(&self) -> usize {
        self.config.min_history()
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    /// Append the next bar
    ///
    /// Returns the new snapshot once the engine is warm, `Ok(None)` while it
    /// is still collecting history. A malformed or out-of-order bar is
    /// rejected without touching any state.
    pub fn update(&mut self, bar: &PriceBar) -> Result<Option<IndicatorSnapshot>, DataError> {
        bar.validate()?;
        if let Some(previous) = self.last_timestamp {
            if bar.timestamp <= previous {
                return Err(DataError::OutOfOrder {
                    previous,
                    got: bar.timestamp,
                });
            }
        }

        let close = bar.close;
        let ema_fast = self.ema_fast.update(close);
        let ema_slow = self.ema_slow.update(close);
        let rsi = self.rsi.update(close);
        let macd = self.macd.update(close);
        let bands = self.bollinger.update(close);

        self.bars_seen += 1;
        self.last_timestamp = Some(bar.timestamp);

        let snapshot = match (ema_fast, ema_slow, rsi, macd, bands) {
            (Some(ema_fast), Some(ema_slow), Some(rsi), Some(macd), Some(bands)) => {
                IndicatorSnapshot {
                    timestamp: bar.timestamp,
                    close,
                    ema_fast,
                    ema_slow,
                    rsi,
                    macd_line: macd.line,
                    macd_signal: macd.signal,
                    bb_upper: bands.upper,
                    bb_middle: bands.middle,
                    bb_lower: bands.lower,
                }
            }
            _ => return Ok(None),
        };

        self.previous = self.current.replace(snapshot.clone());
        Ok(Some(snapshot))
    }

    /// Latest snapshot, or `InsufficientHistory` while warming up
    pub fn latest(&self) -> Result<&IndicatorSnapshot, DataError> {
        self.current
            .as_ref()
            .ok_or(DataError::InsufficientHistory {
                have: self.bars_seen,
                need: self.min_history(),
            })
    }

    /// Latest two snapshots as (previous, current)
    pub fn latest_pair(&self) -> Result<(&IndicatorSnapshot, &IndicatorSnapshot), DataError> {
        let current = self.latest()?;
        let previous = self
            .previous
            .as_ref()
            .ok_or(DataError::InsufficientHistory {
                have: self.bars_seen,
                need: self.min_history() + 1,
            })?;
        Ok((previous, current))
    }

    /// Feed a whole series, collecting every snapshot produced
    pub fn replay(&mut self, bars: &[PriceBar]) -> Result<Vec<IndicatorSnapshot>, DataError> {
        let mut snapshots = Vec::new();
        for bar in bars {
            if let Some(snapshot) = self.update(bar)? {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }
}

/// Snapshot for the last bar computed from the full history, without any
/// carried state
pub fn compute_snapshot(
    config: &IndicatorConfig,
    bars: &[PriceBar],
) -> Result<IndicatorSnapshot, DataError> {
    let need = config.min_history();
    let insufficient = DataError::InsufficientHistory {
        have: bars.len(),
        need,
    };
    let last = bars.last().ok_or_else(|| insufficient.clone())?;
    if bars.len() < need {
        return Err(insufficient);
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_fast = calculate_ema(&closes, config.ema_fast);
    let ema_slow = calculate_ema(&closes, config.ema_slow);
    let rsi = calculate_rsi(&closes, config.rsi_period);
    let macd = calculate_macd(
        &closes,
        config.macd_fast,
        config.macd_slow,
        config.macd_signal,
    );
    let bands = calculate_bollinger(&closes, config.bb_period, config.bb_stddev);

    match (ema_fast, ema_slow, rsi, macd, bands) {
        (Some(ema_fast), Some(ema_slow), Some(rsi), Some(macd), Some(bands)) => {
            Ok(IndicatorSnapshot {
                timestamp: last.timestamp,
                close: last.close,
                ema_fast,
                ema_slow,
                rsi,
                macd_line: macd.line,
                macd_signal: macd.signal,
                bb_upper: bands.upper,
                bb_middle: bands.middle,
                bb_lower: bands.lower,
            })
        }
        _ => Err(insufficient),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                timestamp: start + Duration::minutes(15 * i as i64),
                open: close,
                high: close * 1.001,
                low: close * 0.999,
                close,
                volume: 5.0,
            })
            .collect()
    }

    fn trending(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 40_000.0 + i as f64 * 12.0 + (i as f64 * 0.4).sin() * 150.0)
            .collect()
    }

    fn assert_snapshot_close(a: &IndicatorSnapshot, b: &IndicatorSnapshot) {
        assert_eq!(a.timestamp, b.timestamp);
        assert_relative_eq!(a.ema_fast, b.ema_fast, max_relative = 1e-9);
        assert_relative_eq!(a.ema_slow, b.ema_slow, max_relative = 1e-9);
        assert_relative_eq!(a.rsi, b.rsi, epsilon = 1e-6);
        assert_relative_eq!(a.macd_line, b.macd_line, epsilon = 1e-6);
        assert_relative_eq!(a.macd_signal, b.macd_signal, epsilon = 1e-6);
        assert_relative_eq!(a.bb_upper, b.bb_upper, max_relative = 1e-7);
        assert_relative_eq!(a.bb_lower, b.bb_lower, max_relative = 1e-7);
    }

    #[test]
    fn test_min_history_is_longest_lookback() {
        assert_eq!(IndicatorConfig::default().min_history(), 50);
    }

    #[test]
    fn test_first_snapshot_at_min_history() {
        let bars = bars_from_closes(&trending(60));
        let mut engine = IndicatorEngine::new(IndicatorConfig::default());

        for bar in &bars[..49] {
            assert_eq!(engine.update(bar).unwrap(), None);
        }
        assert_eq!(
            engine.latest().unwrap_err(),
            DataError::InsufficientHistory { have: 49, need: 50 }
        );

        assert!(engine.update(&bars[49]).unwrap().is_some());
        assert!(engine.latest().is_ok());
        // Only one snapshot so far: no pair to detect crossings on
        assert!(engine.latest_pair().is_err());

        engine.update(&bars[50]).unwrap();
        let (prev, curr) = engine.latest_pair().unwrap();
        assert_eq!(prev.timestamp, bars[49].timestamp);
        assert_eq!(curr.timestamp, bars[50].timestamp);
    }

    #[test]
    fn test_rejects_out_of_order_bar_without_state_change() {
        let bars = bars_from_closes(&trending(3));
        let mut engine = IndicatorEngine::new(IndicatorConfig::default());
        engine.update(&bars[0]).unwrap();
        engine.update(&bars[1]).unwrap();

        let err = engine.update(&bars[0]).unwrap_err();
        assert!(matches!(err, DataError::OutOfOrder { .. }));
        assert_eq!(engine.bars_seen(), 2);
        assert_eq!(engine.last_timestamp(), Some(bars[1].timestamp));
    }

    #[test]
    fn test_rejects_malformed_bar() {
        let mut bars = bars_from_closes(&trending(2));
        bars[1].high = bars[1].low - 1.0;
        let mut engine = IndicatorEngine::new(IndicatorConfig::default());
        engine.update(&bars[0]).unwrap();

        assert!(matches!(
            engine.update(&bars[1]),
            Err(DataError::MalformedBar { .. })
        ));
        assert_eq!(engine.bars_seen(), 1);
    }

    #[test]
    fn test_compute_snapshot_insufficient_history() {
        let bars = bars_from_closes(&trending(30));
        let err = compute_snapshot(&IndicatorConfig::default(), &bars).unwrap_err();
        assert_eq!(err, DataError::InsufficientHistory { have: 30, need: 50 });
    }

    #[test]
    fn test_incremental_matches_from_scratch() {
        let bars = bars_from_closes(&trending(300));
        let config = IndicatorConfig::default();
        let mut engine = IndicatorEngine::new(config.clone());

        for (i, bar) in bars.iter().enumerate() {
            if let Some(streamed) = engine.update(bar).unwrap() {
                let scratch = compute_snapshot(&config, &bars[..=i]).unwrap();
                assert_snapshot_close(&streamed, &scratch);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_no_drift_against_recompute(
            steps in prop::collection::vec(-0.02f64..0.02, 50..220),
        ) {
            let mut closes = Vec::with_capacity(steps.len());
            let mut price = 30_000.0;
            for step in steps {
                price *= 1.0 + step;
                closes.push(price);
            }
            let bars = bars_from_closes(&closes);
            let config = IndicatorConfig::default();

            let mut engine = IndicatorEngine::new(config.clone());
            let snapshots = engine.replay(&bars).unwrap();
            prop_assert_eq!(snapshots.len(), bars.len() - 49);

            let streamed = engine.latest().unwrap();
            let scratch = compute_snapshot(&config, &bars).unwrap();
            prop_assert!((streamed.ema_fast - scratch.ema_fast).abs() <= scratch.ema_fast.abs() * 1e-9);
            prop_assert!((streamed.ema_slow - scratch.ema_slow).abs() <= scratch.ema_slow.abs() * 1e-9);
            prop_assert!((streamed.rsi - scratch.rsi).abs() <= 1e-6);
            prop_assert!((streamed.macd_line - scratch.macd_line).abs() <= 1e-6);
            prop_assert!((streamed.macd_signal - scratch.macd_signal).abs() <= 1e-6);
            prop_assert!((streamed.bb_upper - scratch.bb_upper).abs() <= scratch.bb_upper.abs() * 1e-6);
            prop_assert!((streamed.bb_lower - scratch.bb_lower).abs() <= scratch.bb_upper.abs() * 1e-6);
        }
    }
}
