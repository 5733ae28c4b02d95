use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use crate::error::DataError;
use crate::indicators::{IndicatorConfig, IndicatorEngine, IndicatorSnapshot};
use crate::models::PriceBar;

/// Result of ingesting one fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FeedUpdate {
    /// Closed bars appended to the engine by this fetch
    pub new_bars: usize,
    /// Snapshots produced by those bars (empty while warming up)
    pub snapshots: Vec<IndicatorSnapshot>,
    /// Close of the still-forming bar
    pub live_price: f64,
    pub live_timestamp: DateTime<Utc>,
}

/// Feeds fetched bars into the indicator engine
///
/// Exchanges return the current, still-forming bar last. That bar only
/// supplies the live price; a bar is ingested once a newer one exists, so
/// each bar produces exactly one snapshot.
pub struct PriceFeed {
    engine: IndicatorEngine,
    closed: VecDeque<PriceBar>,
    max_bars: usize,
    /// Closed bars that failed validation once and are skipped from then on
    rejected: VecDeque<DateTime<Utc>>,
}

impl PriceFeed {
    pub fn new(config: IndicatorConfig, max_bars: usize) -> Self {
        Self {
            engine: IndicatorEngine::new(config),
            closed: VecDeque::with_capacity(max_bars),
            max_bars: max_bars.max(1),
            rejected: VecDeque::new(),
        }
    }

    /// Close of the forming bar, when that bar is usable on its own
    pub fn live_price(fetched: &[PriceBar]) -> Option<f64> {
        fetched
            .last()
            .filter(|bar| bar.validate().is_ok())
            .map(|bar| bar.close)
    }

    pub fn engine(&self) -> &IndicatorEngine {
        &self.engine
    }

    /// Closed bars retained, oldest first
    pub fn bars(&self) -> impl Iterator<Item = &PriceBar> {
        self.closed.iter()
    }

    pub fn bar_count(&self) -> usize {
        self.closed.len()
    }

    /// (previous, current) snapshots once the engine is warm
    pub fn latest_pair(&self) -> Result<(&IndicatorSnapshot, &IndicatorSnapshot), DataError> {
        self.engine.latest_pair()
    }

    /// Ingest a fetch, oldest bar first
    ///
    /// New closed bars are validated as a batch before any is applied, so a
    /// malformed fetch leaves the engine untouched. The offending closed bar
    /// is remembered and left out of later fetches.
    pub fn ingest(&mut self, fetched: &[PriceBar]) -> Result<FeedUpdate, DataError> {
        let Some((forming, closed)) = fetched.split_last() else {
            return Err(DataError::InsufficientHistory {
                have: 0,
                need: 1,
            });
        };
        forming.validate()?;

        let last_seen = self.engine.last_timestamp();
        let fresh: Vec<&PriceBar> = closed
            .iter()
            .filter(|bar| last_seen.map_or(true, |t| bar.timestamp > t))
            .filter(|bar| !self.rejected.contains(&bar.timestamp))
            .collect();

        let mut previous = last_seen;
        for bar in &fresh {
            if let Err(e) = bar.validate() {
                tracing::warn!("Dropping closed bar at {}: {}", bar.timestamp, e);
                self.rejected.push_back(bar.timestamp);
                while self.rejected.len() > self.max_bars {
                    self.rejected.pop_front();
                }
                return Err(e);
            }
            if let Some(prev) = previous {
                if bar.timestamp <= prev {
                    return Err(DataError::OutOfOrder {
                        previous: prev,
                        got: bar.timestamp,
                    });
                }
            }
            previous = Some(bar.timestamp);
        }
        if let Some(prev) = previous {
            if forming.timestamp < prev {
                return Err(DataError::OutOfOrder {
                    previous: prev,
                    got: forming.timestamp,
                });
            }
        }

        let mut snapshots = Vec::new();
        for bar in &fresh {
            if let Some(snapshot) = self.engine.update(bar)? {
                snapshots.push(snapshot);
            }
            self.closed.push_back((*bar).clone());
            while self.closed.len() > self.max_bars {
                self.closed.pop_front();
            }
        }

        if !fresh.is_empty() {
            tracing::debug!(
                "Ingested {} closed bars (engine has {}), live price {:.2}",
                fresh.len(),
                self.engine.bars_seen(),
                forming.close
            );
        }

        Ok(FeedUpdate {
            new_bars: fresh.len(),
            snapshots,
            live_price: forming.close,
            live_timestamp: forming.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bars(closes: &[f64]) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                timestamp: start + Duration::minutes(15 * i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 100.0,
            })
            .collect()
    }

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 * 0.5).collect()
    }

    #[test]
    fn test_forming_bar_not_ingested() {
        let mut feed = PriceFeed::new(IndicatorConfig::default(), 200);
        let fetched = bars(&ramp(10));

        let update = feed.ingest(&fetched).unwrap();
        assert_eq!(update.new_bars, 9);
        assert_eq!(update.live_price, fetched[9].close);
        assert_eq!(feed.engine().bars_seen(), 9);
    }

    #[test]
    fn test_overlapping_fetches_ingest_once() {
        let mut feed = PriceFeed::new(IndicatorConfig::default(), 200);
        let all = bars(&ramp(60));

        feed.ingest(&all[..55]).unwrap();
        assert_eq!(feed.engine().bars_seen(), 54);

        // Same window refetched: nothing new
        let update = feed.ingest(&all[..55]).unwrap();
        assert_eq!(update.new_bars, 0);
        assert!(update.snapshots.is_empty());

        // Window slides by two bars
        let update = feed.ingest(&all[2..57]).unwrap();
        assert_eq!(update.new_bars, 2);
        assert_eq!(update.snapshots.len(), 2);
        assert_eq!(feed.engine().bars_seen(), 56);
        assert!(feed.latest_pair().is_ok());
    }

    #[test]
    fn test_malformed_fetch_leaves_engine_untouched() {
        let mut feed = PriceFeed::new(IndicatorConfig::default(), 200);
        let mut fetched = bars(&ramp(10));
        fetched[5].high = fetched[5].low - 1.0;

        assert!(matches!(
            feed.ingest(&fetched),
            Err(DataError::MalformedBar { .. })
        ));
        assert_eq!(feed.engine().bars_seen(), 0);
        assert_eq!(feed.bar_count(), 0);
    }

    #[test]
    fn test_malformed_closed_bar_dropped_after_rejection() {
        let mut feed = PriceFeed::new(IndicatorConfig::default(), 200);
        let mut fetched = bars(&ramp(10));
        fetched[5].high = fetched[5].low - 1.0;
        assert!(feed.ingest(&fetched).is_err());

        let update = feed.ingest(&fetched).unwrap();
        assert_eq!(update.new_bars, 8);
        assert_eq!(feed.engine().bars_seen(), 8);
        assert!(feed.bars().all(|b| b.timestamp != fetched[5].timestamp));
    }

    #[test]
    fn test_live_price_needs_valid_forming_bar() {
        let mut fetched = bars(&ramp(10));
        fetched[5].high = fetched[5].low - 1.0;
        assert_eq!(PriceFeed::live_price(&fetched), Some(fetched[9].close));

        fetched[9].close = -1.0;
        assert_eq!(PriceFeed::live_price(&fetched), None);
        assert_eq!(PriceFeed::live_price(&[]), None);
    }

    #[test]
    fn test_empty_fetch() {
        let mut feed = PriceFeed::new(IndicatorConfig::default(), 200);
        assert!(matches!(
            feed.ingest(&[]),
            Err(DataError::InsufficientHistory { .. })
        ));
    }

    #[test]
    fn test_retains_bounded_history() {
        let mut feed = PriceFeed::new(IndicatorConfig::default(), 20);
        feed.ingest(&bars(&ramp(60))).unwrap();
        assert_eq!(feed.bar_count(), 20);
        assert_eq!(feed.engine().bars_seen(), 59);
    }
}
