use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::models::PriceBar;

/// Shape of a generated price path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketScenario {
    Uptrend,
    Downtrend,
    Sideways,
    Volatile,
    /// Sell-off for the first half, recovery in the second
    Reversal,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 5] = [
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Sideways,
        MarketScenario::Volatile,
        MarketScenario::Reversal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MarketScenario::Uptrend => "uptrend",
            MarketScenario::Downtrend => "downtrend",
            MarketScenario::Sideways => "sideways",
            MarketScenario::Volatile => "volatile",
            MarketScenario::Reversal => "reversal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name().eq_ignore_ascii_case(s.trim()))
    }
}

/// Seeded OHLCV generator for backtests and paper trading
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
}

impl SyntheticDataGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 50_000.0,
            base_volume: 25.0,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    /// Default series start: midnight UTC, 2024-03-01
    pub fn default_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        num_bars: usize,
        interval_minutes: i64,
    ) -> Vec<PriceBar> {
        self.generate_from(Self::default_start(), scenario, num_bars, interval_minutes)
    }

    /// `num_bars` consecutive bars starting at `start`
    pub fn generate_from(
        &mut self,
        start: DateTime<Utc>,
        scenario: MarketScenario,
        num_bars: usize,
        interval_minutes: i64,
    ) -> Vec<PriceBar> {
        let mut bars = Vec::with_capacity(num_bars);
        let mut price = self.base_price;

        for i in 0..num_bars {
            let timestamp = start + Duration::minutes(interval_minutes * i as i64);
            let open = price;
            price = self.step(scenario, price, i, num_bars);
            bars.push(self.create_bar(timestamp, open, price, scenario));
        }

        bars
    }

    fn step(&mut self, scenario: MarketScenario, price: f64, i: usize, n: usize) -> f64 {
        match scenario {
            MarketScenario::Uptrend => price * (1.0 + 0.0008 + self.rng.gen_range(-0.002..0.002)),
            MarketScenario::Downtrend => {
                price * (1.0 - 0.0008 + self.rng.gen_range(-0.002..0.002))
            }
            MarketScenario::Sideways => {
                let reversion = (self.base_price - price) * 0.1;
                let noise = price * self.rng.gen_range(-0.004..0.004);
                price + reversion + noise
            }
            MarketScenario::Volatile => {
                let next = price * (1.0 + self.rng.gen_range(-0.02..0.02));
                next.max(self.base_price * 0.5)
            }
            MarketScenario::Reversal => {
                let drift = if i < n / 2 { -0.0015 } else { 0.0015 };
                price * (1.0 + drift + self.rng.gen_range(-0.002..0.002))
            }
        }
    }

    fn create_bar(
        &mut self,
        timestamp: DateTime<Utc>,
        open: f64,
        close: f64,
        scenario: MarketScenario,
    ) -> PriceBar {
        let wick = match scenario {
            MarketScenario::Volatile => 0.006,
            _ => 0.002,
        };
        let high = open.max(close) * (1.0 + self.rng.gen_range(0.0..wick));
        let low = open.min(close) * (1.0 - self.rng.gen_range(0.0..wick));
        let volume = self.base_volume * self.rng.gen_range(0.5..1.5);

        PriceBar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}
