//! Bollinger Bands: SMA(period) ± k × population stddev.
//!
//! The streaming version keeps running sums over a fixed window and rebuilds
//! them from the window every `period` bars so rounding error cannot
//! accumulate.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerValue {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

fn bands(mean: f64, variance: f64, multiplier: f64) -> BollingerValue {
    let stddev = variance.max(0.0).sqrt();
    BollingerValue {
        upper: mean + multiplier * stddev,
        middle: mean,
        lower: mean - multiplier * stddev,
    }
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    window: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
    since_resync: usize,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64) -> Self {
        Self {
            period,
            multiplier,
            window: VecDeque::with_capacity(period + 1),
            sum: 0.0,
            sum_sq: 0.0,
            since_resync: 0,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<BollingerValue> {
        if self.period == 0 {
            return None;
        }

        self.window.push_back(close);
        self.sum += close;
        self.sum_sq += close * close;

        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
                self.sum_sq -= old * old;
            }
        }

        self.since_resync += 1;
        if self.since_resync >= self.period {
            self.sum = self.window.iter().sum();
            self.sum_sq = self.window.iter().map(|v| v * v).sum();
            self.since_resync = 0;
        }

        if self.window.len() < self.period {
            return None;
        }

        let n = self.period as f64;
        let mean = self.sum / n;
        let variance = self.sum_sq / n - mean * mean;
        Some(bands(mean, variance, self.multiplier))
    }
}

/// From-scratch bands over the last `period` prices
pub fn calculate_bollinger(
    prices: &[f64],
    period: usize,
    multiplier: f64,
) -> Option<BollingerValue> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let window = &prices[prices.len() - period..];
    let n = period as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;

    Some(bands(mean, variance, multiplier))
}
