/// Calculate Simple Moving Average (SMA) of the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices[prices.len() - period..].iter().sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA)
///
/// Seeded with the SMA of the first `period` prices.
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    calculate_ema_series(prices, period).last().copied().flatten()
}

/// EMA value for every price; `None` until the seed window is complete
pub fn calculate_ema_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut ema = Ema::new(period);
    prices.iter().map(|&price| ema.update(price)).collect()
}

/// Streaming EMA carrying its own seed accumulator
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: f64,
    seed_sum: f64,
    count: usize,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            multiplier: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            count: 0,
            value: None,
        }
    }

    /// Feed the next price and return the EMA once seeded
    pub fn update(&mut self, price: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }

        self.count += 1;
        match self.value {
            Some(ema) => {
                self.value = Some((price - ema) * self.multiplier + ema);
            }
            None => {
                self.seed_sum += price;
                if self.count == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }

        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn period(&self) -> usize {
        self.period
    }
}
