//! Runtime configuration
//!
//! Loaded once at startup from the process environment (and `.env`), validated,
//! then handed to the components as immutable pieces.

use chrono::NaiveTime;
use config::{Config, Environment};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::TradingError;
use crate::indicators::IndicatorConfig;
use crate::risk::{CircuitBreakers, RiskConfig};
use crate::session::SessionWindow;
use crate::strategy::SignalConfig;
use crate::Result;

const TIME_FORMAT: &str = "%H:%M";

/// Flat view of every recognized option. Field names are the lowercased
/// environment variable names.
#[derive(Clone, Deserialize)]
pub struct BotConfig {
    pub api_key: String,
    pub api_secret: String,
    pub exchange_id: String,
    pub symbol: String,
    pub timeframe: String,

    pub risk_per_trade: f64,
    pub max_daily_trades: u32,
    pub leverage: f64,
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub max_order_quantity: Option<f64>,
    pub min_order_notional: f64,

    /// HH:MM in the session timezone
    pub trading_start: String,
    pub trading_end: String,
    pub trading_utc_offset_minutes: i32,

    pub poll_interval_secs: u64,
    /// Bars requested per fetch, including the still-forming one
    pub history_bars: usize,

    pub bb_proximity_pct: f64,
    pub min_signal_matches: u8,

    pub max_fetch_retries: u32,
    pub retry_base_delay_ms: u64,
    pub max_reconcile_attempts: u32,
    pub requests_per_minute: u32,

    pub state_dir: PathBuf,
    /// Exit an open position on shutdown instead of leaving it for recovery
    pub flatten_on_shutdown: bool,
}

impl BotConfig {
    /// Load from `.env` and the process environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::build(Environment::default())
    }

    /// Load from an explicit key/value map (keys as environment variable
    /// names), ignoring the process environment
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        Self::build(Environment::default().source(Some(vars)))
    }

    fn build(env: Environment) -> Result<Self> {
        let config = Config::builder()
            // Exchange defaults
            .set_default("api_key", "")?
            .set_default("api_secret", "")?
            .set_default("exchange_id", "binance")?
            .set_default("symbol", "BTC/USDT")?
            .set_default("timeframe", "15m")?
            // Risk defaults
            .set_default("risk_per_trade", 0.02)?
            .set_default("max_daily_trades", 3)?
            .set_default("leverage", 1.0)?
            .set_default("take_profit_pct", 0.03)?
            .set_default("stop_loss_pct", 0.01)?
            .set_default("min_order_notional", 10.0)?
            // Session defaults
            .set_default("trading_start", "09:00")?
            .set_default("trading_end", "20:00")?
            .set_default("trading_utc_offset_minutes", 0)?
            // Polling defaults
            .set_default("poll_interval_secs", 300)?
            .set_default("history_bars", 100)?
            // Signal defaults
            .set_default("bb_proximity_pct", 0.01)?
            .set_default("min_signal_matches", 2)?
            // Gateway defaults
            .set_default("max_fetch_retries", 3)?
            .set_default("retry_base_delay_ms", 1000)?
            .set_default("max_reconcile_attempts", 5)?
            .set_default("requests_per_minute", 600)?
            // Runtime defaults
            .set_default("state_dir", "./state")?
            .set_default("flatten_on_shutdown", true)?
            .add_source(env)
            .build()?;

        let bot_config: BotConfig = config.try_deserialize()?;
        bot_config.validate()?;
        Ok(bot_config)
    }

    /// Reject values that would make the agent trade nonsensically
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: String) -> TradingError {
            TradingError::Config(msg)
        }

        if !(self.risk_per_trade > 0.0 && self.risk_per_trade <= 1.0) {
            return Err(invalid(format!(
                "RISK_PER_TRADE must be in (0, 1], got {}",
                self.risk_per_trade
            )));
        }
        if !(self.leverage >= 1.0 && self.leverage.is_finite()) {
            return Err(invalid(format!(
                "LEVERAGE must be >= 1, got {}",
                self.leverage
            )));
        }
        for (name, value) in [
            ("TAKE_PROFIT_PCT", self.take_profit_pct),
            ("STOP_LOSS_PCT", self.stop_loss_pct),
            ("BB_PROXIMITY_PCT", self.bb_proximity_pct),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(invalid(format!("{} must be in (0, 1), got {}", name, value)));
            }
        }
        if let Some(max) = self.max_order_quantity {
            if max <= 0.0 {
                return Err(invalid(format!(
                    "MAX_ORDER_QUANTITY must be positive, got {}",
                    max
                )));
            }
        }
        if self.min_order_notional < 0.0 {
            return Err(invalid(format!(
                "MIN_ORDER_NOTIONAL must not be negative, got {}",
                self.min_order_notional
            )));
        }
        if !(1..=4).contains(&self.min_signal_matches) {
            return Err(invalid(format!(
                "MIN_SIGNAL_MATCHES must be between 1 and 4, got {}",
                self.min_signal_matches
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(invalid("POLL_INTERVAL_SECS must be positive".to_string()));
        }
        if self.requests_per_minute == 0 {
            return Err(invalid("REQUESTS_PER_MINUTE must be positive".to_string()));
        }
        if self.max_reconcile_attempts == 0 {
            return Err(invalid("MAX_RECONCILE_ATTEMPTS must be positive".to_string()));
        }

        // One bar is still forming and the first signal needs two snapshots
        let min_bars = IndicatorConfig::default().min_history() + 2;
        if self.history_bars < min_bars {
            return Err(invalid(format!(
                "HISTORY_BARS must be at least {}, got {}",
                min_bars, self.history_bars
            )));
        }

        self.timeframe_minutes()?;
        self.session_window()?;
        Ok(())
    }

    /// Bar length of TIMEFRAME ("1m", "15m", "1h", "4h", "1d") in minutes
    pub fn timeframe_minutes(&self) -> Result<i64> {
        let tf = self.timeframe.trim();
        let invalid = || TradingError::Config(format!("TIMEFRAME '{}' is not like 15m/1h/1d", tf));

        let unit = tf.chars().last().ok_or_else(invalid)?;
        let count: i64 = tf[..tf.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| invalid())?;
        let per_unit = match unit {
            'm' => 1,
            'h' => 60,
            'd' => 24 * 60,
            _ => return Err(invalid()),
        };
        if count <= 0 {
            return Err(invalid());
        }
        Ok(count * per_unit)
    }

    pub fn risk_config(&self) -> RiskConfig {
        RiskConfig {
            risk_per_trade: self.risk_per_trade,
            leverage: self.leverage,
            take_profit_pct: self.take_profit_pct,
            stop_loss_pct: self.stop_loss_pct,
            max_order_quantity: self.max_order_quantity,
            min_order_notional: self.min_order_notional,
        }
    }

    pub fn circuit_breakers(&self) -> CircuitBreakers {
        CircuitBreakers {
            max_daily_trades: self.max_daily_trades,
        }
    }

    pub fn signal_config(&self) -> SignalConfig {
        SignalConfig {
            bb_proximity_pct: self.bb_proximity_pct,
            min_matches: self.min_signal_matches,
            ..SignalConfig::default()
        }
    }

    pub fn indicator_config(&self) -> IndicatorConfig {
        IndicatorConfig::default()
    }

    pub fn session_window(&self) -> Result<SessionWindow> {
        let start = parse_time("TRADING_START", &self.trading_start)?;
        let end = parse_time("TRADING_END", &self.trading_end)?;
        Ok(SessionWindow::new(
            start,
            end,
            self.trading_utc_offset_minutes * 60,
        )?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    /// One-line summary without secrets, for the startup log
    pub fn digest(&self) -> String {
        format!(
            "exchange={} symbol={} timeframe={} risk={:.2}% leverage={}x tp={:.2}% sl={:.2}% \
             max_trades={} window={}-{} (UTC{:+}m) poll={}s",
            self.exchange_id,
            self.symbol,
            self.timeframe,
            self.risk_per_trade * 100.0,
            self.leverage,
            self.take_profit_pct * 100.0,
            self.stop_loss_pct * 100.0,
            self.max_daily_trades,
            self.trading_start,
            self.trading_end,
            self.trading_utc_offset_minutes,
            self.poll_interval_secs
        )
    }
}

fn parse_time(name: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|e| TradingError::Config(format!("{} '{}' is not HH:MM: {}", name, value, e)))
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &redact(&self.api_secret))
            .field("exchange_id", &self.exchange_id)
            .field("symbol", &self.symbol)
            .field("timeframe", &self.timeframe)
            .field("risk_per_trade", &self.risk_per_trade)
            .field("max_daily_trades", &self.max_daily_trades)
            .field("leverage", &self.leverage)
            .field("take_profit_pct", &self.take_profit_pct)
            .field("stop_loss_pct", &self.stop_loss_pct)
            .field("max_order_quantity", &self.max_order_quantity)
            .field("min_order_notional", &self.min_order_notional)
            .field("trading_start", &self.trading_start)
            .field("trading_end", &self.trading_end)
            .field("trading_utc_offset_minutes", &self.trading_utc_offset_minutes)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("history_bars", &self.history_bars)
            .field("bb_proximity_pct", &self.bb_proximity_pct)
            .field("min_signal_matches", &self.min_signal_matches)
            .field("max_fetch_retries", &self.max_fetch_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("max_reconcile_attempts", &self.max_reconcile_attempts)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("state_dir", &self.state_dir)
            .field("flatten_on_shutdown", &self.flatten_on_shutdown)
            .finish()
    }
}
