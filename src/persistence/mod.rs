use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::execution::{ClosedTrade, Position};
use crate::risk::TradingState;
use crate::Result;

pub const TRADE_LOG_FILE: &str = "trades.jsonl";
pub const STATE_FILE: &str = "state.json";

/// Append-only JSON-lines log with one record per closed position
pub struct TradeJournal {
    path: PathBuf,
}

impl TradeJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Journal at `<dir>/trades.jsonl`, creating the directory if needed
    pub fn in_dir(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self::new(dir.join(TRADE_LOG_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, trade: &ClosedTrade) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(trade)?;
        writeln!(file, "{}", line)?;
        file.flush()?;

        tracing::info!(
            path = %self.path.display(),
            pnl = trade.pnl,
            "Journaled {:?} exit of {}",
            trade.exit_reason,
            trade.symbol
        );
        Ok(())
    }

    /// All journaled trades, oldest first. A missing file is an empty log.
    pub fn load(&self) -> Result<Vec<ClosedTrade>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut trades = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            trades.push(serde_json::from_str(&line)?);
        }
        Ok(trades)
    }
}

/// What survives a restart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub position: Option<Position>,
    pub trading_state: TradingState,
    pub saved_at: DateTime<Utc>,
}

/// Snapshot of the position and daily counters, rewritten on every change
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<dir>/state.json`, creating the directory if needed
    pub fn in_dir(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self::new(dir.join(STATE_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write to a temp file then rename, so a crash never leaves half a file
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "State saved");
        Ok(())
    }

    pub fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "No state file found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)?;
        let state: PersistedState = serde_json::from_str(&json)?;
        tracing::info!(
            path = %self.path.display(),
            open_position = state.position.is_some(),
            daily_trades = state.trading_state.daily_trades,
            "State loaded (saved {})",
            state.saved_at
        );
        Ok(Some(state))
    }
}
