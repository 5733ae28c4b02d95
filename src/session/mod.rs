// Trading session window
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Daily trading window in a fixed-offset timezone
///
/// Entries are allowed for `start <= t < end`. From `end` until midnight the
/// window is in force-flatten. The window may not wrap midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Offset from UTC, in seconds east
    pub utc_offset_secs: i32,
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN),
            utc_offset_secs: 0,
        }
    }
}

impl SessionWindow {
    pub fn new(
        start: NaiveTime,
        end: NaiveTime,
        utc_offset_secs: i32,
    ) -> Result<Self, SessionError> {
        if start >= end {
            return Err(SessionError::InvertedWindow { start, end });
        }
        if FixedOffset::east_opt(utc_offset_secs).is_none() {
            return Err(SessionError::InvalidOffset(utc_offset_secs));
        }
        Ok(Self {
            start,
            end,
            utc_offset_secs,
        })
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }
}

/// Stateless clock over a [`SessionWindow`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionClock {
    window: SessionWindow,
}

impl SessionClock {
    pub fn new(window: SessionWindow) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &SessionWindow {
        &self.window
    }

    fn local(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        now.with_timezone(&self.window.offset())
    }

    /// Calendar day in the window's timezone; daily counters key off this
    pub fn session_day(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local(now).date_naive()
    }

    /// New positions may only be opened inside the window
    pub fn is_trading_allowed(&self, now: DateTime<Utc>) -> bool {
        let t = self.local(now).time();
        t >= self.window.start && t < self.window.end
    }

    /// True from `end` until the day rolls over
    pub fn is_force_flatten_time(&self, now: DateTime<Utc>) -> bool {
        self.local(now).time() >= self.window.end
    }

    /// A position opened at `opened_at` may not be held at `now`: the window
    /// is closed, or the position belongs to an earlier session day
    pub fn must_be_flat(&self, opened_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        !self.is_trading_allowed(now) || self.session_day(opened_at) < self.session_day(now)
    }
}
