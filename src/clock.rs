//! Time source for timestamps written into statements.

use chrono::{DateTime, Local, NaiveDateTime, Utc};

/// Format used for every datetime literal the translator emits.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub trait Clock: Send + Sync {
    /// Current local wall-clock time.
    fn local(&self) -> NaiveDateTime;
    /// Current UTC time.
    fn utc(&self) -> NaiveDateTime;

    fn now(&self, utc: bool) -> String {
        let at = if utc { self.utc() } else { self.local() };
        at.format(DATETIME_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn local(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn utc(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// A clock stopped at one instant, with a fixed offset between local and UTC.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    utc: DateTime<Utc>,
    offset_hours: i64,
}

impl FixedClock {
    pub fn new(utc: DateTime<Utc>) -> Self {
        Self { utc, offset_hours: 0 }
    }

    pub fn with_offset(mut self, hours: i64) -> Self {
        self.offset_hours = hours;
        self
    }
}

impl Clock for FixedClock {
    fn local(&self) -> NaiveDateTime {
        self.utc.naive_utc() + chrono::Duration::hours(self.offset_hours)
    }

    fn utc(&self) -> NaiveDateTime {
        self.utc.naive_utc()
    }
}
