//! Wall-clock source in the configured timezone

use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Source of "now", always expressed in one process-wide timezone
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Tz>;
}

/// Real time in a fixed IANA zone
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}

/// Manually driven clock for tests and one-shot operator commands
pub struct ManualClock {
    now: Mutex<DateTime<Tz>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Tz>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Build from a local wall-clock time in `tz`. Ambiguous times pick the earlier instant.
    pub fn at_local(tz: Tz, local: NaiveDateTime) -> Option<Self> {
        tz.from_local_datetime(&local).earliest().map(Self::new)
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Tz> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
