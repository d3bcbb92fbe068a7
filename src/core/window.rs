use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Local, NaiveTime, TimeDelta};

/// Query window for usage reconstruction.
///
/// All aggregations over the same window must share one pinned `end` read
/// from a single clock call, otherwise per-device totals drift apart.
#[derive(Copy, Clone, Eq, PartialEq)]
#[must_use]
pub struct Window {
    /// Inclusive.
    pub start: DateTime<Local>,

    /// Exclusive.
    pub end: DateTime<Local>,
}

impl Debug for Window {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}..{:?}", self.start, self.end)
    }
}

impl Window {
    pub const fn new(start: DateTime<Local>, end: DateTime<Local>) -> Self {
        Self { start, end }
    }

    /// Window from local midnight up to `now`.
    pub fn today(now: DateTime<Local>) -> Self {
        let midnight = now.with_time(NaiveTime::MIN).single().unwrap_or(now);
        Self { start: midnight, end: now }
    }

    #[must_use]
    pub fn duration(self) -> TimeDelta {
        self.end - self.start
    }

    #[must_use]
    pub fn contains(self, other: DateTime<Local>) -> bool {
        (self.start <= other) && (other < self.end)
    }
}
