use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

/// Source of "now" and of the family's wall-clock calendar.
///
/// All day boundaries (what "today" is, when a time-of-day falls) are
/// computed in the clock's fixed offset, which is the single authoritative
/// wall clock for a family.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn offset(&self) -> FixedOffset;

    /// The current calendar date in family time.
    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.offset()).date_naive()
    }

    /// The instant at which `time` falls on `date` in family time.
    fn instant_at(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        // A fixed offset has no gaps or folds, so the mapping is always single.
        match self.offset().from_local_datetime(&local) {
            chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
            _ => Utc.from_utc_datetime(&local),
        }
    }

    /// Last second of `date` in family time.
    fn end_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
        self.instant_at(date, last_second)
    }
}

/// The real wall clock.
#[derive(Debug, Clone)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Uses the host's current local offset.
    pub fn local() -> Self {
        Self {
            offset: *Local::now().offset(),
        }
    }

    /// Uses a fixed offset from UTC in minutes. Out-of-range values fall
    /// back to UTC.
    pub fn with_offset_minutes(minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix());
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// A frozen clock for tests and replays. Can be moved forward explicitly.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

impl FixedClock {
    /// A clock frozen at `now`, with family time equal to UTC.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self::with_offset(now, Utc.fix())
    }

    pub fn with_offset(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now: Mutex::new(now),
            offset,
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}
