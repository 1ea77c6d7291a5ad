use crate::errors::InvalidIntervalError;
use chrono::{DateTime, Days, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// An immutable `[from, to]` instant pair. Either endpoint may be absent,
/// in which case the interval is open on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl Interval {
    pub fn of(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Self, InvalidIntervalError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(InvalidIntervalError(format!(
                    "from {} is after to {}",
                    from, to
                )));
            }
        }
        Ok(Self { from, to })
    }

    pub fn closed(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, InvalidIntervalError> {
        Self::of(Some(from), Some(to))
    }

    pub fn from(&self) -> Option<DateTime<Utc>> {
        self.from
    }

    pub fn to(&self) -> Option<DateTime<Utc>> {
        self.to
    }

    /// Both endpoints, when the interval is closed.
    pub fn bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.from?, self.to?))
    }

    /// Replaces an absent `to` with `now`; a present `to` is left untouched.
    pub fn limit_by_now(self, now: DateTime<Utc>) -> Self {
        Self {
            from: self.from,
            to: self.to.or(Some(now)),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| instant >= from)
            && self.to.map_or(true, |to| instant <= to)
    }

    /// Fractional day count via exact duration division. Zero when open.
    pub fn to_days(&self) -> Decimal {
        match self.bounds() {
            Some((from, to)) => {
                Decimal::from((to - from).num_seconds()) / Decimal::from(SECONDS_PER_DAY)
            }
            None => Decimal::ZERO,
        }
    }

    /// Lazily splits the interval into sub-intervals that each lie wholly
    /// within one calendar day. The first sub-interval starts at `from`,
    /// the last one ends at `to`, and interior boundaries sit at
    /// start-of-day/end-of-day. Each call restarts the sequence. An open
    /// interval yields nothing.
    pub fn split_into_daily_intervals(&self) -> DailyIntervals {
        DailyIntervals {
            remaining: self.bounds(),
        }
    }
}

pub struct DailyIntervals {
    remaining: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl Iterator for DailyIntervals {
    type Item = Interval;

    fn next(&mut self) -> Option<Interval> {
        let (start, end) = self.remaining?;
        let next_day_start = (start.date_naive() + Days::new(1))
            .and_time(NaiveTime::MIN)
            .and_utc();
        if next_day_start > end {
            self.remaining = None;
            return Some(Interval {
                from: Some(start),
                to: Some(end),
            });
        }
        self.remaining = Some((next_day_start, end));
        Some(Interval {
            from: Some(start),
            to: Some(next_day_start - Duration::nanoseconds(1)),
        })
    }
}
