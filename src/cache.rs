use chrono::{Duration, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub const DEFAULT_DAYS_BEFORE: u32 = 3;
pub const DEFAULT_DAYS_AFTER: u32 = 7;

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DateRange {
    #[schema(value_type = String, format = "date", example = "2025-11-21")]
    pub start: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2025-12-01")]
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn union(&self, other: &DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// The window around `date` does not fit in the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no schedule window fits around {date}")]
pub struct WindowOutOfRange {
    pub date: NaiveDate,
}

/// Window of schedule days already known to be fresh.
#[derive(Debug, Clone)]
pub struct DateRangeCache {
    loaded: Option<DateRange>,
    days_before: u32,
    days_after: u32,
}

impl Default for DateRangeCache {
    fn default() -> Self {
        Self::new(DEFAULT_DAYS_BEFORE, DEFAULT_DAYS_AFTER)
    }
}

impl DateRangeCache {
    pub fn new(days_before: u32, days_after: u32) -> Self {
        Self {
            loaded: None,
            days_before,
            days_after,
        }
    }

    pub fn loaded(&self) -> Option<DateRange> {
        self.loaded
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.loaded.is_some_and(|range| range.contains(date))
    }

    /// Range to request so that `requested` becomes covered, or `None` on a
    /// cache hit. The result always contains the current window.
    pub fn plan(
        &self,
        requested: NaiveDate,
        today: NaiveDate,
    ) -> Result<Option<DateRange>, WindowOutOfRange> {
        if self.covers(requested) {
            return Ok(None);
        }

        let before = Duration::days(self.days_before.into());
        let after = Duration::days(self.days_after.into());
        let out_of_range = WindowOutOfRange { date: requested };
        let earlier = |date: NaiveDate| date.checked_sub_signed(before).ok_or(out_of_range);
        let later = |date: NaiveDate| date.checked_add_signed(after).ok_or(out_of_range);

        let mut start = earlier(today)?;
        let mut end = later(today)?;
        if requested < start {
            start = earlier(requested)?;
        }
        if requested > end {
            end = later(requested)?;
        }

        let wanted = DateRange { start, end };
        Ok(Some(match self.loaded {
            Some(current) => current.union(&wanted),
            None => wanted,
        }))
    }

    /// Records a successful fetch of exactly `range`.
    pub fn commit(&mut self, range: DateRange) {
        self.loaded = Some(range);
    }

    pub fn reset(&mut self) {
        self.loaded = None;
    }
}
