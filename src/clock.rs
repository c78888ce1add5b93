use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Calendar source for the gym: what day it is and which zone days are cut in.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
    fn timezone(&self) -> Tz;

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.timezone()).date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GymClock {
    tz: Tz,
}

impl GymClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for GymClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    fn timezone(&self) -> Tz {
        self.tz
    }
}

/// A clock stuck on one day, in UTC.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }

    fn timezone(&self) -> Tz {
        Tz::UTC
    }
}
