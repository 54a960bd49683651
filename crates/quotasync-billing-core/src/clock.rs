//! Calendar source for "today"

use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Source of the current instant and calendar day
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar day in the configured zone
    fn today(&self) -> NaiveDate;

    /// First instant of `day` in the configured zone
    fn start_of_day(&self, day: NaiveDate) -> DateTime<Utc>;
}

/// Wall clock in a fixed time zone
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    /// Create a clock for an IANA zone
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// The configured zone
    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    fn start_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        local_midnight(&self.tz, day)
    }
}

/// Midnight of `day` in `tz`; days that skip midnight use the earliest valid instant
fn local_midnight(tz: &Tz, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(chrono::NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Manually driven UTC clock
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Clock standing at noon UTC of `day`
    pub fn on(day: NaiveDate) -> Self {
        Self {
            now: Mutex::new(noon(day)),
        }
    }

    /// Move the clock to noon UTC of `day`
    pub fn set_day(&self, day: NaiveDate) {
        if let Ok(mut now) = self.now.lock() {
            *now = noon(day);
        }
    }
}

fn noon(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN)) + chrono::Duration::hours(12)
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn start_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        local_midnight(&Tz::UTC, day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_moves() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let clock = FixedClock::on(day);
        assert_eq!(clock.today(), day);

        let next = day.succ_opt().unwrap();
        clock.set_day(next);
        assert_eq!(clock.today(), next);
    }

    #[test]
    fn test_start_of_day_in_zone() {
        let clock = SystemClock::new(chrono_tz::Asia::Shanghai);
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let start = clock.start_of_day(day);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 4, 30, 16, 0, 0).unwrap());
    }
}
