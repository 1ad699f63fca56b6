//! Trading-session gate: day-of-week and local-hour window checks.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;

/// Permitted trading window. The timestamp under test is always passed in,
/// never read from the wall clock here.
#[derive(Debug, Clone)]
pub struct TradingWindow {
    tz: Tz,
    days: Vec<Weekday>,
    open_hour: u32,
    close_hour: u32,
}

impl TradingWindow {
    pub fn new(tz: Tz, days: Vec<Weekday>, open_hour: u32, close_hour: u32) -> Self {
        Self {
            tz,
            days,
            open_hour,
            close_hour,
        }
    }

    /// Monday through Friday between the given local hours.
    pub fn weekdays(tz: Tz, open_hour: u32, close_hour: u32) -> Self {
        Self::new(
            tz,
            vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            open_hour,
            close_hour,
        )
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz);
        self.days.contains(&local.weekday())
            && local.hour() >= self.open_hour
            && local.hour() < self.close_hour
    }

    pub fn describe(&self) -> String {
        format!(
            "{:02}:00-{:02}:00 {} on {} day(s)/week",
            self.open_hour,
            self.close_hour,
            self.tz,
            self.days.len()
        )
    }
}
