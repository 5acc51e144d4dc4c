use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Timelike, Utc};

/// Maps instants onto the local calendar used for streak days, quest days and
/// time-of-day badges.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    offset: FixedOffset,
}

impl Default for LocalClock {
    fn default() -> Self {
        Self { offset: Utc.fix() }
    }
}

impl LocalClock {
    pub fn new(utc_offset_minutes: i32) -> Self {
        match FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)) {
            Some(offset) => Self { offset },
            None => {
                tracing::warn!(utc_offset_minutes, "Invalid UTC offset, falling back to UTC");
                Self::default()
            }
        }
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// `YYYY-MM-DD`
    pub fn date_key(&self, at: DateTime<Utc>) -> String {
        self.local_date(at).format("%Y-%m-%d").to_string()
    }

    /// ISO week, e.g. `2024-W07`.
    pub fn week_key(&self, at: DateTime<Utc>) -> String {
        let week = self.local_date(at).iso_week();
        format!("{}-W{:02}", week.year(), week.week())
    }

    pub fn local_hour(&self, at: DateTime<Utc>) -> u32 {
        at.with_timezone(&self.offset).hour()
    }

    /// Whole local calendar days from `earlier` to `later`; negative when clocks disagree.
    pub fn days_between(&self, earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
        (self.local_date(later) - self.local_date(earlier)).num_days()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn offset_moves_the_day_boundary() {
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 23, 30, 0).unwrap();
        assert_eq!(LocalClock::default().date_key(at), "2024-03-10");
        assert_eq!(LocalClock::new(60).date_key(at), "2024-03-11");
        assert_eq!(LocalClock::new(60).local_hour(at), 0);
    }

    #[test]
    fn days_between_counts_calendar_days() {
        let clock = LocalClock::default();
        let late = Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 0).unwrap();
        let early_next = Utc.with_ymd_and_hms(2024, 3, 11, 0, 1, 0).unwrap();
        assert_eq!(clock.days_between(late, early_next), 1);
        assert_eq!(clock.days_between(early_next, late), -1);
    }

    #[test]
    fn iso_week_key_crosses_year() {
        let at = Utc.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(LocalClock::default().week_key(at), "2020-W53");
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 23, 30, 0).unwrap();
        assert_eq!(LocalClock::new(i32::MAX).date_key(at), "2024-03-10");
    }
}
