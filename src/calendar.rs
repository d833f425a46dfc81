use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Longest run of consecutive non-working days a shift will walk through
/// before giving up.
pub const MAX_NON_WORKING_RUN: u32 = 3660;

/// Answers whether a date counts as a working day.
///
/// The resolver only ever asks this one question; everything else (weekends,
/// holidays, company closures) is the implementor's business.
pub trait WorkingDayCalendar {
    fn is_working_day(&self, date: NaiveDate) -> bool;

    /// Shift `date` by `days` working days. See [`shift_working_days`].
    fn shift(&self, date: NaiveDate, days: i64) -> Option<NaiveDate> {
        shift_working_days(self, date, days)
    }
}

impl<C: WorkingDayCalendar + ?Sized> WorkingDayCalendar for &C {
    fn is_working_day(&self, date: NaiveDate) -> bool {
        (**self).is_working_day(date)
    }
}

/// Walk `days` working days forward (positive) or backward (negative) from
/// `date`, one calendar day at a time, skipping non-working days.
///
/// A shift of zero returns `date` unchanged, even when `date` itself is not a
/// working day. Returns `None` when the shift cannot fit in chrono's date
/// range or the walk meets more than [`MAX_NON_WORKING_RUN`] non-working days
/// in a row.
pub fn shift_working_days<C: WorkingDayCalendar + ?Sized>(
    calendar: &C,
    date: NaiveDate,
    days: i64,
) -> Option<NaiveDate> {
    let forward = days >= 0;
    let mut remaining = days.unsigned_abs();
    // Fewer calendar days left than working days asked for.
    let room = if forward {
        NaiveDate::MAX.signed_duration_since(date)
    } else {
        date.signed_duration_since(NaiveDate::MIN)
    };
    if remaining > room.num_days().unsigned_abs() {
        tracing::error!(%date, days, "shift runs past the supported date range");
        return None;
    }
    let mut current = date;
    let mut idle_run = 0u32;

    while remaining > 0 {
        current = if forward {
            current.checked_add_days(Days::new(1))?
        } else {
            current.checked_sub_days(Days::new(1))?
        };
        if calendar.is_working_day(current) {
            remaining -= 1;
            idle_run = 0;
        } else {
            idle_run += 1;
            if idle_run > MAX_NON_WORKING_RUN {
                tracing::error!(
                    %date,
                    days,
                    "no working day found within {MAX_NON_WORKING_RUN} days, giving up on shift"
                );
                return None;
            }
        }
    }
    Some(current)
}

/// Count working days in the inclusive range `[start, end]`.
pub fn count_working_days<C: WorkingDayCalendar + ?Sized>(
    calendar: &C,
    start: NaiveDate,
    end: NaiveDate,
) -> i64 {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| calendar.is_working_day(*day))
        .count() as i64
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("calendar requires at least one working weekday")]
    NoWorkingDays,
    #[error("invalid holiday year range {start}..={end}")]
    InvalidYearRange { start: i32, end: i32 },
}

/// Weekday/holiday calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkCalendar {
    holidays: HashSet<NaiveDate>,
    non_working_days: HashSet<Weekday>,
}

/// Serializable description of a [`WorkCalendar`]: working weekdays plus an
/// explicit holiday list, both kept sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkCalendarConfig {
    working_days: Vec<Weekday>,
    #[serde(default)]
    holidays: Vec<NaiveDate>,
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self::weekends_only()
    }
}

impl WorkCalendar {
    const ALL_WEEKDAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    /// Monday to Friday, no holidays.
    pub fn weekends_only() -> Self {
        Self {
            holidays: HashSet::new(),
            non_working_days: HashSet::from([Weekday::Sat, Weekday::Sun]),
        }
    }

    /// Monday to Friday with US federal holidays for `start_year..=end_year`.
    pub fn with_us_holidays(start_year: i32, end_year: i32) -> Result<Self, CalendarError> {
        if start_year > end_year {
            return Err(CalendarError::InvalidYearRange {
                start: start_year,
                end: end_year,
            });
        }
        let mut calendar = Self::weekends_only();
        for year in start_year..=end_year {
            calendar.add_us_holidays(year);
        }
        Ok(calendar)
    }

    pub fn custom<I, J>(working_days: I, holidays: J) -> Result<Self, CalendarError>
    where
        I: IntoIterator<Item = Weekday>,
        J: IntoIterator<Item = NaiveDate>,
    {
        let config = WorkCalendarConfig::new(working_days, holidays)?;
        Ok(Self::from_config(&config))
    }

    pub fn from_config(config: &WorkCalendarConfig) -> Self {
        let working: HashSet<Weekday> = config.working_days.iter().copied().collect();
        let non_working_days = Self::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !working.contains(day))
            .collect();
        Self {
            holidays: config.holidays.iter().copied().collect(),
            non_working_days,
        }
    }

    pub fn to_config(&self) -> WorkCalendarConfig {
        WorkCalendarConfig::from(self)
    }

    pub fn add_us_holidays(&mut self, year: i32) {
        let fixed = [(1, 1), (7, 4), (11, 11), (12, 25)];
        for (month, day) in fixed {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                self.holidays.insert(date);
            }
        }

        // MLK, Presidents', Labor, Columbus, Thanksgiving
        let floating = [
            (1, Weekday::Mon, 3),
            (2, Weekday::Mon, 3),
            (9, Weekday::Mon, 1),
            (10, Weekday::Mon, 2),
            (11, Weekday::Thu, 4),
        ];
        for (month, weekday, n) in floating {
            if let Some(date) = NaiveDate::from_weekday_of_month_opt(year, month, weekday, n) {
                self.holidays.insert(date);
            }
        }

        // Memorial Day
        if let Some(date) = Self::last_weekday(year, 5, Weekday::Mon) {
            self.holidays.insert(date);
        }
    }

    fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
        let first_of_next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        let mut date = first_of_next.pred_opt()?;
        while date.weekday() != weekday {
            date = date.pred_opt()?;
        }
        Some(date)
    }

    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.holidays.insert(date);
    }

    pub fn add_holidays(&mut self, dates: &[NaiveDate]) {
        self.holidays.extend(dates);
    }

    /// Add the same month/day as a holiday for every year in the range.
    pub fn add_recurring_holiday(&mut self, month: u32, day: u32, start_year: i32, end_year: i32) {
        for year in start_year..=end_year {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                self.holidays.insert(date);
            }
        }
    }

    /// Replace the working week (e.g. Mon-Sat for six-day weeks).
    pub fn set_working_days(&mut self, days: &[Weekday]) -> Result<(), CalendarError> {
        if days.is_empty() {
            return Err(CalendarError::NoWorkingDays);
        }
        self.non_working_days = Self::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !days.contains(day))
            .collect();
        Ok(())
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }
}

impl WorkingDayCalendar for WorkCalendar {
    fn is_working_day(&self, date: NaiveDate) -> bool {
        !self.holidays.contains(&date) && !self.non_working_days.contains(&date.weekday())
    }
}

impl WorkCalendarConfig {
    pub fn new<I, J>(working_days: I, holidays: J) -> Result<Self, CalendarError>
    where
        I: IntoIterator<Item = Weekday>,
        J: IntoIterator<Item = NaiveDate>,
    {
        let mut working: Vec<Weekday> = working_days.into_iter().collect();
        if working.is_empty() {
            return Err(CalendarError::NoWorkingDays);
        }
        working.sort_by_key(|wd| wd.num_days_from_monday());
        working.dedup();

        let mut holidays: Vec<NaiveDate> = holidays.into_iter().collect();
        holidays.sort();
        holidays.dedup();

        Ok(Self {
            working_days: working,
            holidays,
        })
    }

    pub fn working_days(&self) -> &[Weekday] {
        &self.working_days
    }

    pub fn holidays(&self) -> &[NaiveDate] {
        &self.holidays
    }

    /// Configs come from user files, so re-check what `new` guarantees.
    pub fn validate(&self) -> Result<(), CalendarError> {
        if self.working_days.is_empty() {
            return Err(CalendarError::NoWorkingDays);
        }
        Ok(())
    }
}

impl From<&WorkCalendar> for WorkCalendarConfig {
    fn from(calendar: &WorkCalendar) -> Self {
        let working_days = WorkCalendar::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !calendar.non_working_days.contains(day))
            .collect();
        let mut holidays: Vec<NaiveDate> = calendar.holidays.iter().copied().collect();
        holidays.sort();
        Self {
            working_days,
            holidays,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn shift_beyond_date_range_fails_fast() {
        let cal = WorkCalendar::weekends_only();
        let start = d(2024, 1, 1);
        let begun = std::time::Instant::now();
        assert_eq!(cal.shift(start, 1_000_000_000_000), None);
        assert_eq!(cal.shift(start, -1_000_000_000_000), None);
        assert_eq!(cal.shift(start, i64::MIN), None);
        assert!(begun.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn zero_shift_keeps_non_working_date() {
        let cal = WorkCalendar::weekends_only();
        let sat = d(2024, 1, 6);
        assert_eq!(cal.shift(sat, 0), Some(sat));
    }

    #[test]
    fn shift_gives_up_without_working_days() {
        struct Never;
        impl WorkingDayCalendar for Never {
            fn is_working_day(&self, _: NaiveDate) -> bool {
                false
            }
        }
        assert_eq!(Never.shift(d(2024, 1, 1), 1), None);
    }

    #[test]
    fn us_holidays_cover_floating_dates() {
        let cal = WorkCalendar::with_us_holidays(2025, 2025).unwrap();
        // Thanksgiving 2025 and Memorial Day 2025
        assert!(cal.is_holiday(d(2025, 11, 27)));
        assert!(cal.is_holiday(d(2025, 5, 26)));
        assert!(!cal.is_working_day(d(2025, 1, 20)));
    }

    #[test]
    fn inverted_year_range_is_rejected() {
        assert_eq!(
            WorkCalendar::with_us_holidays(2026, 2025),
            Err(CalendarError::InvalidYearRange {
                start: 2026,
                end: 2025
            })
        );
    }

    #[test]
    fn config_round_trip_keeps_working_week() {
        let cal = WorkCalendar::custom([Weekday::Sat, Weekday::Mon], [d(2024, 3, 4)]).unwrap();
        let config = cal.to_config();
        assert_eq!(config.working_days(), &[Weekday::Mon, Weekday::Sat]);
        assert_eq!(WorkCalendar::from_config(&config), cal);
    }
}
