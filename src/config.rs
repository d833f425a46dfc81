use crate::calendar::{CalendarError, WorkCalendar, WorkCalendarConfig};
use crate::validation::MAX_STRUCTURE_DEPTH;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid calendar: {0}")]
    Calendar(#[from] CalendarError),
    #[error("max_structure_depth must be at least 1")]
    ZeroDepth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayYears {
    pub start: i32,
    pub end: i32,
}

/// Resolver settings, usually read from a JSON file next to the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Working week and explicit holidays. Overrides a snapshot's calendar.
    pub calendar: Option<WorkCalendarConfig>,
    /// Add US federal holidays for this range on top of the working week.
    pub holiday_years: Option<HolidayYears>,
    pub max_structure_depth: usize,
    /// Refuse to resolve trees containing predecessor cycles.
    pub strict_cycles: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            calendar: None,
            holiday_years: None,
            max_structure_depth: MAX_STRUCTURE_DEPTH,
            strict_cycles: false,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_structure_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        if let Some(calendar) = &self.calendar {
            calendar.validate()?;
        }
        if let Some(HolidayYears { start, end }) = self.holiday_years {
            if start > end {
                return Err(CalendarError::InvalidYearRange { start, end }.into());
            }
        }
        Ok(())
    }

    /// Build the working calendar. The configured week wins over `fallback`
    /// (typically the snapshot's own calendar); with neither, Monday to
    /// Friday.
    pub fn calendar(
        &self,
        fallback: Option<&WorkCalendarConfig>,
    ) -> Result<WorkCalendar, CalendarError> {
        let mut calendar = match self.calendar.as_ref().or(fallback) {
            Some(config) => {
                config.validate()?;
                WorkCalendar::from_config(config)
            }
            None => WorkCalendar::weekends_only(),
        };
        if let Some(HolidayYears { start, end }) = self.holiday_years {
            if start > end {
                return Err(CalendarError::InvalidYearRange { start, end });
            }
            for year in start..=end {
                calendar.add_us_holidays(year);
            }
        }
        Ok(calendar)
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ResolverConfig, ConfigError> {
    let file = File::open(path)?;
    let config: ResolverConfig = serde_json::from_reader(BufReader::new(file))?;
    config.validate()?;
    Ok(config)
}
