//! Cron schedules for recurring tasks.
//!
//! Expressions use the five-field crontab layout
//! `minute hour day-of-month month day-of-week`, evaluated in UTC with
//! minute resolution. Each field accepts `*`, `N`, `A-B`, `*/S`, `A-B/S`,
//! `N/S`, and comma-separated lists of those. Months and weekdays also accept
//! three-letter English names. Day-of-week `7` is an alias for Sunday.

use super::TaskDomainError;
use chrono::{DateTime, Datelike, DurationRound, NaiveDate, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Years searched ahead before a schedule is declared unsatisfiable.
const SEARCH_HORIZON_YEARS: i32 = 9;

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    name_offset: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    name_offset: 0,
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    name_offset: 0,
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    name_offset: 0,
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: &MONTH_NAMES,
    name_offset: 1,
};
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: &WEEKDAY_NAMES,
    name_offset: 0,
};

/// A parsed, validated cron schedule.
///
/// The original expression is retained for display and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CronSchedule {
    expression: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    day_of_month_restricted: bool,
    day_of_week_restricted: bool,
}

impl CronSchedule {
    /// Parses and validates a five-field cron expression.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidSchedule`] when the expression does
    /// not have five fields, a field is malformed or out of range, or the
    /// day-of-month and month combination can never occur.
    pub fn parse(expression: &str) -> Result<Self, TaskDomainError> {
        let invalid = |reason: String| TaskDomainError::InvalidSchedule {
            expression: expression.to_owned(),
            reason,
        };

        let fields: Vec<&str> = expression.split_whitespace().collect();
        let [minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
            return Err(invalid(format!(
                "expected 5 fields (minute hour day-of-month month day-of-week), found {}",
                fields.len()
            )));
        };

        let raw_days_of_week = parse_field(day_of_week, DAY_OF_WEEK).map_err(invalid)?;
        let sunday_alias = 1_u64 << 7;
        let days_of_week = if raw_days_of_week & sunday_alias == 0 {
            raw_days_of_week
        } else {
            (raw_days_of_week & !sunday_alias) | 1
        };

        let schedule = Self {
            expression: fields.join(" "),
            minutes: parse_field(minute, MINUTE).map_err(invalid)?,
            hours: parse_field(hour, HOUR).map_err(invalid)?,
            days_of_month: parse_field(day_of_month, DAY_OF_MONTH).map_err(invalid)?,
            months: parse_field(month, MONTH).map_err(invalid)?,
            days_of_week,
            day_of_month_restricted: !day_of_month.starts_with('*'),
            day_of_week_restricted: !day_of_week.starts_with('*'),
        };

        if !schedule.has_reachable_day() {
            return Err(invalid(
                "day-of-month never occurs in the selected months".to_owned(),
            ));
        }
        Ok(schedule)
    }

    /// Returns the normalized expression.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// Returns the first matching minute at or after `instant`.
    ///
    /// An instant that lies exactly on a matching minute boundary is returned
    /// unchanged; otherwise the search starts at the following minute.
    /// Returns `None` if no match exists within the search horizon.
    #[must_use]
    pub fn next_at_or_after(&self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = ceil_to_minute(instant)?;
        let horizon_year = candidate.year().checked_add(SEARCH_HORIZON_YEARS)?;

        while candidate.year() <= horizon_year {
            if !bit_set(self.months, candidate.month()) {
                candidate = start_of_next_month(candidate)?;
            } else if !self.day_matches(candidate.date_naive()) {
                candidate = start_of_next_day(candidate)?;
            } else if !bit_set(self.hours, candidate.hour()) {
                candidate = start_of_next_hour(candidate)?;
            } else if !bit_set(self.minutes, candidate.minute()) {
                candidate = candidate.checked_add_signed(TimeDelta::minutes(1))?;
            } else {
                return Some(candidate);
            }
        }
        None
    }

    /// Returns the first matching minute strictly after `instant`.
    #[must_use]
    pub fn next_after(&self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let floor = instant.duration_trunc(TimeDelta::minutes(1)).ok()?;
        self.next_at_or_after(floor.checked_add_signed(TimeDelta::minutes(1))?)
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let day_of_month = bit_set(self.days_of_month, date.day());
        let day_of_week = bit_set(self.days_of_week, date.weekday().num_days_from_sunday());
        if self.day_of_month_restricted && self.day_of_week_restricted {
            day_of_month || day_of_week
        } else {
            day_of_month && day_of_week
        }
    }

    fn has_reachable_day(&self) -> bool {
        if self.day_of_week_restricted && self.day_of_month_restricted {
            return true;
        }
        (1..=12_u32)
            .filter(|month| bit_set(self.months, *month))
            .any(|month| (1..=max_days_in_month(month)).any(|day| bit_set(self.days_of_month, day)))
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.expression)
    }
}

impl TryFrom<String> for CronSchedule {
    type Error = TaskDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CronSchedule> for String {
    fn from(schedule: CronSchedule) -> Self {
        schedule.expression
    }
}

fn parse_field(field: &str, spec: FieldSpec) -> Result<u64, String> {
    let mut bits = 0_u64;
    for part in field.split(',') {
        bits |= parse_part(part, spec)?;
    }
    Ok(bits)
}

fn parse_part(part: &str, spec: FieldSpec) -> Result<u64, String> {
    let (range, step) = match part.split_once('/') {
        Some((range, step)) => (range, Some(parse_step(step, spec)?)),
        None => (part, None),
    };

    let (start, end) = if range == "*" {
        (spec.min, spec.max)
    } else if let Some((low, high)) = range.split_once('-') {
        (parse_value(low, spec)?, parse_value(high, spec)?)
    } else {
        let value = parse_value(range, spec)?;
        if step.is_some() {
            (value, spec.max)
        } else {
            (value, value)
        }
    };

    if start > end {
        return Err(format!(
            "{} range {start}-{end} is descending",
            spec.name
        ));
    }

    let mut bits = 0_u64;
    let mut value = start;
    while value <= end {
        bits |= 1_u64 << value;
        value = value.saturating_add(step.unwrap_or(1));
    }
    Ok(bits)
}

fn parse_step(step: &str, spec: FieldSpec) -> Result<u32, String> {
    match step.parse::<u32>() {
        Ok(0) | Err(_) => Err(format!("{} step '{step}' must be a positive integer", spec.name)),
        Ok(value) => Ok(value),
    }
}

fn parse_value(token: &str, spec: FieldSpec) -> Result<u32, String> {
    if token.is_empty() {
        return Err(format!("{} field has an empty value", spec.name));
    }

    let lowered = token.to_ascii_lowercase();
    let named = spec
        .names
        .iter()
        .zip(spec.name_offset..)
        .find_map(|(name, value)| (*name == lowered).then_some(value));

    let value = match named {
        Some(value) => value,
        None => token
            .parse::<u32>()
            .map_err(|_| format!("{} value '{token}' is not a number", spec.name))?,
    };

    if value < spec.min || value > spec.max {
        return Err(format!(
            "{} value {value} is outside {}-{}",
            spec.name, spec.min, spec.max
        ));
    }
    Ok(value)
}

const fn bit_set(bits: u64, position: u32) -> bool {
    position < u64::BITS && bits & (1_u64 << position) != 0
}

const fn max_days_in_month(month: u32) -> u32 {
    match month {
        2 => 29,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn ceil_to_minute(instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let floor = instant.duration_trunc(TimeDelta::minutes(1)).ok()?;
    if floor == instant {
        Some(floor)
    } else {
        floor.checked_add_signed(TimeDelta::minutes(1))
    }
}

fn start_of_next_month(instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if instant.month() == 12 {
        (instant.year().checked_add(1)?, 1)
    } else {
        (instant.year(), instant.month().checked_add(1)?)
    };
    Some(
        NaiveDate::from_ymd_opt(year, month, 1)?
            .and_hms_opt(0, 0, 0)?
            .and_utc(),
    )
}

fn start_of_next_day(instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Some(
        instant
            .date_naive()
            .succ_opt()?
            .and_hms_opt(0, 0, 0)?
            .and_utc(),
    )
}

fn start_of_next_hour(instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
    instant
        .duration_trunc(TimeDelta::hours(1))
        .ok()?
        .checked_add_signed(TimeDelta::hours(1))
}
