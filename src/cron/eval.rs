use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};

use super::{CronField, CronRuleSet, FieldRule};
use crate::errors::AppError;

/// How far ahead [`next_run`] searches before giving up on a rule set.
pub const SEARCH_HORIZON_YEARS: i32 = 8;

/// Computes the first whole minute strictly after `after` that satisfies every
/// field of `rules`. Times are evaluated in UTC.
///
/// When both `days_month` and `days_week` are restricted a day qualifies if it
/// matches either of them, as in classic cron. When only one of them is
/// restricted, that one alone decides.
///
/// # Errors
///
/// * `InvalidRuleSet` - a field is empty or holds a value outside its range.
/// * `Unsatisfiable` - nothing matches within [`SEARCH_HORIZON_YEARS`], e.g.
///   the 30th of February.
pub fn next_run(rules: &CronRuleSet, after: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
    rules.validate()?;

    let unsatisfiable = || AppError::Unsatisfiable {
        years: SEARCH_HORIZON_YEARS,
    };

    let after = after.naive_utc();
    let start = at(after.date(), after.hour(), after.minute())
        .and_then(|t| t.checked_add_signed(TimeDelta::minutes(1)))
        .ok_or_else(unsatisfiable)?;
    let horizon = start
        .checked_add_signed(TimeDelta::days(366 * i64::from(SEARCH_HORIZON_YEARS)))
        .unwrap_or(NaiveDateTime::MAX);

    search(rules, start, horizon)
        .map(|t| t.and_utc())
        .ok_or_else(unsatisfiable)
}

fn search(
    rules: &CronRuleSet,
    start: NaiveDateTime,
    horizon: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let mut candidate = start;

    while candidate <= horizon {
        let date = candidate.date();

        if !rules.months.matches(date.month()) {
            candidate = first_of_next_month(date)?;
            continue;
        }

        if !day_matches(rules, date) {
            candidate = midnight(date.succ_opt()?);
            continue;
        }

        let Some(hour) = rules.hours.next_from(candidate.hour(), CronField::Hours) else {
            candidate = midnight(date.succ_opt()?);
            continue;
        };
        if hour != candidate.hour() {
            candidate = at(date, hour, 0)?;
            continue;
        }

        match rules.minutes.next_from(candidate.minute(), CronField::Minutes) {
            Some(minute) => return at(date, hour, minute),
            None if hour < CronField::Hours.max() => candidate = at(date, hour + 1, 0)?,
            None => candidate = midnight(date.succ_opt()?),
        }
    }

    None
}

fn day_matches(rules: &CronRuleSet, date: NaiveDate) -> bool {
    let day = date.day();
    let weekday = date.weekday().num_days_from_monday();

    match (&rules.days_month, &rules.days_week) {
        (FieldRule::Wildcard, FieldRule::Wildcard) => true,
        (days_month, FieldRule::Wildcard) => days_month.matches(day),
        (FieldRule::Wildcard, days_week) => days_week.matches(weekday),
        (days_month, days_week) => days_month.matches(day) || days_week.matches(weekday),
    }
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> Option<NaiveDateTime> {
    date.and_hms_opt(hour, minute, 0)
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDateTime> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).map(midnight)
}
