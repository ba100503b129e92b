//! Five-field cron rules: minutes, hours, day of month, month and day of week.
//!
//! Each field is either the wildcard or an explicit set of values. Day-of-week
//! values count from Monday (`0`) to Sunday (`6`). The textual form read by
//! [`CronRuleSet::from_str`] is the `cron` crate's, where day-of-week runs
//! from `1` (Sunday) to `7` (Saturday) and names like `MON` are accepted.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::AppError;

mod eval;
mod options;
mod text;

pub use eval::{SEARCH_HORIZON_YEARS, next_run};
pub use options::options_for;

#[cfg(test)]
mod tests;

const MONTH_LABELS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAY_LABELS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// One of the five positions of a cron rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CronField {
    Minutes,
    Hours,
    DaysMonth,
    Months,
    DaysWeek,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown cron field '{0}'")]
pub struct UnknownCronField(pub String);

impl CronField {
    pub const ALL: [CronField; 5] = [
        CronField::Minutes,
        CronField::Hours,
        CronField::DaysMonth,
        CronField::Months,
        CronField::DaysWeek,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CronField::Minutes => "minutes",
            CronField::Hours => "hours",
            CronField::DaysMonth => "days_month",
            CronField::Months => "months",
            CronField::DaysWeek => "days_week",
        }
    }

    pub(crate) fn form_name(self) -> &'static str {
        match self {
            CronField::Minutes => "cron_rules.minutes",
            CronField::Hours => "cron_rules.hours",
            CronField::DaysMonth => "cron_rules.days_month",
            CronField::Months => "cron_rules.months",
            CronField::DaysWeek => "cron_rules.days_week",
        }
    }

    pub fn min(self) -> u32 {
        match self {
            CronField::DaysMonth | CronField::Months => 1,
            CronField::Minutes | CronField::Hours | CronField::DaysWeek => 0,
        }
    }

    pub fn max(self) -> u32 {
        match self {
            CronField::Minutes => 59,
            CronField::Hours => 23,
            CronField::DaysMonth => 31,
            CronField::Months => 12,
            CronField::DaysWeek => 6,
        }
    }

    pub fn range(self) -> RangeInclusive<u32> {
        self.min()..=self.max()
    }

    /// Canonical display names, indexed from the start of the range.
    pub fn labels(self) -> Option<&'static [&'static str]> {
        match self {
            CronField::Months => Some(&MONTH_LABELS),
            CronField::DaysWeek => Some(&WEEKDAY_LABELS),
            CronField::Minutes | CronField::Hours | CronField::DaysMonth => None,
        }
    }
}

impl fmt::Display for CronField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CronField {
    type Err = UnknownCronField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CronField::ALL
            .into_iter()
            .find(|field| field.key() == s)
            .ok_or_else(|| UnknownCronField(s.to_string()))
    }
}

/// A single field of a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "FieldRuleRepr", into = "FieldRuleRepr")]
pub enum FieldRule {
    #[default]
    Wildcard,
    Values(BTreeSet<u32>),
}

// Stored as "*" or a JSON array of integers.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FieldRuleRepr {
    Marker(String),
    Values(BTreeSet<u32>),
}

impl TryFrom<FieldRuleRepr> for FieldRule {
    type Error = String;

    fn try_from(repr: FieldRuleRepr) -> Result<Self, Self::Error> {
        match repr {
            FieldRuleRepr::Marker(marker) if marker == "*" => Ok(FieldRule::Wildcard),
            FieldRuleRepr::Marker(other) => Err(format!(
                "expected \"*\" or a list of values, got {other:?}"
            )),
            FieldRuleRepr::Values(values) => Ok(FieldRule::Values(values)),
        }
    }
}

impl From<FieldRule> for FieldRuleRepr {
    fn from(rule: FieldRule) -> Self {
        match rule {
            FieldRule::Wildcard => FieldRuleRepr::Marker("*".to_string()),
            FieldRule::Values(values) => FieldRuleRepr::Values(values),
        }
    }
}

impl FieldRule {
    pub fn values(values: impl IntoIterator<Item = u32>) -> Self {
        FieldRule::Values(values.into_iter().collect())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, FieldRule::Wildcard)
    }

    pub fn matches(&self, value: u32) -> bool {
        match self {
            FieldRule::Wildcard => true,
            FieldRule::Values(values) => values.contains(&value),
        }
    }

    /// Smallest allowed value that is `>= value`, if any remains in the field.
    pub(crate) fn next_from(&self, value: u32, field: CronField) -> Option<u32> {
        match self {
            FieldRule::Wildcard => (value <= field.max()).then(|| value.max(field.min())),
            FieldRule::Values(values) => values.range(value..).next().copied(),
        }
    }

    pub fn validate(&self, field: CronField) -> Result<(), AppError> {
        let FieldRule::Values(values) = self else {
            return Ok(());
        };

        if values.is_empty() {
            return Err(AppError::invalid_rule(
                field,
                "at least one value or the wildcard is required",
            ));
        }

        if let Some(bad) = values.iter().find(|&&v| !field.range().contains(&v)) {
            return Err(AppError::invalid_rule(
                field,
                format!(
                    "value {bad} is outside {}-{}",
                    field.min(),
                    field.max()
                ),
            ));
        }

        Ok(())
    }
}

impl fmt::Display for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRule::Wildcard => f.write_str("*"),
            FieldRule::Values(values) => {
                let list: Vec<String> = values.iter().map(u32::to_string).collect();
                f.write_str(&list.join(","))
            }
        }
    }
}

/// The recurrence rules of a cron-scheduled task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CronRuleSet {
    #[serde(default)]
    pub minutes: FieldRule,
    #[serde(default)]
    pub hours: FieldRule,
    #[serde(default)]
    pub days_month: FieldRule,
    #[serde(default)]
    pub months: FieldRule,
    #[serde(default)]
    pub days_week: FieldRule,
}

impl CronRuleSet {
    pub fn rule(&self, field: CronField) -> &FieldRule {
        match field {
            CronField::Minutes => &self.minutes,
            CronField::Hours => &self.hours,
            CronField::DaysMonth => &self.days_month,
            CronField::Months => &self.months,
            CronField::DaysWeek => &self.days_week,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        CronField::ALL
            .into_iter()
            .try_for_each(|field| self.rule(field).validate(field))
    }

    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
        next_run(self, after)
    }

    /// The next `count` due times after `after`, in order.
    pub fn upcoming(
        &self,
        after: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<DateTime<Utc>>, AppError> {
        let mut times = Vec::with_capacity(count);
        let mut cursor = after;
        for _ in 0..count {
            cursor = next_run(self, cursor)?;
            times.push(cursor);
        }
        Ok(times)
    }
}
