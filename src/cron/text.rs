//! Textual five-field form, read through the `cron` crate.

use std::fmt;
use std::str::FromStr;

use cron::{Schedule, TimeUnitSpec};

use super::{CronField, CronRuleSet, FieldRule};
use crate::errors::AppError;

/// `cron` expects a leading seconds field.
fn normalize_cron(fields: &[&str]) -> String {
    format!("0 {}", fields.join(" "))
}

// `cron` numbers weekdays from 1 (Sunday) to 7 (Saturday).
fn weekday_from_cron(ordinal: u32) -> u32 {
    (ordinal + 5) % 7
}

fn weekday_to_cron(day: u32) -> u32 {
    (day + 1) % 7 + 1
}

fn field_rule(spec: &impl TimeUnitSpec, map: impl Fn(u32) -> u32) -> FieldRule {
    if spec.is_all() {
        FieldRule::Wildcard
    } else {
        FieldRule::values(spec.iter().map(map))
    }
}

/// Re-parses each field next to wildcards to find the one `cron` rejected.
fn rejected_field(fields: &[&str]) -> Option<CronField> {
    CronField::ALL
        .into_iter()
        .zip(fields)
        .enumerate()
        .find_map(|(index, (field, text))| {
            let mut isolated = ["*"; 5];
            isolated[index] = *text;
            Schedule::from_str(&normalize_cron(&isolated))
                .is_err()
                .then_some(field)
        })
}

impl FromStr for CronRuleSet {
    type Err = AppError;

    /// Parses `"minutes hours days_month months days_week"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != CronField::ALL.len() {
            return Err(AppError::InvalidCronExpression(format!(
                "expected 5 fields, found {}",
                fields.len()
            )));
        }

        let schedule = Schedule::from_str(&normalize_cron(&fields)).map_err(|err| {
            match rejected_field(&fields) {
                Some(field) => AppError::invalid_rule(field, err.to_string()),
                None => AppError::InvalidCronExpression(err.to_string()),
            }
        })?;

        let rules = CronRuleSet {
            minutes: field_rule(schedule.minutes(), |v| v),
            hours: field_rule(schedule.hours(), |v| v),
            days_month: field_rule(schedule.days_of_month(), |v| v),
            months: field_rule(schedule.months(), |v| v),
            days_week: field_rule(schedule.days_of_week(), weekday_from_cron),
        };
        rules.validate()?;

        Ok(rules)
    }
}

impl fmt::Display for CronRuleSet {
    /// Writes the form [`CronRuleSet::from_str`] reads back.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days_week = match &self.days_week {
            FieldRule::Wildcard => FieldRule::Wildcard,
            FieldRule::Values(days) => FieldRule::values(days.iter().map(|&d| weekday_to_cron(d))),
        };

        write!(
            f,
            "{} {} {} {} {}",
            self.minutes, self.hours, self.days_month, self.months, days_week
        )
    }
}
