use crate::cron::{CronField, CronRuleSet, FieldRule, next_run, options_for};
use crate::domain::SelectOption;
use crate::errors::AppError;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

fn rules(text: &str) -> CronRuleSet {
    text.parse().expect("valid rule set")
}

#[test]
fn test_all_wildcard_rounds_up_to_next_minute() {
    let every_minute = CronRuleSet::default();

    assert_eq!(
        next_run(&every_minute, at(2024, 1, 1, 12, 0, 30)).unwrap(),
        at(2024, 1, 1, 12, 1, 0)
    );
    // an exact minute is excluded
    assert_eq!(
        next_run(&every_minute, at(2024, 1, 1, 12, 0, 0)).unwrap(),
        at(2024, 1, 1, 12, 1, 0)
    );
}

#[test]
fn test_next_run_is_strictly_increasing() {
    for text in ["*/15 9-17 * * MON-FRI", "0 0 1 * *", "5 4 * * 6", "0 12 29 2 *"] {
        let rules = rules(text);
        let mut cursor = at(2024, 1, 1, 0, 0, 0);
        for _ in 0..25 {
            let next = next_run(&rules, cursor).unwrap();
            assert!(next > cursor, "{text}: {next} should be after {cursor}");
            cursor = next;
        }
    }
}

#[test]
fn test_skips_to_next_working_day() {
    // Friday evening, after the last quarter hour of the window
    let next = next_run(&rules("*/15 9-17 * * 2-6"), at(2024, 1, 5, 17, 50, 0)).unwrap();
    assert_eq!(next, at(2024, 1, 8, 9, 0, 0));

    let next = next_run(&rules("*/15 9-17 * * 2-6"), next).unwrap();
    assert_eq!(next, at(2024, 1, 8, 9, 15, 0));
}

#[test]
fn test_minute_and_hour_carry() {
    assert_eq!(
        next_run(&rules("30 * * * *"), at(2024, 1, 1, 10, 45, 0)).unwrap(),
        at(2024, 1, 1, 11, 30, 0)
    );
    assert_eq!(
        next_run(&rules("0 0 * * *"), at(2024, 1, 1, 23, 30, 0)).unwrap(),
        at(2024, 1, 2, 0, 0, 0)
    );
    assert_eq!(
        next_run(&rules("0 0 1 1 *"), at(2024, 12, 31, 23, 59, 59)).unwrap(),
        at(2025, 1, 1, 0, 0, 0)
    );
}

#[test]
fn test_day_of_month_or_day_of_week() {
    let rules = CronRuleSet {
        minutes: FieldRule::values([0]),
        hours: FieldRule::values([0]),
        days_month: FieldRule::values([1]),
        months: FieldRule::Wildcard,
        days_week: FieldRule::values([0]),
    };

    // Tuesday the 2nd: the next Monday comes before the 1st of February
    assert_eq!(
        next_run(&rules, at(2024, 1, 2, 10, 0, 0)).unwrap(),
        at(2024, 1, 8, 0, 0, 0)
    );
    // Tuesday the 30th: the 1st of February comes before the next Monday
    assert_eq!(
        next_run(&rules, at(2024, 1, 30, 10, 0, 0)).unwrap(),
        at(2024, 2, 1, 0, 0, 0)
    );
}

#[test]
fn test_single_restricted_day_field_decides_alone() {
    assert_eq!(
        next_run(&rules("0 0 15 * *"), at(2024, 1, 2, 0, 0, 0)).unwrap(),
        at(2024, 1, 15, 0, 0, 0)
    );
    // 1 is Sunday in the textual form
    assert_eq!(
        next_run(&rules("0 0 * * 1"), at(2024, 1, 2, 0, 0, 0)).unwrap(),
        at(2024, 1, 7, 0, 0, 0)
    );
}

#[test]
fn test_leap_day_is_found_years_ahead() {
    assert_eq!(
        next_run(&rules("0 0 29 2 *"), at(2024, 3, 1, 0, 0, 0)).unwrap(),
        at(2028, 2, 29, 0, 0, 0)
    );
}

#[test]
fn test_february_30_is_unsatisfiable() {
    let rules = CronRuleSet {
        days_month: FieldRule::values([30]),
        months: FieldRule::values([2]),
        ..CronRuleSet::default()
    };

    let err = next_run(&rules, at(2024, 1, 1, 0, 0, 0)).unwrap_err();
    assert!(matches!(err, AppError::Unsatisfiable { years: 8 }));
}

#[test]
fn test_invalid_fields_are_named() {
    let cases = [
        (
            CronRuleSet {
                minutes: FieldRule::values([60]),
                ..CronRuleSet::default()
            },
            CronField::Minutes,
        ),
        (
            CronRuleSet {
                days_month: FieldRule::values([]),
                ..CronRuleSet::default()
            },
            CronField::DaysMonth,
        ),
        (
            CronRuleSet {
                months: FieldRule::values([0, 5]),
                ..CronRuleSet::default()
            },
            CronField::Months,
        ),
        (
            CronRuleSet {
                days_week: FieldRule::values([7]),
                ..CronRuleSet::default()
            },
            CronField::DaysWeek,
        ),
    ];

    for (rules, expected) in cases {
        match next_run(&rules, at(2024, 1, 1, 0, 0, 0)) {
            Err(AppError::InvalidRuleSet { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected InvalidRuleSet for {expected}, got {other:?}"),
        }
    }
}

#[test]
fn test_parse_lists_ranges_and_steps() {
    let parsed = rules("*/20 1-3 1,15 * 5-6");

    assert_eq!(parsed.minutes, FieldRule::values([0, 20, 40]));
    assert_eq!(parsed.hours, FieldRule::values([1, 2, 3]));
    assert_eq!(parsed.days_month, FieldRule::values([1, 15]));
    assert!(parsed.months.is_wildcard());
    // Thursday and Friday
    assert_eq!(parsed.days_week, FieldRule::values([3, 4]));
    assert_eq!(parsed.to_string(), "0,20,40 1,2,3 1,15 * 5,6");

    assert_eq!(rules("10-30/10 5-23/6 * * *").minutes, FieldRule::values([10, 20, 30]));
    assert_eq!(rules("10-30/10 5-23/6 * * *").hours, FieldRule::values([5, 11, 17, 23]));
}

#[test]
fn test_parse_weekdays_into_monday_first_numbering() {
    assert_eq!(rules("0 9 * * 1").days_week, FieldRule::values([6]));
    assert_eq!(rules("0 9 * * 7").days_week, FieldRule::values([5]));
    assert_eq!(rules("0 9 * * 2-6").days_week, FieldRule::values(0..=4));
    assert_eq!(rules("0 9 * * MON-FRI"), rules("0 9 * * 2-6"));
    assert!(rules("0 9 * * *").days_week.is_wildcard());

    let weekend = CronRuleSet {
        days_week: FieldRule::values([5, 6]),
        ..CronRuleSet::default()
    };
    assert_eq!(weekend.to_string(), "* * * * 1,7");
    assert_eq!(rules(&weekend.to_string()), weekend);
}

#[test]
fn test_parse_errors_name_the_field() {
    let field_of = |text: &str| match text.parse::<CronRuleSet>() {
        Err(AppError::InvalidRuleSet { field, .. }) => field,
        other => panic!("expected InvalidRuleSet for {text:?}, got {other:?}"),
    };

    assert_eq!(field_of("60 * * * *"), CronField::Minutes);
    assert_eq!(field_of("* 24 * * *"), CronField::Hours);
    assert_eq!(field_of("* * x * *"), CronField::DaysMonth);
    assert_eq!(field_of("* * * 13 *"), CronField::Months);
    assert_eq!(field_of("* * * * 8"), CronField::DaysWeek);
}

#[test]
fn test_wrong_field_count_is_reported_on_the_rule_set() {
    for text in ["* * * *", "0 * * * * *", ""] {
        let err = text.parse::<CronRuleSet>().unwrap_err();
        assert!(
            matches!(err, AppError::InvalidCronExpression(_)),
            "{text:?}: {err:?}"
        );
        assert_eq!(err.field(), Some("cron_rules"));
    }
}

#[test]
fn test_rule_set_json_shape() {
    let parsed: CronRuleSet =
        serde_json::from_value(json!({ "minutes": [0, 30], "hours": "*" })).unwrap();

    assert_eq!(parsed.minutes, FieldRule::values([0, 30]));
    assert!(parsed.hours.is_wildcard());
    assert!(parsed.days_week.is_wildcard());
    assert_eq!(
        serde_json::to_value(&parsed).unwrap(),
        json!({
            "minutes": [0, 30],
            "hours": "*",
            "days_month": "*",
            "months": "*",
            "days_week": "*",
        })
    );

    assert!(serde_json::from_value::<CronRuleSet>(json!({ "minutes": "x" })).is_err());
}

#[test]
fn test_upcoming() {
    let times = rules("0 */6 * * *")
        .upcoming(at(2024, 1, 1, 0, 0, 0), 3)
        .unwrap();

    assert_eq!(
        times,
        vec![
            at(2024, 1, 1, 6, 0, 0),
            at(2024, 1, 1, 12, 0, 0),
            at(2024, 1, 1, 18, 0, 0),
        ]
    );
}

#[test]
fn test_month_options_use_names() {
    let options = options_for(CronField::Months, false, false);

    assert_eq!(options.len(), 12);
    assert_eq!(options[0], SelectOption::new("1", "January"));
    assert_eq!(options[11], SelectOption::new("12", "December"));
}

#[test]
fn test_weekday_options_with_wildcard_and_numbers() {
    let options = options_for(CronField::DaysWeek, true, true);

    let expected: Vec<SelectOption> = std::iter::once(SelectOption::new("*", "*"))
        .chain((0..=6).map(|d| SelectOption::new(d.to_string(), d.to_string())))
        .collect();
    assert_eq!(options, expected);

    let named = options_for(CronField::DaysWeek, false, false);
    assert_eq!(named[0], SelectOption::new("0", "Monday"));
    assert_eq!(named[6], SelectOption::new("6", "Sunday"));
}

#[test]
fn test_numeric_field_options() {
    let minutes = options_for(CronField::Minutes, false, false);
    assert_eq!(minutes.len(), 60);
    assert_eq!(minutes[59], SelectOption::new("59", "59"));

    let days = options_for(CronField::DaysMonth, true, false);
    assert_eq!(days.len(), 32);
    assert_eq!(days[1], SelectOption::new("1", "1"));
    assert_eq!(days[31], SelectOption::new("31", "31"));

    assert_eq!(options_for(CronField::Hours, false, true).len(), 24);
}

#[test]
fn test_field_keys_round_trip() {
    for field in CronField::ALL {
        assert_eq!(field.key().parse::<CronField>().unwrap(), field);
    }
    assert!("seconds".parse::<CronField>().is_err());
}
