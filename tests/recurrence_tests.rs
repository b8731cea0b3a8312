use chrono::{Datelike, NaiveDate};
use choreboard::models::RecurrenceRule;
use choreboard::recurrence::{next_occurrences, next_occurrences_within, occurs_on, validate_rule, weekday_index};
use choreboard::QuestError;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Weekly on Monday and Wednesday from Monday 2025-01-06.
fn mon_wed() -> RecurrenceRule {
    RecurrenceRule::weekly(d(2025, 1, 6), [1, 3])
}

#[test]
fn test_weekly_scenario() {
    let rule = mon_wed();
    assert!(occurs_on(&rule, d(2025, 1, 6)));
    assert!(occurs_on(&rule, d(2025, 1, 8)));
    assert!(!occurs_on(&rule, d(2025, 1, 7)));
    // Monday before the start date.
    assert!(!occurs_on(&rule, d(2024, 12, 30)));
}

#[test]
fn test_excluded_date_is_skipped() {
    let rule = mon_wed().excluding(d(2025, 1, 13));
    assert!(!occurs_on(&rule, d(2025, 1, 13)));
    assert!(occurs_on(&rule, d(2025, 1, 15)));
    assert!(occurs_on(&rule, d(2025, 1, 20)));
}

#[test]
fn test_weekly_matches_definition_over_a_quarter() {
    let rule = RecurrenceRule::weekly(d(2025, 1, 3), [0, 2, 5])
        .until(d(2025, 3, 10))
        .excluding(d(2025, 2, 4))
        .excluding(d(2025, 1, 26));
    let mut date = d(2024, 12, 1);
    while date <= d(2025, 4, 30) {
        let expected = rule.weekdays.contains(&weekday_index(date))
            && date >= rule.start_date
            && date <= rule.end_date.unwrap()
            && !rule.excluded_dates.contains(&date);
        assert_eq!(occurs_on(&rule, date), expected, "mismatch on {date}");
        date = date.succ_opt().unwrap();
    }
}

#[test]
fn test_daily_respects_window() {
    let rule = RecurrenceRule::daily(d(2025, 1, 1)).until(d(2025, 1, 3));
    assert!(!occurs_on(&rule, d(2024, 12, 31)));
    assert!(occurs_on(&rule, d(2025, 1, 1)));
    assert!(occurs_on(&rule, d(2025, 1, 3)));
    assert!(!occurs_on(&rule, d(2025, 1, 4)));
}

#[test]
fn test_once_occurs_only_on_start() {
    let rule = RecurrenceRule::once(d(2025, 5, 1));
    assert!(occurs_on(&rule, d(2025, 5, 1)));
    assert!(!occurs_on(&rule, d(2025, 5, 2)));
    assert!(!occurs_on(&rule.clone().excluding(d(2025, 5, 1)), d(2025, 5, 1)));
}

#[test]
fn test_monthly_on_31st_shifts_to_month_end() {
    let rule = RecurrenceRule::monthly(d(2025, 1, 31));
    assert!(occurs_on(&rule, d(2025, 1, 31)));
    assert!(occurs_on(&rule, d(2025, 2, 28)));
    assert!(!occurs_on(&rule, d(2025, 2, 27)));
    assert!(occurs_on(&rule, d(2025, 3, 31)));
    assert!(!occurs_on(&rule, d(2025, 3, 30)));
    assert!(occurs_on(&rule, d(2025, 4, 30)));
    // Leap year February.
    assert!(occurs_on(&rule, d(2028, 2, 29)));
    assert!(!occurs_on(&rule, d(2028, 2, 28)));
}

#[test]
fn test_monthly_on_regular_day() {
    let rule = RecurrenceRule::monthly(d(2025, 1, 15));
    let dates: Vec<NaiveDate> = next_occurrences(&rule, d(2025, 1, 1), 3).collect();
    assert_eq!(dates, vec![d(2025, 1, 15), d(2025, 2, 15), d(2025, 3, 15)]);
}

#[test]
fn test_next_occurrences_respects_limit_and_start() {
    let rule = mon_wed();
    let dates: Vec<NaiveDate> = next_occurrences(&rule, d(2025, 1, 1), 4).collect();
    assert_eq!(dates, vec![d(2025, 1, 6), d(2025, 1, 8), d(2025, 1, 13), d(2025, 1, 15)]);
    for date in &dates {
        assert!(matches!(date.weekday().num_days_from_sunday(), 1 | 3));
    }
}

#[test]
fn test_next_occurrences_stops_at_end_date() {
    let rule = RecurrenceRule::daily(d(2025, 1, 1)).until(d(2025, 1, 5));
    let dates: Vec<NaiveDate> = next_occurrences(&rule, d(2025, 1, 3), 100).collect();
    assert_eq!(dates, vec![d(2025, 1, 3), d(2025, 1, 4), d(2025, 1, 5)]);
}

#[test]
fn test_next_occurrences_bounded_by_lookahead() {
    let rule = RecurrenceRule::daily(d(2025, 1, 1));
    let dates: Vec<NaiveDate> = next_occurrences_within(&rule, d(2025, 1, 1), 1000, 10).collect();
    assert_eq!(dates.len(), 11);
    assert_eq!(dates.last().copied(), Some(d(2025, 1, 11)));

    // A rule with nothing inside the window yields nothing.
    let far = RecurrenceRule::once(d(2030, 1, 1));
    assert_eq!(next_occurrences(&far, d(2025, 1, 1), 5).count(), 0);
}

#[test]
fn test_next_occurrences_is_restartable() {
    let rule = mon_wed().excluding(d(2025, 1, 8));
    let a: Vec<NaiveDate> = next_occurrences(&rule, d(2025, 1, 7), 5).collect();
    let b: Vec<NaiveDate> = next_occurrences(&rule, d(2025, 1, 7), 5).collect();
    assert_eq!(a, b);
    assert_eq!(a.first().copied(), Some(d(2025, 1, 13)));
}

#[test]
fn test_validate_rule() {
    assert!(validate_rule(&mon_wed()).is_ok());
    assert!(validate_rule(&RecurrenceRule::daily(d(2025, 1, 1))).is_ok());

    let no_days = RecurrenceRule::weekly(d(2025, 1, 1), Vec::<u8>::new());
    assert!(matches!(validate_rule(&no_days), Err(QuestError::InvalidRule(_))));

    let mut daily_with_days = RecurrenceRule::daily(d(2025, 1, 1));
    daily_with_days.weekdays.insert(2);
    assert!(matches!(validate_rule(&daily_with_days), Err(QuestError::InvalidRule(_))));

    let bad_day = RecurrenceRule::weekly(d(2025, 1, 1), [7]);
    assert!(matches!(validate_rule(&bad_day), Err(QuestError::InvalidRule(_))));

    let backwards = RecurrenceRule::daily(d(2025, 2, 1)).until(d(2025, 1, 1));
    assert!(matches!(validate_rule(&backwards), Err(QuestError::InvalidRule(_))));
}
