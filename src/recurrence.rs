use chrono::{Datelike, Duration, NaiveDate};

use crate::error::QuestError;
use crate::models::{RecurrenceKind, RecurrenceRule};

/// Look-ahead used by [`next_occurrences`] when the rule has no end date.
pub const DEFAULT_MAX_LOOKAHEAD_DAYS: u32 = 366;

/// Weekday index of `date`, Sunday = 0 through Saturday = 6.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Checks the structural invariants of a rule.
///
/// - `weekdays` is non-empty if and only if the rule is weekly.
/// - Every weekday index is in `0..=6`.
/// - `start_date <= end_date` when an end date is present.
pub fn validate_rule(rule: &RecurrenceRule) -> Result<(), QuestError> {
    match rule.kind {
        RecurrenceKind::Weekly if rule.weekdays.is_empty() => {
            return Err(QuestError::InvalidRule(
                "a weekly rule needs at least one weekday".into(),
            ));
        }
        RecurrenceKind::Weekly => {}
        _ if !rule.weekdays.is_empty() => {
            return Err(QuestError::InvalidRule(format!(
                "weekdays only apply to weekly rules, not {}",
                rule.kind
            )));
        }
        _ => {}
    }
    if let Some(bad) = rule.weekdays.iter().find(|d| **d > 6) {
        return Err(QuestError::InvalidRule(format!(
            "weekday {bad} is out of range (0 = Sunday .. 6 = Saturday)"
        )));
    }
    if let Some(end) = rule.end_date {
        if end < rule.start_date {
            return Err(QuestError::InvalidRule(format!(
                "end date {end} is before start date {}",
                rule.start_date
            )));
        }
    }
    Ok(())
}

fn in_window(rule: &RecurrenceRule, date: NaiveDate) -> bool {
    date >= rule.start_date
        && rule.end_date.map_or(true, |end| date <= end)
        && !rule.excluded_dates.contains(&date)
}

/// Whether `rule` produces an occurrence on `date`.
///
/// Monthly rules repeat on the start date's day of month; in months that
/// are too short for it the occurrence moves to the last day of the month.
pub fn occurs_on(rule: &RecurrenceRule, date: NaiveDate) -> bool {
    if !in_window(rule, date) {
        return false;
    }
    match rule.kind {
        RecurrenceKind::None => date == rule.start_date,
        RecurrenceKind::Daily => true,
        RecurrenceKind::Weekly => rule.weekdays.contains(&weekday_index(date)),
        RecurrenceKind::Monthly => {
            let wanted = rule.start_date.day();
            let last = days_in_month(date.year(), date.month());
            date.day() == wanted.min(last)
        }
    }
}

/// Lazily yields the occurrence dates of `rule` on or after `from`.
///
/// Yields at most `limit` dates and never scans past the rule's end date,
/// or past `from + DEFAULT_MAX_LOOKAHEAD_DAYS` when the rule is open-ended.
pub fn next_occurrences(rule: &RecurrenceRule, from: NaiveDate, limit: usize) -> Occurrences<'_> {
    next_occurrences_within(rule, from, limit, DEFAULT_MAX_LOOKAHEAD_DAYS)
}

/// Like [`next_occurrences`] with an explicit look-ahead for open-ended rules.
pub fn next_occurrences_within(
    rule: &RecurrenceRule,
    from: NaiveDate,
    limit: usize,
    max_lookahead_days: u32,
) -> Occurrences<'_> {
    let horizon = match rule.end_date {
        Some(end) => end,
        None => from
            .checked_add_signed(Duration::days(i64::from(max_lookahead_days)))
            .unwrap_or(NaiveDate::MAX),
    };
    Occurrences {
        rule,
        cursor: Some(from.max(rule.start_date)),
        horizon,
        remaining: limit,
    }
}

/// Iterator returned by [`next_occurrences`].
#[derive(Debug, Clone)]
pub struct Occurrences<'a> {
    rule: &'a RecurrenceRule,
    cursor: Option<NaiveDate>,
    horizon: NaiveDate,
    remaining: usize,
}

impl Iterator for Occurrences<'_> {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        while self.remaining > 0 {
            let date = self.cursor.filter(|d| *d <= self.horizon)?;
            self.cursor = date.succ_opt();
            if occurs_on(self.rule, date) {
                self.remaining -= 1;
                return Some(date);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2025, 12), 31);
        assert_eq!(days_in_month(2025, 4), 30);
    }

    #[test]
    fn weekday_index_is_sunday_based() {
        assert_eq!(weekday_index(d(2025, 1, 5)), 0); // Sunday
        assert_eq!(weekday_index(d(2025, 1, 6)), 1); // Monday
        assert_eq!(weekday_index(d(2025, 1, 11)), 6); // Saturday
    }
}
