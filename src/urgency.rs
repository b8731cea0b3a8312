use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::Instance;

/// How urgently a quest must be surfaced.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Classifies a quest by the time left until it is due.
///
/// - No due instant: **medium**.
/// - Already past due: **critical**.
/// - Less than 2 hours left (including exactly now): **high**.
/// - Up to 6 hours left: **medium**.
/// - Otherwise: **low**.
///
/// Exactly two hours left is medium, not high.
pub fn classify(due_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Urgency {
    let Some(due) = due_at else {
        return Urgency::Medium;
    };
    if due < now {
        return Urgency::Critical;
    }
    let remaining = due - now;
    if remaining < Duration::hours(2) {
        Urgency::High
    } else if remaining <= Duration::hours(6) {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}

/// Orders quests by due instant, earliest first; undated quests go last.
///
/// The sort is stable, so quests with equal due instants (and all undated
/// quests) keep their input order.
pub fn sort_by_urgency(instances: &mut [Instance]) {
    instances.sort_by(|a, b| compare_due(a.due_at(), b.due_at()));
}

fn compare_due(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
