use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a persisted quest instance. Assigned by the store.
pub type InstanceId = u64;
/// Identity of a quest template (a short user-chosen key such as `trash`).
pub type TemplateId = String;
pub type UserId = String;
pub type FamilyId = String;

/// How often a template produces an occurrence.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    /// A single occurrence on the start date.
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecurrenceKind::None => "once",
            RecurrenceKind::Daily => "daily",
            RecurrenceKind::Weekly => "weekly",
            RecurrenceKind::Monthly => "monthly",
        };
        f.write_str(s)
    }
}

/// Describes on which dates a template produces a quest.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub kind: RecurrenceKind,
    /// Weekday indices, Sunday = 0. Only meaningful for weekly rules.
    #[serde(default)]
    pub weekdays: BTreeSet<u8>,
    /// No occurrence exists before this date.
    pub start_date: NaiveDate,
    /// No occurrence exists after this date.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Dates suppressed even when the rule would produce them.
    #[serde(default)]
    pub excluded_dates: BTreeSet<NaiveDate>,
    /// Wall-clock time on the occurrence date at which the quest is due.
    #[serde(default)]
    pub due_time_of_day: Option<NaiveTime>,
}

impl RecurrenceRule {
    /// A one-off rule occurring only on `date`.
    pub fn once(date: NaiveDate) -> Self {
        Self::new(RecurrenceKind::None, date)
    }

    pub fn daily(start_date: NaiveDate) -> Self {
        Self::new(RecurrenceKind::Daily, start_date)
    }

    /// A weekly rule on the given weekday indices (Sunday = 0).
    pub fn weekly(start_date: NaiveDate, weekdays: impl IntoIterator<Item = u8>) -> Self {
        let mut rule = Self::new(RecurrenceKind::Weekly, start_date);
        rule.weekdays = weekdays.into_iter().collect();
        rule
    }

    pub fn monthly(start_date: NaiveDate) -> Self {
        Self::new(RecurrenceKind::Monthly, start_date)
    }

    fn new(kind: RecurrenceKind, start_date: NaiveDate) -> Self {
        Self {
            kind,
            weekdays: BTreeSet::new(),
            start_date,
            end_date: None,
            excluded_dates: BTreeSet::new(),
            due_time_of_day: None,
        }
    }

    pub fn until(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn excluding(mut self, date: NaiveDate) -> Self {
        self.excluded_dates.insert(date);
        self
    }

    pub fn due_at(mut self, time: NaiveTime) -> Self {
        self.due_time_of_day = Some(time);
        self
    }
}

/// A recurring chore definition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QuestTemplate {
    pub id: TemplateId,
    pub family_id: FamilyId,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    pub points: u32,
    pub created_by: UserId,
    #[serde(default)]
    pub default_assignee: Option<UserId>,
    pub rule: RecurrenceRule,
    /// Written by the reminder service only.
    #[serde(default)]
    pub last_notified_at: Option<DateTime<Utc>>,
}

/// Lifecycle state of a persisted quest.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Approved,
    Rejected,
}

impl QuestStatus {
    /// Approved and rejected quests never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, QuestStatus::Approved | QuestStatus::Rejected)
    }
}

impl fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestStatus::Pending => "pending",
            QuestStatus::InProgress => "in progress",
            QuestStatus::Completed => "completed",
            QuestStatus::Approved => "approved",
            QuestStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// A persisted quest: either a one-off chore or a materialized occurrence
/// of a template.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QuestInstance {
    pub id: InstanceId,
    pub family_id: FamilyId,
    /// Lookup-only back-reference; set for materialized occurrences.
    #[serde(default)]
    pub template_id: Option<TemplateId>,
    /// Together with `template_id`, the natural key of the occurrence.
    #[serde(default)]
    pub occurrence_date: Option<NaiveDate>,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    pub points: u32,
    pub status: QuestStatus,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    /// Points owed to the assignee by an approval whose payout has not
    /// reached the ledger yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_award: Option<u32>,
}

impl QuestInstance {
    /// The `(template, date)` key when this is a materialized occurrence.
    pub fn occurrence_key(&self) -> Option<(&str, NaiveDate)> {
        match (&self.template_id, self.occurrence_date) {
            (Some(t), Some(d)) => Some((t.as_str(), d)),
            _ => None,
        }
    }
}

/// Display-only projection of a template occurrence that has not been
/// materialized. Always pending; has no id.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct VirtualInstance {
    pub family_id: FamilyId,
    pub template_id: TemplateId,
    pub occurrence_date: NaiveDate,
    pub title: String,
    pub category: Option<String>,
    pub points: u32,
    pub assigned_to: Option<UserId>,
    pub due_at: Option<DateTime<Utc>>,
}

/// A quest on the board, persisted or not.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instance {
    Persisted(QuestInstance),
    Virtual(VirtualInstance),
}

impl Instance {
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Instance::Persisted(q) => q.due_at,
            Instance::Virtual(v) => v.due_at,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Instance::Persisted(q) => &q.title,
            Instance::Virtual(v) => &v.title,
        }
    }

    pub fn status(&self) -> QuestStatus {
        match self {
            Instance::Persisted(q) => q.status,
            Instance::Virtual(_) => QuestStatus::Pending,
        }
    }

    pub fn assigned_to(&self) -> Option<&str> {
        match self {
            Instance::Persisted(q) => q.assigned_to.as_deref(),
            Instance::Virtual(v) => v.assigned_to.as_deref(),
        }
    }

    pub fn points(&self) -> u32 {
        match self {
            Instance::Persisted(q) => q.points,
            Instance::Virtual(v) => v.points,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Instance::Virtual(_))
    }
}
