use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{QuestError, StoreError};
use crate::ledger::PointsLedger;
use crate::lifecycle::{self, PointsAward, Transition};
use crate::materialize::MaterializationEngine;
use crate::models::{
    Instance, InstanceId, QuestInstance, QuestStatus, QuestTemplate, RecurrenceRule,
    TemplateId, UserId,
};
use crate::recurrence::{next_occurrences_within, validate_rule};
use crate::storage::QuestStore;
use crate::urgency::{classify, sort_by_urgency, Urgency};

/// Points at a quest the user wants to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestRef {
    /// A persisted instance.
    Id(InstanceId),
    /// An occurrence of a template, persisted or not.
    Occurrence { template_id: TemplateId, date: NaiveDate },
}

impl FromStr for QuestRef {
    type Err = String;

    /// Parses `42` or `trash@2025-01-08`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((template_id, date)) = s.split_once('@') {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| format!("invalid date '{date}': {e}. Use YYYY-MM-DD."))?;
            if template_id.is_empty() {
                return Err("missing template id before '@'".into());
            }
            return Ok(QuestRef::Occurrence {
                template_id: template_id.to_string(),
                date,
            });
        }
        s.parse::<InstanceId>()
            .map(QuestRef::Id)
            .map_err(|_| format!("'{s}' is neither a quest id nor TEMPLATE@YYYY-MM-DD"))
    }
}

impl fmt::Display for QuestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestRef::Id(id) => write!(f, "{id}"),
            QuestRef::Occurrence { template_id, date } => write!(f, "{template_id}@{date}"),
        }
    }
}

/// Input for [`QuestService::create_template`].
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub id: TemplateId,
    pub title: String,
    pub category: Option<String>,
    pub points: u32,
    pub created_by: UserId,
    pub default_assignee: Option<UserId>,
    pub rule: RecurrenceRule,
}

/// Input for [`QuestService::create_quest`].
#[derive(Debug, Clone)]
pub struct NewQuest {
    pub title: String,
    pub category: Option<String>,
    pub points: u32,
    pub assigned_to: Option<UserId>,
    pub due_at: Option<DateTime<Utc>>,
}

/// One row of a family's board.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardEntry {
    pub instance: Instance,
    pub urgency: Urgency,
}

/// What [`QuestService::approve`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalOutcome {
    pub instance: QuestInstance,
    /// Points credited by this call. `None` when nothing was owed or
    /// another call already paid.
    pub paid: Option<PointsAward>,
}

enum Persisted {
    Applied(QuestInstance),
    /// Another writer already moved the quest to the intended status.
    AlreadyApplied(QuestInstance),
}

/// The use cases the CLI (or any other front end) drives.
pub struct QuestService {
    engine: MaterializationEngine,
    ledger: Arc<dyn PointsLedger>,
    max_lookahead_days: u32,
}

impl QuestService {
    pub fn new(
        store: Arc<dyn QuestStore>,
        ledger: Arc<dyn PointsLedger>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            engine: MaterializationEngine::new(store, clock, config.due_policy),
            ledger,
            max_lookahead_days: config.max_lookahead_days,
        }
    }

    pub fn engine(&self) -> &MaterializationEngine {
        &self.engine
    }

    fn store(&self) -> &dyn QuestStore {
        self.engine.store()
    }

    fn clock(&self) -> &dyn Clock {
        self.engine.clock()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock().today()
    }

    /// Validates the rule and stores a new template.
    pub fn create_template(&self, family_id: &str, new: NewTemplate) -> Result<QuestTemplate, QuestError> {
        // `@` separates template and date in a `QuestRef`.
        if new.id.is_empty() || new.id.contains('@') {
            return Err(QuestError::InvalidRule(format!(
                "template id '{}' must be non-empty and must not contain '@'",
                new.id
            )));
        }
        validate_rule(&new.rule)?;
        let template = QuestTemplate {
            id: new.id,
            family_id: family_id.to_string(),
            title: new.title,
            category: new.category,
            points: new.points,
            created_by: new.created_by,
            default_assignee: new.default_assignee,
            rule: new.rule,
            last_notified_at: None,
        };
        match self.store().insert_template(template.clone()) {
            Ok(()) => {
                tracing::info!(template_id = %template.id, kind = %template.rule.kind, "created template");
                Ok(template)
            }
            Err(StoreError::TemplateExists(id)) => Err(QuestError::AlreadyExists(id)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn template(&self, template_id: &str) -> Result<QuestTemplate, QuestError> {
        self.store()
            .get_template(template_id)?
            .ok_or_else(|| QuestError::template_not_found(template_id))
    }

    pub fn templates(&self, family_id: &str) -> Result<Vec<QuestTemplate>, QuestError> {
        Ok(self.store().list_templates(family_id)?)
    }

    /// Replaces a template's recurrence rule.
    pub fn update_recurrence(&self, template_id: &str, rule: RecurrenceRule) -> Result<QuestTemplate, QuestError> {
        validate_rule(&rule)?;
        let mut template = self.template(template_id)?;
        template.rule = rule;
        self.store().save_template(&template)?;
        tracing::info!(template_id, "updated recurrence");
        Ok(template)
    }

    /// Suppresses a single occurrence of a template.
    pub fn exclude_date(&self, template_id: &str, date: NaiveDate) -> Result<QuestTemplate, QuestError> {
        let mut template = self.template(template_id)?;
        if template.rule.excluded_dates.insert(date) {
            self.store().save_template(&template)?;
            tracing::info!(template_id, %date, "excluded occurrence");
        }
        Ok(template)
    }

    /// Stops a template from producing new occurrences, keeping its history.
    ///
    /// The end date becomes yesterday. A template that has not started yet
    /// is collapsed onto that day and the day itself excluded, so it never
    /// produces anything.
    pub fn retire_template(&self, template_id: &str) -> Result<QuestTemplate, QuestError> {
        let mut template = self.template(template_id)?;
        let yesterday = self.today().pred_opt().unwrap_or(NaiveDate::MIN);
        let rule = &mut template.rule;
        if yesterday < rule.start_date {
            rule.start_date = yesterday;
            rule.excluded_dates.insert(yesterday);
        }
        rule.end_date = Some(rule.end_date.map_or(yesterday, |end| end.min(yesterday)));
        self.store().save_template(&template)?;
        tracing::info!(template_id, end_date = %yesterday, "retired template");
        Ok(template)
    }

    /// Dates on which a template will produce quests, starting at `from`.
    pub fn upcoming(&self, template_id: &str, from: NaiveDate, limit: usize) -> Result<Vec<NaiveDate>, QuestError> {
        let template = self.template(template_id)?;
        Ok(next_occurrences_within(&template.rule, from, limit, self.max_lookahead_days).collect())
    }

    /// Creates a one-off quest.
    pub fn create_quest(&self, family_id: &str, new: NewQuest) -> Result<QuestInstance, QuestError> {
        let instance = QuestInstance {
            id: 0,
            family_id: family_id.to_string(),
            template_id: None,
            occurrence_date: None,
            title: new.title,
            category: new.category,
            points: new.points,
            status: QuestStatus::Pending,
            assigned_to: new.assigned_to,
            due_at: new.due_at,
            created_at: self.clock().now(),
            started_at: None,
            completed_at: None,
            approved_at: None,
            pending_award: None,
        };
        let created = self.store().create_instance_if_absent(instance)?;
        tracing::info!(id = created.id, "created quest");
        Ok(created)
    }

    /// The family's board for `date`, most urgent first, with urgency tiers.
    pub fn board(&self, family_id: &str, date: NaiveDate) -> Result<Vec<BoardEntry>, QuestError> {
        let mut instances = self.engine.instances_due(family_id, date)?;
        sort_by_urgency(&mut instances);
        let now = self.clock().now();
        Ok(instances
            .into_iter()
            .map(|instance| BoardEntry {
                urgency: classify(instance.due_at(), now),
                instance,
            })
            .collect())
    }

    /// Looks up a persisted quest, materializing occurrences on the way.
    pub fn resolve(&self, quest: &QuestRef) -> Result<QuestInstance, QuestError> {
        match quest {
            QuestRef::Id(id) => self
                .store()
                .get_instance(*id)?
                .ok_or_else(|| QuestError::instance_not_found(*id)),
            QuestRef::Occurrence { template_id, date } => self.engine.materialize(template_id, *date),
        }
    }

    /// Resolves a quest for an action only its assignee may take. An
    /// occurrence that is not persisted yet is checked against the
    /// template's default assignee before it gets materialized.
    fn resolve_for_assignee(&self, quest: &QuestRef, actor: &str, action: &'static str) -> Result<QuestInstance, QuestError> {
        let unauthorized = || QuestError::Unauthorized {
            actor: actor.to_string(),
            action,
        };
        if let QuestRef::Occurrence { template_id, date } = quest {
            if self.store().find_instance(template_id, *date)?.is_none()
                && self.template(template_id)?.default_assignee.as_deref() != Some(actor)
            {
                return Err(unauthorized());
            }
        }
        let current = self.resolve(quest)?;
        if current.assigned_to.as_deref() != Some(actor) {
            return Err(unauthorized());
        }
        Ok(current)
    }

    /// Writes a transition conditionally on the status it was computed from.
    fn persist(
        &self,
        before: &QuestInstance,
        after: QuestInstance,
        transition: Transition,
    ) -> Result<Persisted, QuestError> {
        match self.store().update_instance(&after, before.status) {
            Ok(()) => {
                tracing::info!(id = after.id, transition = transition.name(), status = %after.status, "quest updated");
                Ok(Persisted::Applied(after))
            }
            Err(StoreError::Conflict { .. }) => {
                let current = self
                    .store()
                    .get_instance(before.id)?
                    .ok_or_else(|| QuestError::instance_not_found(before.id))?;
                if current.status == transition.target() {
                    tracing::warn!(id = before.id, transition = transition.name(), "transition already applied by another writer");
                    Ok(Persisted::AlreadyApplied(current))
                } else {
                    Err(QuestError::ConcurrencyConflict(format!("quest {}", before.id)))
                }
            }
            Err(StoreError::NotFound(id)) => Err(QuestError::instance_not_found(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// The assignee begins working on a quest.
    pub fn start(&self, quest: &QuestRef, actor: &str) -> Result<QuestInstance, QuestError> {
        let current = self.resolve_for_assignee(quest, actor, "start")?;
        let next = lifecycle::start(&current, actor, self.clock().now())?;
        match self.persist(&current, next, Transition::Start)? {
            Persisted::Applied(i) | Persisted::AlreadyApplied(i) => Ok(i),
        }
    }

    /// The assignee submits a quest for review.
    pub fn complete(&self, quest: &QuestRef, actor: &str) -> Result<QuestInstance, QuestError> {
        let current = self.resolve_for_assignee(quest, actor, "complete")?;
        let next = lifecycle::complete(&current, actor, self.clock().now())?;
        match self.persist(&current, next, Transition::Complete)? {
            Persisted::Applied(i) | Persisted::AlreadyApplied(i) => Ok(i),
        }
    }

    /// Accepts a submitted quest and pays out points to the assignee.
    ///
    /// `points` overrides the quest's own point value. The approval is stored
    /// with its award pending before the ledger is credited, so if crediting
    /// fails, approving the quest again pays the pending award.
    pub fn approve(&self, id: InstanceId, reviewer: &str, points: Option<u32>) -> Result<ApprovalOutcome, QuestError> {
        let current = self.resolve(&QuestRef::Id(id))?;
        if current.status == QuestStatus::Approved && current.pending_award.is_some() {
            tracing::info!(id, reviewer, "paying out pending award");
            return self.pay_pending(current);
        }
        let awarded = points.unwrap_or(current.points);
        let approval = lifecycle::approve(&current, reviewer, awarded, self.clock().now())?;
        match self.persist(&current, approval.instance, Transition::Approve)? {
            Persisted::Applied(instance) => self.pay_pending(instance),
            Persisted::AlreadyApplied(instance) => Ok(ApprovalOutcome { instance, paid: None }),
        }
    }

    /// Credits the pending award of an approved quest, then clears it.
    fn pay_pending(&self, mut instance: QuestInstance) -> Result<ApprovalOutcome, QuestError> {
        let (Some(user), Some(points)) = (instance.assigned_to.clone(), instance.pending_award) else {
            return Ok(ApprovalOutcome { instance, paid: None });
        };
        self.ledger.award(&user, points)?;
        tracing::info!(id = instance.id, user = %user, points, "awarded points");
        instance.pending_award = None;
        self.store().update_instance(&instance, QuestStatus::Approved)?;
        Ok(ApprovalOutcome {
            instance,
            paid: Some(PointsAward {
                recipient: Some(user),
                points,
            }),
        })
    }

    /// Turns down a submitted quest.
    pub fn reject(&self, id: InstanceId, reviewer: &str) -> Result<QuestInstance, QuestError> {
        let current = self.resolve(&QuestRef::Id(id))?;
        let next = lifecycle::reject(&current, reviewer)?;
        match self.persist(&current, next, Transition::Reject)? {
            Persisted::Applied(i) | Persisted::AlreadyApplied(i) => Ok(i),
        }
    }

    pub fn balance(&self, user: &str) -> Result<u64, QuestError> {
        Ok(self.ledger.balance(user)?)
    }
}
