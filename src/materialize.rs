use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::clock::Clock;
use crate::config::DuePolicy;
use crate::error::{QuestError, StoreError};
use crate::models::{Instance, QuestInstance, QuestStatus, QuestTemplate, VirtualInstance};
use crate::recurrence::occurs_on;
use crate::storage::QuestStore;

/// Conditional-create attempts before `materialize` gives up. A lost create
/// leaves the winner's row visible to the next find.
const MAX_CREATE_ATTEMPTS: usize = 2;

/// Decides which quests exist on a date and turns template occurrences into
/// persisted instances exactly once.
pub struct MaterializationEngine {
    store: Arc<dyn QuestStore>,
    clock: Arc<dyn Clock>,
    due_policy: DuePolicy,
}

impl MaterializationEngine {
    pub fn new(store: Arc<dyn QuestStore>, clock: Arc<dyn Clock>, due_policy: DuePolicy) -> Self {
        Self {
            store,
            clock,
            due_policy,
        }
    }

    pub fn store(&self) -> &dyn QuestStore {
        self.store.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Due instant of a template's occurrence on `date`.
    ///
    /// Uses the rule's time of day in family time. Without one, the due
    /// policy decides between the end of that day and no due instant.
    pub fn due_at_for(&self, template: &QuestTemplate, date: NaiveDate) -> Option<DateTime<Utc>> {
        match (template.rule.due_time_of_day, self.due_policy) {
            (Some(time), _) => Some(self.clock.instant_at(date, time)),
            (None, DuePolicy::EndOfDay) => Some(self.clock.end_of_day(date)),
            (None, DuePolicy::Undated) => None,
        }
    }

    fn project(&self, template: &QuestTemplate, date: NaiveDate) -> VirtualInstance {
        VirtualInstance {
            family_id: template.family_id.clone(),
            template_id: template.id.clone(),
            occurrence_date: date,
            title: template.title.clone(),
            category: template.category.clone(),
            points: template.points,
            assigned_to: template.default_assignee.clone(),
            due_at: self.due_at_for(template, date),
        }
    }

    fn new_instance(&self, template: &QuestTemplate, date: NaiveDate) -> QuestInstance {
        QuestInstance {
            id: 0, // assigned by the store
            family_id: template.family_id.clone(),
            template_id: Some(template.id.clone()),
            occurrence_date: Some(date),
            title: template.title.clone(),
            category: template.category.clone(),
            points: template.points,
            status: QuestStatus::Pending,
            assigned_to: template.default_assignee.clone(),
            due_at: self.due_at_for(template, date),
            created_at: self.clock.now(),
            started_at: None,
            completed_at: None,
            approved_at: None,
            pending_award: None,
        }
    }

    /// Everything on a family's board for `date`.
    ///
    /// Persisted instances come back as they are stored. Each active template
    /// that occurs on `date` and has not been materialized for it adds a
    /// virtual instance. Nothing is written. The order is unspecified.
    pub fn instances_due(&self, family_id: &str, date: NaiveDate) -> Result<Vec<Instance>, QuestError> {
        let persisted = self.store.list_instances(family_id, date)?;
        let templates = self.store.list_active_templates(family_id, date)?;

        let materialized: HashSet<String> = persisted
            .iter()
            .filter_map(|i| i.occurrence_key())
            .filter(|(_, d)| *d == date)
            .map(|(t, _)| t.to_string())
            .collect();

        let virtuals: Vec<Instance> = templates
            .iter()
            .filter(|t| occurs_on(&t.rule, date) && !materialized.contains(&t.id))
            .map(|t| Instance::Virtual(self.project(t, date)))
            .collect();

        tracing::debug!(
            family_id,
            %date,
            persisted = persisted.len(),
            virtual_count = virtuals.len(),
            "computed board"
        );

        Ok(persisted
            .into_iter()
            .map(Instance::Persisted)
            .chain(virtuals)
            .collect())
    }

    /// Returns the persisted instance for `(template_id, occurrence_date)`,
    /// creating it if it does not exist yet.
    ///
    /// Calling this any number of times, from any number of threads, yields
    /// the same instance id.
    ///
    /// # Errors
    ///
    /// - [`QuestError::NotFound`] if the template does not exist.
    /// - [`QuestError::InvalidOccurrence`] if the rule does not produce
    ///   `occurrence_date`.
    /// - [`QuestError::ConcurrencyConflict`] if the conflict retry also lost.
    pub fn materialize(&self, template_id: &str, occurrence_date: NaiveDate) -> Result<QuestInstance, QuestError> {
        let template = self
            .store
            .get_template(template_id)?
            .ok_or_else(|| QuestError::template_not_found(template_id))?;

        if !occurs_on(&template.rule, occurrence_date) {
            return Err(QuestError::InvalidOccurrence {
                template_id: template_id.to_string(),
                date: occurrence_date,
            });
        }

        for attempt in 0..MAX_CREATE_ATTEMPTS {
            if let Some(existing) = self.store.find_instance(template_id, occurrence_date)? {
                tracing::debug!(template_id, %occurrence_date, id = existing.id, "occurrence already materialized");
                return Ok(existing);
            }
            match self
                .store
                .create_instance_if_absent(self.new_instance(&template, occurrence_date))
            {
                Ok(created) => {
                    tracing::info!(template_id, %occurrence_date, id = created.id, "materialized occurrence");
                    return Ok(created);
                }
                Err(StoreError::Exists { .. }) => {
                    tracing::warn!(template_id, %occurrence_date, attempt, "lost materialization race, re-reading");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(QuestError::ConcurrencyConflict(format!(
            "{template_id}@{occurrence_date}"
        )))
    }
}
