//! Persistence port for templates and quest instances.

mod json;
mod memory;

use chrono::NaiveDate;

use crate::error::StoreError;
use crate::models::{InstanceId, QuestInstance, QuestStatus, QuestTemplate};

pub use json::JsonStore;
pub use memory::MemoryStore;

/// Storage backend for the quest core.
///
/// Implementations must make [`create_instance_if_absent`] atomic with
/// respect to the `(template_id, occurrence_date)` natural key, and
/// [`update_instance`] conditional on the stored status.
///
/// [`create_instance_if_absent`]: QuestStore::create_instance_if_absent
/// [`update_instance`]: QuestStore::update_instance
pub trait QuestStore: Send + Sync {
    fn get_template(&self, id: &str) -> Result<Option<QuestTemplate>, StoreError>;

    /// All templates of a family, retired ones included.
    fn list_templates(&self, family_id: &str) -> Result<Vec<QuestTemplate>, StoreError>;

    /// Templates of a family that have not ended before `as_of`.
    fn list_active_templates(&self, family_id: &str, as_of: NaiveDate) -> Result<Vec<QuestTemplate>, StoreError> {
        let mut templates = self.list_templates(family_id)?;
        templates.retain(|t| t.rule.end_date.map_or(true, |end| end >= as_of));
        Ok(templates)
    }

    /// Stores a new template. Fails with [`StoreError::TemplateExists`] if
    /// the id is taken.
    fn insert_template(&self, template: QuestTemplate) -> Result<(), StoreError>;

    /// Inserts or replaces a template.
    fn save_template(&self, template: &QuestTemplate) -> Result<(), StoreError>;

    fn get_instance(&self, id: InstanceId) -> Result<Option<QuestInstance>, StoreError>;

    fn find_instance(&self, template_id: &str, occurrence_date: NaiveDate) -> Result<Option<QuestInstance>, StoreError>;

    /// Persists `instance` under a freshly assigned id and returns it.
    ///
    /// When the instance carries an occurrence key that is already stored,
    /// nothing is written and [`StoreError::Exists`] is returned.
    fn create_instance_if_absent(&self, instance: QuestInstance) -> Result<QuestInstance, StoreError>;

    /// Replaces the stored instance if its status is still `expected_status`.
    fn update_instance(&self, instance: &QuestInstance, expected_status: QuestStatus) -> Result<(), StoreError>;

    /// Instances on a family's board for `date`: occurrences materialized for
    /// that date plus one-off quests that are not yet resolved.
    fn list_instances(&self, family_id: &str, date: NaiveDate) -> Result<Vec<QuestInstance>, StoreError>;
}

/// In-memory tables shared by the store implementations.
#[derive(Debug, Default, Clone)]
pub(crate) struct Tables {
    pub templates: Vec<QuestTemplate>,
    pub instances: Vec<QuestInstance>,
}

impl Tables {
    pub fn template(&self, id: &str) -> Option<QuestTemplate> {
        self.templates.iter().find(|t| t.id == id).cloned()
    }

    pub fn templates_of(&self, family_id: &str) -> Vec<QuestTemplate> {
        self.templates
            .iter()
            .filter(|t| t.family_id == family_id)
            .cloned()
            .collect()
    }

    pub fn insert_template(&mut self, template: QuestTemplate) -> Result<(), StoreError> {
        if self.templates.iter().any(|t| t.id == template.id) {
            return Err(StoreError::TemplateExists(template.id));
        }
        self.templates.push(template);
        Ok(())
    }

    pub fn save_template(&mut self, template: &QuestTemplate) {
        if let Some(t) = self.templates.iter_mut().find(|t| t.id == template.id) {
            *t = template.clone();
        } else {
            self.templates.push(template.clone());
        }
    }

    pub fn instance(&self, id: InstanceId) -> Option<QuestInstance> {
        self.instances.iter().find(|i| i.id == id).cloned()
    }

    pub fn find_occurrence(&self, template_id: &str, date: NaiveDate) -> Option<QuestInstance> {
        self.instances
            .iter()
            .find(|i| i.occurrence_key() == Some((template_id, date)))
            .cloned()
    }

    pub fn create_if_absent(&mut self, mut instance: QuestInstance) -> Result<QuestInstance, StoreError> {
        if let Some((template_id, date)) = instance.occurrence_key() {
            if self.find_occurrence(template_id, date).is_some() {
                return Err(StoreError::Exists {
                    template_id: template_id.to_string(),
                    date,
                });
            }
        }
        instance.id = self.instances.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        self.instances.push(instance.clone());
        Ok(instance)
    }

    pub fn update(&mut self, instance: &QuestInstance, expected: QuestStatus) -> Result<(), StoreError> {
        let stored = self
            .instances
            .iter_mut()
            .find(|i| i.id == instance.id)
            .ok_or(StoreError::NotFound(instance.id))?;
        if stored.status != expected {
            return Err(StoreError::Conflict {
                id: instance.id,
                expected,
                actual: stored.status,
            });
        }
        *stored = instance.clone();
        Ok(())
    }

    pub fn board(&self, family_id: &str, date: NaiveDate) -> Vec<QuestInstance> {
        self.instances
            .iter()
            .filter(|i| i.family_id == family_id)
            .filter(|i| match i.occurrence_date {
                Some(d) => d == date,
                None => !i.status.is_terminal(),
            })
            .cloned()
            .collect()
    }
}
