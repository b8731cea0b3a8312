use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use super::{QuestStore, Tables};
use crate::error::StoreError;
use crate::models::{InstanceId, QuestInstance, QuestStatus, QuestTemplate};

/// A process-local store. Every operation runs under a single lock, so the
/// conditional create and update are atomic across threads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored instance, in insertion order.
    pub fn all_instances(&self) -> Vec<QuestInstance> {
        self.lock().instances.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl QuestStore for MemoryStore {
    fn get_template(&self, id: &str) -> Result<Option<QuestTemplate>, StoreError> {
        Ok(self.lock().template(id))
    }

    fn list_templates(&self, family_id: &str) -> Result<Vec<QuestTemplate>, StoreError> {
        Ok(self.lock().templates_of(family_id))
    }

    fn insert_template(&self, template: QuestTemplate) -> Result<(), StoreError> {
        self.lock().insert_template(template)
    }

    fn save_template(&self, template: &QuestTemplate) -> Result<(), StoreError> {
        self.lock().save_template(template);
        Ok(())
    }

    fn get_instance(&self, id: InstanceId) -> Result<Option<QuestInstance>, StoreError> {
        Ok(self.lock().instance(id))
    }

    fn find_instance(&self, template_id: &str, occurrence_date: NaiveDate) -> Result<Option<QuestInstance>, StoreError> {
        Ok(self.lock().find_occurrence(template_id, occurrence_date))
    }

    fn create_instance_if_absent(&self, instance: QuestInstance) -> Result<QuestInstance, StoreError> {
        self.lock().create_if_absent(instance)
    }

    fn update_instance(&self, instance: &QuestInstance, expected_status: QuestStatus) -> Result<(), StoreError> {
        self.lock().update(instance, expected_status)
    }

    fn list_instances(&self, family_id: &str, date: NaiveDate) -> Result<Vec<QuestInstance>, StoreError> {
        Ok(self.lock().board(family_id, date))
    }
}
