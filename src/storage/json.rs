use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{QuestStore, Tables};
use crate::error::StoreError;
use crate::ledger::PointsLedger;
use crate::models::{InstanceId, QuestInstance, QuestStatus, QuestTemplate};

/// A store backed by pretty-printed JSON files in one directory:
///
/// - `templates.json`: all quest templates.
/// - `instances.json`: all persisted quest instances.
/// - `points.json`: point balances per user.
///
/// Every operation reads the files, applies the change and writes them back
/// while holding an in-process lock. Separate processes sharing the same
/// directory are not coordinated.
#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    /// Opens (and creates if needed) the data directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn templates_path(&self) -> PathBuf {
        self.dir.join("templates.json")
    }

    fn instances_path(&self) -> PathBuf {
        self.dir.join("instances.json")
    }

    fn points_path(&self) -> PathBuf {
        self.dir.join("points.json")
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load_tables(&self) -> Result<Tables, StoreError> {
        Ok(Tables {
            templates: load_json(&self.templates_path())?,
            instances: load_json(&self.instances_path())?,
        })
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let _guard = self.guard();
        Ok(f(&self.load_tables()?))
    }

    fn write_templates<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let _guard = self.guard();
        let mut tables = self.load_tables()?;
        let out = f(&mut tables)?;
        save_json(&self.templates_path(), &tables.templates)?;
        Ok(out)
    }

    fn write_instances<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let _guard = self.guard();
        let mut tables = self.load_tables()?;
        let out = f(&mut tables)?;
        save_json(&self.instances_path(), &tables.instances)?;
        Ok(out)
    }

    /// Deletes all data files.
    pub fn reset(&self) -> Result<(), StoreError> {
        let _guard = self.guard();
        for path in [self.templates_path(), self.instances_path(), self.points_path()] {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// Reads a JSON file, treating a missing file as the default value.
fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let mut f = OpenOptions::new().read(true).open(path)?;
    let mut s = String::new();
    f.read_to_string(&mut s)?;
    if s.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&s)?)
}

/// Overwrites `path` with the pretty-printed JSON of `value`.
fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let s = serde_json::to_string_pretty(value)?;
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    f.write_all(s.as_bytes())?;
    Ok(())
}

impl QuestStore for JsonStore {
    fn get_template(&self, id: &str) -> Result<Option<QuestTemplate>, StoreError> {
        self.read(|t| t.template(id))
    }

    fn list_templates(&self, family_id: &str) -> Result<Vec<QuestTemplate>, StoreError> {
        self.read(|t| t.templates_of(family_id))
    }

    fn insert_template(&self, template: QuestTemplate) -> Result<(), StoreError> {
        self.write_templates(|t| t.insert_template(template))
    }

    fn save_template(&self, template: &QuestTemplate) -> Result<(), StoreError> {
        self.write_templates(|t| {
            t.save_template(template);
            Ok(())
        })
    }

    fn get_instance(&self, id: InstanceId) -> Result<Option<QuestInstance>, StoreError> {
        self.read(|t| t.instance(id))
    }

    fn find_instance(&self, template_id: &str, occurrence_date: NaiveDate) -> Result<Option<QuestInstance>, StoreError> {
        self.read(|t| t.find_occurrence(template_id, occurrence_date))
    }

    fn create_instance_if_absent(&self, instance: QuestInstance) -> Result<QuestInstance, StoreError> {
        self.write_instances(|t| t.create_if_absent(instance))
    }

    fn update_instance(&self, instance: &QuestInstance, expected_status: QuestStatus) -> Result<(), StoreError> {
        self.write_instances(|t| t.update(instance, expected_status))
    }

    fn list_instances(&self, family_id: &str, date: NaiveDate) -> Result<Vec<QuestInstance>, StoreError> {
        self.read(|t| t.board(family_id, date))
    }
}

impl PointsLedger for JsonStore {
    fn award(&self, user: &str, points: u32) -> Result<(), StoreError> {
        let _guard = self.guard();
        let path = self.points_path();
        let mut balances: BTreeMap<String, u64> = load_json(&path)?;
        *balances.entry(user.to_string()).or_default() += u64::from(points);
        save_json(&path, &balances)
    }

    fn balance(&self, user: &str) -> Result<u64, StoreError> {
        let _guard = self.guard();
        let balances: BTreeMap<String, u64> = load_json(&self.points_path())?;
        Ok(balances.get(user).copied().unwrap_or(0))
    }
}
