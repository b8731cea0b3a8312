use chrono::NaiveDate;

use crate::models::{InstanceId, QuestStatus};

/// Errors returned by a [`QuestStore`](crate::storage::QuestStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Optimistic update lost: the stored status no longer matches the one
    /// the caller read.
    #[error("instance {id} changed concurrently: expected status {expected}, found {actual}")]
    Conflict {
        id: InstanceId,
        expected: QuestStatus,
        actual: QuestStatus,
    },

    /// Conditional create found an instance for the same occurrence.
    #[error("instance already exists for {template_id}@{date}")]
    Exists { template_id: String, date: NaiveDate },

    /// A template with this id is already stored.
    #[error("template already exists: {0}")]
    TemplateExists(String),

    /// No instance with the given id.
    #[error("instance not found: {0}")]
    NotFound(InstanceId),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors surfaced by the quest core and service layer.
#[derive(Debug, thiserror::Error)]
pub enum QuestError {
    /// Template or instance missing.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The recurrence rule does not produce an occurrence on this date.
    #[error("template {template_id} has no occurrence on {date}")]
    InvalidOccurrence { template_id: String, date: NaiveDate },

    /// Lifecycle guard violated.
    #[error("cannot {action} a quest that is {from}")]
    InvalidTransition {
        from: QuestStatus,
        action: &'static str,
    },

    /// Actor is not permitted to perform the transition.
    #[error("{actor} is not allowed to {action} this quest")]
    Unauthorized { actor: String, action: &'static str },

    /// Lost a race against another writer; retry with a fresh read.
    #[error("concurrent modification of {0}; reload and retry")]
    ConcurrencyConflict(String),

    /// Recurrence rule invariant violated.
    #[error("invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("template already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QuestError {
    pub(crate) fn template_not_found(id: &str) -> Self {
        QuestError::NotFound {
            kind: "template",
            id: id.to_string(),
        }
    }

    pub(crate) fn instance_not_found(id: InstanceId) -> Self {
        QuestError::NotFound {
            kind: "quest",
            id: id.to_string(),
        }
    }
}

/// Failure to read the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}
