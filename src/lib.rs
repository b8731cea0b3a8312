//! Recurring household chores ("quests") with a submit/approve workflow.
//!
//! The library decides, for any calendar date, which quests exist, whether
//! they are persisted yet, what state they are in and how urgent they are:
//!
//! - [`recurrence`] evaluates recurrence rules against dates.
//! - [`materialize`] merges persisted quests with virtual occurrences and
//!   persists an occurrence exactly once on demand.
//! - [`lifecycle`] holds the guarded status transitions.
//! - [`urgency`] buckets quests by time left and orders them for display.
//! - [`service`] wires these together over a [`storage::QuestStore`].

pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod materialize;
pub mod models;
pub mod recurrence;
pub mod service;
pub mod storage;
pub mod urgency;

pub use error::{QuestError, StoreError};
