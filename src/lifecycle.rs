//! Guarded status transitions for a persisted quest.
//!
//! ```text
//! pending -> in_progress -> completed -> approved
//!                                     \-> rejected
//! ```
//!
//! Every function takes the current instance by reference and returns an
//! updated copy. A failed guard returns an error and leaves the input alone.

use chrono::{DateTime, Utc};

use crate::error::QuestError;
use crate::models::{QuestInstance, QuestStatus, UserId};

/// Points to hand out after an approval. Delivering them is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsAward {
    /// `None` when the quest was never assigned to anyone.
    pub recipient: Option<UserId>,
    pub points: u32,
}

/// Result of [`approve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Approval {
    pub instance: QuestInstance,
    pub award: PointsAward,
}

fn require(instance: &QuestInstance, status: QuestStatus, action: &'static str) -> Result<(), QuestError> {
    if instance.status == status {
        Ok(())
    } else {
        Err(QuestError::InvalidTransition {
            from: instance.status,
            action,
        })
    }
}

/// The four lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Complete,
    Approve,
    Reject,
}

impl Transition {
    /// Status the quest is in once the transition has been applied.
    pub fn target(self) -> QuestStatus {
        match self {
            Transition::Start => QuestStatus::InProgress,
            Transition::Complete => QuestStatus::Completed,
            Transition::Approve => QuestStatus::Approved,
            Transition::Reject => QuestStatus::Rejected,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Complete => "complete",
            Transition::Approve => "approve",
            Transition::Reject => "reject",
        }
    }
}

/// Begins a pending quest. Only the assignee may start it.
pub fn start(instance: &QuestInstance, actor: &str, now: DateTime<Utc>) -> Result<QuestInstance, QuestError> {
    if instance.assigned_to.as_deref() != Some(actor) {
        return Err(QuestError::Unauthorized {
            actor: actor.to_string(),
            action: "start",
        });
    }
    require(instance, QuestStatus::Pending, "start")?;
    let mut next = instance.clone();
    next.status = QuestStatus::InProgress;
    next.started_at = Some(now);
    Ok(next)
}

/// Submits an in-progress quest for review.
///
/// Who may submit is decided by the submission workflow, so `actor` is only
/// carried for the audit trail.
pub fn complete(instance: &QuestInstance, actor: &str, now: DateTime<Utc>) -> Result<QuestInstance, QuestError> {
    require(instance, QuestStatus::InProgress, "complete")?;
    tracing::debug!(id = instance.id, actor, "quest submitted");
    let mut next = instance.clone();
    next.status = QuestStatus::Completed;
    next.completed_at = Some(now);
    Ok(next)
}

/// Accepts a completed quest and reports the points to award. The award is
/// recorded on the instance as pending until the ledger has paid it.
pub fn approve(
    instance: &QuestInstance,
    reviewer: &str,
    awarded_points: u32,
    now: DateTime<Utc>,
) -> Result<Approval, QuestError> {
    require(instance, QuestStatus::Completed, "approve")?;
    tracing::debug!(id = instance.id, reviewer, awarded_points, "quest approved");
    let mut next = instance.clone();
    next.status = QuestStatus::Approved;
    next.approved_at = Some(now);
    next.pending_award = next.assigned_to.as_ref().map(|_| awarded_points);
    Ok(Approval {
        award: PointsAward {
            recipient: next.assigned_to.clone(),
            points: awarded_points,
        },
        instance: next,
    })
}

/// Turns down a completed quest. No points are awarded.
pub fn reject(instance: &QuestInstance, reviewer: &str) -> Result<QuestInstance, QuestError> {
    require(instance, QuestStatus::Completed, "reject")?;
    tracing::debug!(id = instance.id, reviewer, "quest rejected");
    let mut next = instance.clone();
    next.status = QuestStatus::Rejected;
    Ok(next)
}
