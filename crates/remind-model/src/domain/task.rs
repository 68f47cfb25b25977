use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::time_serde;
use crate::{LeadHours, Priority, TaskId, TaskStatus, UserId};

/// A stored task record.
///
/// The reminder subsystem references tasks but does not own their lifecycle;
/// creation and edits come from the surrounding application through the task
/// store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// Owning user record, resolved for delivery through the user directory.
    pub owner: UserId,
    /// Non-empty task title.
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Workflow state; does not gate reminders.
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    /// Absolute due timestamp. Tasks without one are never reminder-eligible.
    #[serde(default, with = "time_serde::opt", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<SystemTime>,
    /// Hours before `due_date` at which the reminder window opens.
    pub reminder_lead_hours: LeadHours,
    /// Set to `true` exactly once, after a reminder has been delivered and
    /// durably recorded. Never reset.
    pub notified: bool,
    #[serde(with = "time_serde")]
    pub created_at: SystemTime,
    #[serde(with = "time_serde")]
    pub updated_at: SystemTime,
}

impl Task {
    /// Instant at which the reminder window opens: `due_date` minus the lead.
    ///
    /// `None` when the task carries no due date (the window is undefined).
    /// A lead reaching past the unix epoch saturates at the epoch.
    pub fn reminder_at(&self) -> Option<SystemTime> {
        let due = self.due_date?;
        let lead = Duration::from_secs(u64::from(self.reminder_lead_hours) * 3600);
        Some(due.checked_sub(lead).unwrap_or(UNIX_EPOCH))
    }

    /// Whether the reminder window has opened at `now`.
    ///
    /// The comparison is inclusive: the task becomes eligible at the exact
    /// window instant and stays eligible until notified.
    pub fn reminder_due(&self, now: SystemTime) -> bool {
        match self.reminder_at() {
            Some(at) => now >= at,
            None => false,
        }
    }
}
