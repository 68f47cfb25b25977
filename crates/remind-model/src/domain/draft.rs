use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use thiserror::Error;

use super::time_serde;
use crate::{
    DEFAULT_LEAD_HOURS, LeadHours, MAX_LEAD_HOURS, Priority, Task, TaskId, TaskStatus, UserId,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("task title must not be empty")]
    EmptyTitle,
    #[error("reminder lead of {0} hours exceeds the maximum")]
    LeadTooLarge(LeadHours),
}

/// Payload for creating a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, with = "time_serde::opt", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<SystemTime>,
    #[serde(default = "default_lead")]
    pub reminder_lead_hours: LeadHours,
    #[serde(default)]
    pub priority: Priority,
}

fn default_lead() -> LeadHours {
    DEFAULT_LEAD_HOURS
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            due_date: None,
            reminder_lead_hours: DEFAULT_LEAD_HOURS,
            priority: Priority::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_due_date(mut self, due: SystemTime) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_lead_hours(mut self, lead: LeadHours) -> Self {
        self.reminder_lead_hours = lead;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<(), DraftError> {
        if self.title.trim().is_empty() {
            return Err(DraftError::EmptyTitle);
        }
        if self.reminder_lead_hours > MAX_LEAD_HOURS {
            return Err(DraftError::LeadTooLarge(self.reminder_lead_hours));
        }
        Ok(())
    }

    /// Stamp the draft into a full record: fresh id, unnotified, timestamps
    /// set to `now`.
    pub fn into_task(self, owner: UserId, now: SystemTime) -> Task {
        Task {
            id: TaskId::random(),
            owner,
            title: self.title,
            description: self.description,
            status: TaskStatus::Pending,
            priority: self.priority,
            due_date: self.due_date,
            reminder_lead_hours: self.reminder_lead_hours,
            notified: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial task update; `None` fields are left untouched.
///
/// The `notified` flag is deliberately absent: it is owned by the reminder
/// sweep and flips through the store's conditional mark operation only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, with = "time_serde::opt", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<SystemTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_lead_hours: Option<LeadHours>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.reminder_lead_hours.is_none()
    }

    /// Apply the patch to a task in place, bumping `updated_at`.
    pub fn apply(&self, task: &mut Task, now: SystemTime) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due) = self.due_date {
            task.due_date = Some(due);
        }
        if let Some(lead) = self.reminder_lead_hours {
            task.reminder_lead_hours = lead;
        }
        task.updated_at = now;
    }
}
