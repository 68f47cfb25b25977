use thiserror::Error;

use remind_model::TaskId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("task already exists: {0}")]
    DuplicateTask(TaskId),

    #[error("invalid task data: {0}")]
    InvalidTask(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

impl From<remind_model::DraftError> for StoreError {
    fn from(e: remind_model::DraftError) -> Self {
        StoreError::InvalidTask(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid notifier configuration: {0}")]
    InvalidConfig(String),

    #[error("delivery transport failure: {0}")]
    Transport(String),

    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Whole-sweep failures. Per-task failures never surface here; they are
/// contained in the sweep report.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to list unnotified tasks: {0}")]
    Listing(#[source] StoreError),
}

#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("cadence interval must be non-zero")]
    ZeroInterval,
}
