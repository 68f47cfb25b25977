use serde::{Deserialize, Serialize};

/// Workflow state of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// Task has been created but not started.
    #[default]
    Pending,
    /// Task is being worked on.
    InProgress,
    /// Task is done.
    Completed,
}

impl TaskStatus {
    /// Returns `true` while the task still needs attention.
    pub fn is_open(&self) -> bool {
        !matches!(self, TaskStatus::Completed)
    }
}
