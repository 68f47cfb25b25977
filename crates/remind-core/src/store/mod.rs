mod memory;
pub use memory::MemoryStore;

use async_trait::async_trait;

use remind_model::{Contact, PageRequest, Task, TaskId, TaskPage, TaskPatch, TaskQuery, UserId};

use crate::error::StoreError;

/// Result of the conditional notified-flag update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The task was unnotified and the flag has been set.
    Marked,
    /// Another writer got there first; the flag was already set.
    AlreadyNotified,
}

/// Durable task collection.
///
/// The store is the single source of truth for the `notified` flag; the
/// sweep re-reads current state every cycle and never caches it.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert(&self, task: Task) -> Result<(), StoreError>;

    async fn get(&self, id: &TaskId) -> Result<Option<Task>, StoreError>;

    /// Apply a partial update, returning the updated record.
    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError>;

    async fn remove(&self, id: &TaskId) -> Result<(), StoreError>;

    /// Filtered, paginated listing.
    async fn query(&self, query: &TaskQuery) -> Result<TaskPage<Task>, StoreError>;

    /// One page of tasks with `notified = false`, in a stable order.
    ///
    /// Paging must eventually yield every task that was unnotified as of
    /// query time; it need not reflect tasks marked mid-scan.
    async fn find_unnotified(&self, page: PageRequest) -> Result<TaskPage<Task>, StoreError>;

    /// Conditionally set `notified = true`, keyed by task id.
    ///
    /// Succeeds with [`MarkOutcome::AlreadyNotified`] when the flag was
    /// already set, so concurrent sweeps cannot double-record a delivery.
    async fn mark_notified(&self, id: &TaskId) -> Result<MarkOutcome, StoreError>;
}

/// Read-only owner resolution for delivery.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `Ok(None)` is the dangling-reference outcome: the task is skipped for
    /// this sweep and retried on the next one.
    async fn resolve_owner(&self, owner: &UserId) -> Result<Option<Contact>, StoreError>;
}
