use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::SystemTime,
};

use async_trait::async_trait;

use remind_model::{
    Contact, PageRequest, Task, TaskDraft, TaskId, TaskPage, TaskPatch, TaskQuery, UserId,
};

use crate::error::StoreError;
use crate::store::{MarkOutcome, TaskStore, UserDirectory};

/// In-memory task and user storage.
///
/// Reference implementation of the store contracts, used by tests and the
/// demo daemon. Production deployments put a durable store behind the same
/// traits.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

struct MemoryStoreInner {
    /// Tasks indexed by TaskId.
    tasks: HashMap<TaskId, Task>,
    /// Index: owner -> list of task IDs owned by that user.
    by_owner: HashMap<UserId, Vec<TaskId>>,
    /// Known users with their delivery contacts.
    users: HashMap<UserId, Contact>,
}

impl MemoryStore {
    /// Create empty storage.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryStoreInner {
                tasks: HashMap::new(),
                by_owner: HashMap::new(),
                users: HashMap::new(),
            })),
        }
    }

    /// Register a user the directory can resolve.
    pub fn add_user(&self, id: UserId, contact: Contact) {
        let mut inner = self.inner.write().unwrap();
        inner.users.insert(id, contact);
    }

    /// Validate a draft and insert the resulting task, returning the record.
    pub fn create(&self, owner: UserId, draft: TaskDraft) -> Result<Task, StoreError> {
        draft.validate()?;
        let task = draft.into_task(owner, SystemTime::now());

        let mut inner = self.inner.write().unwrap();
        inner.insert(task.clone())?;
        Ok(task)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn insert(&mut self, task: Task) -> Result<(), StoreError> {
        if self.tasks.contains_key(&task.id) {
            return Err(StoreError::DuplicateTask(task.id));
        }
        self.by_owner
            .entry(task.owner.clone())
            .or_default()
            .push(task.id.clone());
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Unnotified tasks in creation order (ties broken by id), so paging
    /// windows stay stable across calls within one sweep.
    fn unnotified_sorted(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().filter(|t| !t.notified).collect();
        tasks.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        tasks
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert(&self, task: Task) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.insert(task)
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.tasks.get(id).cloned())
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        if let Some(title) = &patch.title
            && title.trim().is_empty()
        {
            return Err(StoreError::InvalidTask("task title must not be empty".into()));
        }

        let mut inner = self.inner.write().unwrap();
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::TaskNotFound(id.clone()))?;

        patch.apply(task, SystemTime::now());
        Ok(task.clone())
    }

    async fn remove(&self, id: &TaskId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();

        let task = inner
            .tasks
            .remove(id)
            .ok_or_else(|| StoreError::TaskNotFound(id.clone()))?;

        if let Some(ids) = inner.by_owner.get_mut(&task.owner) {
            ids.retain(|task_id| task_id != id);
        }
        Ok(())
    }

    async fn query(&self, query: &TaskQuery) -> Result<TaskPage<Task>, StoreError> {
        let inner = self.inner.read().unwrap();

        // When an owner filter is given, use the by_owner index to avoid a
        // full scan.
        let iter: Box<dyn Iterator<Item = &Task>> = match &query.owner {
            Some(owner) => match inner.by_owner.get(owner) {
                Some(ids) => Box::new(ids.iter().filter_map(|id| inner.tasks.get(id))),
                None => {
                    return Ok(TaskPage {
                        items: vec![],
                        total: 0,
                    });
                }
            },
            None => Box::new(inner.tasks.values()),
        };

        let iter: Box<dyn Iterator<Item = &Task>> = match query.status {
            Some(status) => Box::new(iter.filter(move |t| t.status == status)),
            None => iter,
        };

        let filtered: Vec<&Task> = iter.collect();
        let total = filtered.len();

        let items = filtered
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect();

        Ok(TaskPage { items, total })
    }

    async fn find_unnotified(&self, page: PageRequest) -> Result<TaskPage<Task>, StoreError> {
        let inner = self.inner.read().unwrap();

        let sorted = inner.unnotified_sorted();
        let total = sorted.len();
        let items = sorted
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();

        Ok(TaskPage { items, total })
    }

    async fn mark_notified(&self, id: &TaskId) -> Result<MarkOutcome, StoreError> {
        let mut inner = self.inner.write().unwrap();

        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::TaskNotFound(id.clone()))?;

        if task.notified {
            return Ok(MarkOutcome::AlreadyNotified);
        }
        task.notified = true;
        task.updated_at = SystemTime::now();
        Ok(MarkOutcome::Marked)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn resolve_owner(&self, owner: &UserId) -> Result<Option<Contact>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.users.get(owner).cloned())
    }
}
