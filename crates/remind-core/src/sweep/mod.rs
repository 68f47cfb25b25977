//! Reminder sweep: one scan over the currently-unnotified tasks.
//!
//! Per-task failures are contained and reported; the only error that leaves
//! the sweep is a failure of the listing query itself.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use remind_model::{PageRequest, Task, TaskId};

use crate::error::{StoreError, SweepError};
use crate::notify::Notify;
use crate::store::{MarkOutcome, TaskStore, UserDirectory};

/// Tuning knobs for one sweep.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Page size for the unnotified-task scan.
    pub page_size: usize,
    /// Bound on every store and notifier call; an elapsed timeout is treated
    /// as that collaborator failing for the task at hand.
    pub op_timeout: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            page_size: 200,
            op_timeout: Duration::from_secs(10),
        }
    }
}

/// Why a single task was skipped this sweep. The task stays unnotified and
/// is reconsidered on the next tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("owner resolution failed: {0}")]
    ResolveFailed(String),
    #[error("owner record is missing")]
    OwnerMissing,
    #[error("notifier failed: {0}")]
    SendFailed(String),
    #[error("notifier timed out")]
    SendTimeout,
    #[error("delivered but not recorded: {0}")]
    MarkFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: TaskId,
    pub reason: FailureReason,
}

/// Outcome counters for one sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Candidates visited (including skips and failures).
    pub examined: usize,
    /// Skipped: no due date, so no reminder window exists.
    pub no_due_date: usize,
    /// Skipped: window has not opened yet.
    pub not_yet_due: usize,
    /// Delivered and durably marked.
    pub notified: usize,
    /// Delivered, but a concurrent writer had already marked the task.
    pub lost_race: usize,
    /// Per-task failures; each task will be retried next sweep.
    pub failures: Vec<TaskFailure>,
}

impl SweepReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    fn fail(&mut self, task: &Task, reason: FailureReason) {
        warn!(task_id = %task.id, reason = %reason, "task skipped this sweep");
        self.failures.push(TaskFailure {
            task: task.id.clone(),
            reason,
        });
    }
}

/// Executes reminder sweeps against the injected collaborators.
pub struct Sweeper {
    store: Arc<dyn TaskStore>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notify>,
    config: SweepConfig,
}

impl Sweeper {
    pub fn new(
        store: Arc<dyn TaskStore>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notify>,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
            config: SweepConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SweepConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one sweep at the given instant.
    ///
    /// Visits every task that was unnotified as of the scan, decides per task
    /// whether its reminder window has opened, delivers, and conditionally
    /// marks. Cancellation is honored between tasks: in-flight work finishes,
    /// no new per-task work starts.
    pub async fn run_sweep(
        &self,
        now: SystemTime,
        cancel: &CancellationToken,
    ) -> Result<SweepReport, SweepError> {
        let candidates = self.collect_unnotified(cancel).await?;
        debug!(candidates = candidates.len(), "sweep scan started");

        let mut report = SweepReport::default();
        for task in &candidates {
            if cancel.is_cancelled() {
                debug!(
                    remaining = candidates.len() - report.examined,
                    "sweep cancelled mid-scan"
                );
                break;
            }
            self.process_task(task, now, &mut report).await;
        }
        Ok(report)
    }

    /// Page through the unnotified set and snapshot it before processing, so
    /// marking tasks mid-sweep cannot shift later pages under the scan.
    async fn collect_unnotified(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Task>, SweepError> {
        let mut tasks = Vec::new();
        let mut page = PageRequest::first(self.config.page_size);

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let result = timeout(self.config.op_timeout, self.store.find_unnotified(page))
                .await
                .map_err(|_| SweepError::Listing(StoreError::Backend("listing timed out".into())))?
                .map_err(SweepError::Listing)?;

            let fetched = result.items.len();
            tasks.extend(result.items);
            if fetched < page.limit {
                break;
            }
            page = page.next();
        }
        Ok(tasks)
    }

    async fn process_task(&self, task: &Task, now: SystemTime, report: &mut SweepReport) {
        report.examined += 1;

        if task.due_date.is_none() {
            report.no_due_date += 1;
            return;
        }
        if !task.reminder_due(now) {
            report.not_yet_due += 1;
            return;
        }

        let resolved = timeout(
            self.config.op_timeout,
            self.directory.resolve_owner(&task.owner),
        )
        .await;
        let contact = match resolved {
            Err(_) => {
                report.fail(task, FailureReason::ResolveFailed("owner lookup timed out".into()));
                return;
            }
            Ok(Err(e)) => {
                report.fail(task, FailureReason::ResolveFailed(e.to_string()));
                return;
            }
            Ok(Ok(None)) => {
                report.fail(task, FailureReason::OwnerMissing);
                return;
            }
            Ok(Ok(Some(contact))) => contact,
        };

        match timeout(self.config.op_timeout, self.notifier.send(&contact, task)).await {
            Err(_) => {
                report.fail(task, FailureReason::SendTimeout);
                return;
            }
            Ok(Err(e)) => {
                report.fail(task, FailureReason::SendFailed(e.to_string()));
                return;
            }
            Ok(Ok(())) => {}
        }

        // The conditional mark is the sole authority preventing duplicate
        // delivery; it runs only after the send succeeded. A failure here
        // means a duplicate next sweep (at-least-once).
        match timeout(self.config.op_timeout, self.store.mark_notified(&task.id)).await {
            Ok(Ok(MarkOutcome::Marked)) => {
                report.notified += 1;
                info!(task_id = %task.id, to = %contact.address, "reminder delivered");
            }
            Ok(Ok(MarkOutcome::AlreadyNotified)) => {
                report.lost_race += 1;
                debug!(task_id = %task.id, "delivery already recorded by a concurrent sweep");
            }
            Ok(Err(e)) => {
                report.fail(task, FailureReason::MarkFailed(e.to_string()));
            }
            Err(_) => {
                report.fail(task, FailureReason::MarkFailed("store update timed out".into()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use remind_model::{Contact, Priority, TaskPage, TaskPatch, TaskQuery, TaskStatus, UserId};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::UNIX_EPOCH;

    // 2025-01-10T10:00:00Z and the sweeps from the reference scenario.
    const DUE: u64 = 1_736_503_200;
    const DAY_BEFORE: u64 = DUE - 24 * 3600;

    fn ts(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn task(id: &str, owner: &str, due: Option<u64>, lead: u32, created: u64) -> Task {
        Task {
            id: TaskId::from(id),
            owner: UserId::from(owner),
            title: format!("task {id}"),
            description: None,
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            due_date: due.map(ts),
            reminder_lead_hours: lead,
            notified: false,
            created_at: ts(created),
            updated_at: ts(created),
        }
    }

    struct Recorder {
        sent: Mutex<Vec<TaskId>>,
        fail_once: Mutex<HashSet<TaskId>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail_once: Mutex::new(HashSet::new()),
            })
        }

        fn failing_once_for(self: Arc<Self>, id: &str) -> Arc<Self> {
            self.fail_once.lock().unwrap().insert(TaskId::from(id));
            self
        }

        fn sent(&self) -> Vec<TaskId> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notify for Recorder {
        async fn send(&self, _contact: &Contact, task: &Task) -> Result<(), NotifyError> {
            if self.fail_once.lock().unwrap().remove(&task.id) {
                return Err(NotifyError::Transport("gateway unreachable".into()));
            }
            self.sent.lock().unwrap().push(task.id.clone());
            Ok(())
        }
    }

    struct SlowNotifier;

    #[async_trait]
    impl Notify for SlowNotifier {
        async fn send(&self, _contact: &Contact, _task: &Task) -> Result<(), NotifyError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    /// Cancels the shared token after the first delivery.
    struct CancellingNotifier {
        cancel: CancellationToken,
        sent: Mutex<Vec<TaskId>>,
    }

    #[async_trait]
    impl Notify for CancellingNotifier {
        async fn send(&self, _contact: &Contact, task: &Task) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(task.id.clone());
            self.cancel.cancel();
            Ok(())
        }
    }

    /// Delegates to a MemoryStore but fails mark_notified while the flag is up.
    struct FlakyMarkStore {
        inner: MemoryStore,
        fail_marks: AtomicBool,
    }

    #[async_trait]
    impl TaskStore for FlakyMarkStore {
        async fn insert(&self, task: Task) -> Result<(), StoreError> {
            self.inner.insert(task).await
        }
        async fn get(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
            self.inner.get(id).await
        }
        async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
            self.inner.update(id, patch).await
        }
        async fn remove(&self, id: &TaskId) -> Result<(), StoreError> {
            self.inner.remove(id).await
        }
        async fn query(&self, query: &TaskQuery) -> Result<TaskPage<Task>, StoreError> {
            self.inner.query(query).await
        }
        async fn find_unnotified(&self, page: PageRequest) -> Result<TaskPage<Task>, StoreError> {
            self.inner.find_unnotified(page).await
        }
        async fn mark_notified(&self, id: &TaskId) -> Result<MarkOutcome, StoreError> {
            if self.fail_marks.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("write refused".into()));
            }
            self.inner.mark_notified(id).await
        }
    }

    struct BrokenListing;

    #[async_trait]
    impl TaskStore for BrokenListing {
        async fn insert(&self, _task: Task) -> Result<(), StoreError> {
            unreachable!()
        }
        async fn get(&self, _id: &TaskId) -> Result<Option<Task>, StoreError> {
            unreachable!()
        }
        async fn update(&self, _id: &TaskId, _patch: TaskPatch) -> Result<Task, StoreError> {
            unreachable!()
        }
        async fn remove(&self, _id: &TaskId) -> Result<(), StoreError> {
            unreachable!()
        }
        async fn query(&self, _query: &TaskQuery) -> Result<TaskPage<Task>, StoreError> {
            unreachable!()
        }
        async fn find_unnotified(&self, _page: PageRequest) -> Result<TaskPage<Task>, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn mark_notified(&self, _id: &TaskId) -> Result<MarkOutcome, StoreError> {
            unreachable!()
        }
    }

    /// Lists tasks regardless of the notified flag, simulating a stale scan
    /// racing a concurrent sweep.
    struct StaleListing {
        inner: MemoryStore,
    }

    #[async_trait]
    impl TaskStore for StaleListing {
        async fn insert(&self, task: Task) -> Result<(), StoreError> {
            self.inner.insert(task).await
        }
        async fn get(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
            self.inner.get(id).await
        }
        async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
            self.inner.update(id, patch).await
        }
        async fn remove(&self, id: &TaskId) -> Result<(), StoreError> {
            self.inner.remove(id).await
        }
        async fn query(&self, query: &TaskQuery) -> Result<TaskPage<Task>, StoreError> {
            self.inner.query(query).await
        }
        async fn find_unnotified(&self, _page: PageRequest) -> Result<TaskPage<Task>, StoreError> {
            let mut page = self.inner.query(&TaskQuery::new()).await?;
            let mut stale = page.items.clone();
            for t in &mut stale {
                t.notified = false;
            }
            page.items = stale;
            Ok(page)
        }
        async fn mark_notified(&self, id: &TaskId) -> Result<MarkOutcome, StoreError> {
            self.inner.mark_notified(id).await
        }
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_user(UserId::from("u1"), Contact::new("ada@example.com", "Ada"));
        store
    }

    fn sweeper(store: &MemoryStore, notifier: Arc<dyn Notify>) -> Sweeper {
        Sweeper::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            notifier,
        )
    }

    #[tokio::test]
    async fn reminder_fires_once_across_repeated_sweeps() {
        let store = seeded_store();
        store
            .insert(task("t1", "u1", Some(DUE), 24, 0))
            .await
            .unwrap();

        let recorder = Recorder::new();
        let sweeper = sweeper(&store, recorder.clone());
        let cancel = CancellationToken::new();

        let report = sweeper.run_sweep(ts(DAY_BEFORE), &cancel).await.unwrap();
        assert_eq!(report.notified, 1);
        assert_eq!(recorder.sent(), vec![TaskId::from("t1")]);
        assert!(store.get(&TaskId::from("t1")).await.unwrap().unwrap().notified);

        // An hour later the task is no longer a candidate.
        let report = sweeper
            .run_sweep(ts(DAY_BEFORE + 3600), &cancel)
            .await
            .unwrap();
        assert_eq!(report.examined, 0);
        assert_eq!(recorder.sent().len(), 1);
    }

    #[tokio::test]
    async fn window_boundary_is_inclusive() {
        let store = seeded_store();
        store
            .insert(task("t1", "u1", Some(DUE), 24, 0))
            .await
            .unwrap();

        let recorder = Recorder::new();
        let sweeper = sweeper(&store, recorder.clone());
        let cancel = CancellationToken::new();

        // One second before the window opens: nothing happens.
        let report = sweeper
            .run_sweep(ts(DAY_BEFORE - 1), &cancel)
            .await
            .unwrap();
        assert_eq!(report.not_yet_due, 1);
        assert!(recorder.sent().is_empty());

        // Exactly at the boundary: the reminder fires.
        let report = sweeper.run_sweep(ts(DAY_BEFORE), &cancel).await.unwrap();
        assert_eq!(report.notified, 1);
        assert_eq!(recorder.sent().len(), 1);
    }

    #[tokio::test]
    async fn task_without_due_date_is_never_eligible() {
        let store = seeded_store();
        store.insert(task("t1", "u1", None, 24, 0)).await.unwrap();

        let recorder = Recorder::new();
        let sweeper = sweeper(&store, recorder.clone());
        let cancel = CancellationToken::new();

        let report = sweeper.run_sweep(ts(DUE * 100), &cancel).await.unwrap();
        assert_eq!(report.no_due_date, 1);
        assert_eq!(report.notified, 0);
        assert!(recorder.sent().is_empty());
    }

    #[tokio::test]
    async fn missing_owner_does_not_stop_the_batch() {
        let store = seeded_store();
        store
            .insert(task("t1", "u1", Some(DUE), 24, 0))
            .await
            .unwrap();
        store
            .insert(task("t2", "ghost", Some(DUE), 24, 1))
            .await
            .unwrap();
        store
            .insert(task("t3", "u1", Some(DUE), 24, 2))
            .await
            .unwrap();

        let recorder = Recorder::new();
        let sweeper = sweeper(&store, recorder.clone());
        let cancel = CancellationToken::new();

        let report = sweeper.run_sweep(ts(DAY_BEFORE), &cancel).await.unwrap();

        assert_eq!(report.examined, 3);
        assert_eq!(report.notified, 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].task, TaskId::from("t2"));
        assert_eq!(report.failures[0].reason, FailureReason::OwnerMissing);
        assert_eq!(
            recorder.sent(),
            vec![TaskId::from("t1"), TaskId::from("t3")]
        );
        assert!(!store.get(&TaskId::from("t2")).await.unwrap().unwrap().notified);
    }

    #[tokio::test]
    async fn notifier_failure_is_retried_next_sweep() {
        let store = seeded_store();
        store
            .insert(task("t1", "u1", Some(DUE), 24, 0))
            .await
            .unwrap();

        let recorder = Recorder::new().failing_once_for("t1");
        let sweeper = sweeper(&store, recorder.clone());
        let cancel = CancellationToken::new();

        let report = sweeper.run_sweep(ts(DAY_BEFORE), &cancel).await.unwrap();
        assert_eq!(report.notified, 0);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.failures[0].reason,
            FailureReason::SendFailed(_)
        ));
        assert!(!store.get(&TaskId::from("t1")).await.unwrap().unwrap().notified);

        // Next tick the gateway is back and the task is still a candidate.
        let report = sweeper
            .run_sweep(ts(DAY_BEFORE + 3600), &cancel)
            .await
            .unwrap();
        assert_eq!(report.notified, 1);
        assert_eq!(recorder.sent(), vec![TaskId::from("t1")]);
    }

    #[tokio::test]
    async fn mark_failure_means_duplicate_delivery_next_sweep() {
        let store = seeded_store();
        store
            .insert(task("t1", "u1", Some(DUE), 24, 0))
            .await
            .unwrap();

        let flaky = Arc::new(FlakyMarkStore {
            inner: store.clone(),
            fail_marks: AtomicBool::new(true),
        });
        let recorder = Recorder::new();
        let sweeper = Sweeper::new(flaky.clone(), Arc::new(store.clone()), recorder.clone());
        let cancel = CancellationToken::new();

        let report = sweeper.run_sweep(ts(DAY_BEFORE), &cancel).await.unwrap();
        assert_eq!(report.notified, 0);
        assert!(matches!(
            report.failures[0].reason,
            FailureReason::MarkFailed(_)
        ));
        assert_eq!(recorder.sent().len(), 1);

        // The write path recovers; the documented duplicate goes out and the
        // flag finally sticks.
        flaky.fail_marks.store(false, Ordering::SeqCst);
        let report = sweeper
            .run_sweep(ts(DAY_BEFORE + 3600), &cancel)
            .await
            .unwrap();
        assert_eq!(report.notified, 1);
        assert_eq!(recorder.sent().len(), 2);
        assert!(store.get(&TaskId::from("t1")).await.unwrap().unwrap().notified);
    }

    #[tokio::test]
    async fn listing_failure_aborts_the_sweep() {
        let recorder = Recorder::new();
        let store = seeded_store();
        let sweeper = Sweeper::new(
            Arc::new(BrokenListing),
            Arc::new(store),
            recorder.clone(),
        );
        let cancel = CancellationToken::new();

        let err = sweeper.run_sweep(ts(DAY_BEFORE), &cancel).await.unwrap_err();
        assert!(matches!(err, SweepError::Listing(_)));
        assert!(recorder.sent().is_empty());
    }

    #[tokio::test]
    async fn notifier_timeout_counts_as_failure() {
        let store = seeded_store();
        store
            .insert(task("t1", "u1", Some(DUE), 24, 0))
            .await
            .unwrap();

        let sweeper = sweeper(&store, Arc::new(SlowNotifier)).with_config(SweepConfig {
            page_size: 200,
            op_timeout: Duration::from_millis(20),
        });
        let cancel = CancellationToken::new();

        let report = sweeper.run_sweep(ts(DAY_BEFORE), &cancel).await.unwrap();
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].reason, FailureReason::SendTimeout);
        assert!(!store.get(&TaskId::from("t1")).await.unwrap().unwrap().notified);
    }

    #[tokio::test]
    async fn cancellation_stops_new_per_task_work() {
        let store = seeded_store();
        for i in 0..3 {
            store
                .insert(task(&format!("t{i}"), "u1", Some(DUE), 24, i))
                .await
                .unwrap();
        }

        let cancel = CancellationToken::new();
        let notifier = Arc::new(CancellingNotifier {
            cancel: cancel.clone(),
            sent: Mutex::new(Vec::new()),
        });
        let sweeper = sweeper(&store, notifier.clone());

        let report = sweeper.run_sweep(ts(DAY_BEFORE), &cancel).await.unwrap();

        // The first task finishes its in-flight work; the rest never start.
        assert_eq!(report.examined, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_sweep_is_a_silent_success() {
        let store = seeded_store();
        let recorder = Recorder::new();
        let sweeper = sweeper(&store, recorder.clone());
        let cancel = CancellationToken::new();

        let report = sweeper.run_sweep(ts(DAY_BEFORE), &cancel).await.unwrap();
        assert_eq!(report.examined, 0);
        assert_eq!(report.failed(), 0);
        assert!(recorder.sent().is_empty());
    }

    #[tokio::test]
    async fn sweep_pages_through_all_candidates() {
        let store = seeded_store();
        for i in 0..5 {
            store
                .insert(task(&format!("t{i}"), "u1", Some(DUE), 24, i))
                .await
                .unwrap();
        }

        let recorder = Recorder::new();
        let sweeper = sweeper(&store, recorder.clone()).with_config(SweepConfig {
            page_size: 2,
            op_timeout: Duration::from_secs(10),
        });
        let cancel = CancellationToken::new();

        let report = sweeper.run_sweep(ts(DAY_BEFORE), &cancel).await.unwrap();
        assert_eq!(report.examined, 5);
        assert_eq!(report.notified, 5);
        assert_eq!(recorder.sent().len(), 5);
    }

    #[tokio::test]
    async fn concurrent_mark_is_reported_as_lost_race() {
        let store = seeded_store();
        store
            .insert(task("t1", "u1", Some(DUE), 24, 0))
            .await
            .unwrap();
        // Another sweep already recorded the delivery.
        store.mark_notified(&TaskId::from("t1")).await.unwrap();

        let recorder = Recorder::new();
        let sweeper = Sweeper::new(
            Arc::new(StaleListing {
                inner: store.clone(),
            }),
            Arc::new(store.clone()),
            recorder.clone(),
        );
        let cancel = CancellationToken::new();

        let report = sweeper.run_sweep(ts(DAY_BEFORE), &cancel).await.unwrap();

        // The stale scan still delivered (the documented race), but the
        // conditional mark refused to double-record it.
        assert_eq!(report.lost_race, 1);
        assert_eq!(report.notified, 0);
        assert_eq!(report.failed(), 0);
        assert_eq!(recorder.sent().len(), 1);
    }
}
