//! Timer loop driving the reminder sweep.
//!
//! The cadence is an explicit value handed in by the host, not a property of
//! any scheduling library; swapping the interval for a cron source only
//! touches this module.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::CadenceError;
use crate::metrics::{NoopMetrics, SweepMetrics};
use crate::sweep::Sweeper;

/// Wall-clock period between sweep starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence(Duration);

impl Cadence {
    pub fn every(period: Duration) -> Result<Self, CadenceError> {
        if period.is_zero() {
            return Err(CadenceError::ZeroInterval);
        }
        Ok(Self(period))
    }

    pub fn from_secs(secs: u64) -> Result<Self, CadenceError> {
        Self::every(Duration::from_secs(secs))
    }

    /// One sweep per hour, the usual production setting.
    pub fn hourly() -> Self {
        Self(Duration::from_secs(3600))
    }

    pub fn period(&self) -> Duration {
        self.0
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::hourly()
    }
}

/// Recurring driver that owns a [`Sweeper`] and fires it on every tick.
pub struct ReminderScheduler {
    sweeper: Sweeper,
    cadence: Cadence,
    metrics: Arc<dyn SweepMetrics>,
}

impl ReminderScheduler {
    pub fn new(sweeper: Sweeper, cadence: Cadence) -> Self {
        Self {
            sweeper,
            cadence,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn SweepMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Drive sweeps until cancelled.
    ///
    /// The first sweep runs immediately; afterwards ticks fire once per
    /// cadence period. Sweeps run inline on this task, so a sweep that
    /// overruns the period delays the next tick rather than overlapping it.
    /// Every tick reads the clock and the store state fresh.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            period_secs = self.cadence.period().as_secs(),
            "reminder scheduler started"
        );
        let mut ticker = interval(self.cadence.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("reminder scheduler stopped");
                    return;
                }
                _ = ticker.tick() => self.tick(&cancel).await,
            }
        }
    }

    async fn tick(&self, cancel: &CancellationToken) {
        let started = Instant::now();

        match self.sweeper.run_sweep(SystemTime::now(), cancel).await {
            Ok(report) => {
                let elapsed = started.elapsed();
                if report.examined == 0 {
                    debug!("sweep finished with nothing to check");
                } else {
                    info!(
                        examined = report.examined,
                        notified = report.notified,
                        failed = report.failed(),
                        lost_race = report.lost_race,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "sweep finished"
                    );
                }
                self.metrics.observe_sweep(&report, elapsed);
            }
            Err(e) => {
                error!(error = %e, "sweep aborted; retrying on next tick");
                self.metrics.observe_aborted_sweep();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NotifyError, StoreError};
    use crate::notify::Notify;
    use crate::store::{MarkOutcome, MemoryStore, TaskStore};
    use crate::sweep::SweepReport;
    use async_trait::async_trait;
    use remind_model::{
        Contact, PageRequest, Task, TaskDraft, TaskId, TaskPage, TaskPatch, TaskQuery, UserId,
    };
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn cadence_rejects_zero() {
        assert!(matches!(
            Cadence::from_secs(0),
            Err(CadenceError::ZeroInterval)
        ));
        assert_eq!(Cadence::hourly().period(), Duration::from_secs(3600));
    }

    struct Recorder {
        sent: Mutex<Vec<TaskId>>,
    }

    #[async_trait]
    impl Notify for Recorder {
        async fn send(&self, _contact: &Contact, task: &Task) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(task.id.clone());
            Ok(())
        }
    }

    struct CountingMetrics {
        swept: AtomicUsize,
        aborted: AtomicUsize,
    }

    impl SweepMetrics for CountingMetrics {
        fn observe_sweep(&self, _report: &SweepReport, _elapsed: Duration) {
            self.swept.fetch_add(1, Ordering::SeqCst);
        }
        fn observe_aborted_sweep(&self) {
            self.aborted.fetch_add(1, Ordering::SeqCst);
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

    #[tokio::test]
    async fn ticks_deliver_once_and_stop_on_cancel() {
        let store = MemoryStore::new();
        store.add_user(UserId::from("u1"), Contact::new("ada@example.com", "Ada"));
        store
            .create(
                UserId::from("u1"),
                TaskDraft::new("file taxes")
                    .with_due_date(SystemTime::now() + Duration::from_secs(3600)),
            )
            .unwrap();

        let recorder = Arc::new(Recorder {
            sent: Mutex::new(Vec::new()),
        });
        let metrics = Arc::new(CountingMetrics {
            swept: AtomicUsize::new(0),
            aborted: AtomicUsize::new(0),
        });

        let sweeper = Sweeper::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            recorder.clone(),
        );
        let scheduler = ReminderScheduler::new(
            sweeper,
            Cadence::every(Duration::from_millis(10)).unwrap(),
        )
        .with_metrics(metrics.clone());

        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        handle.await.unwrap();

        // Many ticks ran, but the delivery happened exactly once.
        assert!(metrics.swept.load(Ordering::SeqCst) >= 2);
        assert_eq!(recorder.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn aborted_sweeps_keep_the_loop_alive() {
        let store = MemoryStore::new();
        let recorder = Arc::new(Recorder {
            sent: Mutex::new(Vec::new()),
        });
        let metrics = Arc::new(CountingMetrics {
            swept: AtomicUsize::new(0),
            aborted: AtomicUsize::new(0),
        });

        let sweeper = Sweeper::new(Arc::new(BrokenListing), Arc::new(store), recorder);
        let scheduler = ReminderScheduler::new(
            sweeper,
            Cadence::every(Duration::from_millis(10)).unwrap(),
        )
        .with_metrics(metrics.clone());

        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(metrics.aborted.load(Ordering::SeqCst) >= 2);
        assert_eq!(metrics.swept.load(Ordering::SeqCst), 0);
    }
}
