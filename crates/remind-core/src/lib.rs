pub mod error;
pub use error::{CadenceError, NotifyError, StoreError, SweepError};

pub mod store;
pub use store::{MarkOutcome, MemoryStore, TaskStore, UserDirectory};

pub mod notify;
pub use notify::Notify;

pub mod metrics;
pub use metrics::{NoopMetrics, SweepMetrics};

pub mod sweep;
pub use sweep::{FailureReason, SweepConfig, SweepReport, Sweeper, TaskFailure};

pub mod scheduler;
pub use scheduler::{Cadence, ReminderScheduler};

pub mod expiry;
pub use expiry::ExpiringMap;
