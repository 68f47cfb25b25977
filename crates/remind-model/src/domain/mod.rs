mod task_id;
pub use task_id::TaskId;

mod user;
pub use user::{Contact, UserId};

mod task_status;
pub use task_status::TaskStatus;

mod priority;
pub use priority::Priority;

mod task;
pub use task::Task;

mod draft;
pub use draft::{DraftError, TaskDraft, TaskPatch};

mod task_query;
pub use task_query::{PageRequest, TaskPage, TaskQuery};

pub(crate) mod time_serde;

/// Reminder lead time in whole hours before the due date.
///
/// Used in task records and creation payloads where the reminder window
/// offset is required.
pub type LeadHours = u32;

/// Lead time applied when a creation payload does not specify one.
pub const DEFAULT_LEAD_HOURS: LeadHours = 24;

/// Upper bound on the reminder lead accepted from creation payloads (one year).
pub const MAX_LEAD_HOURS: LeadHours = 24 * 365;
