use async_trait::async_trait;

use remind_model::{Contact, Task};

use crate::error::NotifyError;

/// Delivery collaborator invoked by the reminder sweep.
///
/// Implementations must report failure as an error value; a failed delivery
/// leaves the task unnotified and it is retried on the next sweep.
#[async_trait]
pub trait Notify: Send + Sync {
    /// Deliver a reminder for `task` to the resolved owner contact.
    async fn send(&self, contact: &Contact, task: &Task) -> Result<(), NotifyError>;
}
