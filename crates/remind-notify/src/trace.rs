use async_trait::async_trait;
use tracing::info;

use remind_core::{Notify, NotifyError};
use remind_model::{Contact, Task};

use crate::compose::compose;

/// Delivery sink that writes reminders to the log stream.
///
/// Useful in development and in the demo daemon when no mail gateway is
/// configured.
pub struct TraceNotifier;

#[async_trait]
impl Notify for TraceNotifier {
    async fn send(&self, contact: &Contact, task: &Task) -> Result<(), NotifyError> {
        let msg = compose(contact, task);
        info!(
            to = %contact.address,
            task_id = %task.id,
            subject = %msg.subject,
            "reminder delivered to log sink"
        );
        Ok(())
    }
}
