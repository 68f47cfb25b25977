use std::time::{SystemTime, UNIX_EPOCH};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use remind_model::{Contact, Task};

/// Rendered reminder message, transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub subject: String,
    pub body: String,
}

/// Render the reminder for a task owner.
pub fn compose(contact: &Contact, task: &Task) -> MailMessage {
    let due_line = match task.due_date {
        Some(due) => format!(" due on {}", format_timestamp(due)),
        None => String::new(),
    };

    let body = format!(
        "Hello {},\n\n\
         You have an upcoming task: \"{}\"{}.\n\n\
         Make sure to complete it on time.\n\n\
         Best regards,\n\
         The task reminder service",
        contact.display_name, task.title, due_line,
    );

    MailMessage {
        subject: "Reminder: upcoming task".to_string(),
        body,
    }
}

fn format_timestamp(t: SystemTime) -> String {
    let secs = t
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    OffsetDateTime::from_unix_timestamp(secs as i64)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| secs.to_string())
}
