use serde::{Deserialize, Serialize};

/// Task priority used for listing and display; has no effect on reminder
/// eligibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}
