use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::state::status::TaskStatus;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStateChange {
    pub task_arn: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Timestamp in microseconds (UTC)
    pub timestamp: i64,
    #[serde(skip)]
    pub sent_status: TaskStatus,
}

impl PartialEq for TaskStateChange {
    fn eq(&self, other: &Self) -> bool {
        self.task_arn == other.task_arn && self.status == other.status
    }
}

impl Eq for TaskStateChange {}

impl Hash for TaskStateChange {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.task_arn.hash(state);
        self.status.hash(state);
    }
}

impl fmt::Display for TaskStateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.task_arn, self.status)?;
        if let Some(reason) = self.reason.as_deref().filter(|r| !r.is_empty()) {
            write!(f, ", Reason {reason}")?;
        }
        write!(f, ", Known Sent: {}", self.sent_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendering() {
        let change = TaskStateChange {
            task_arn: "task-1".to_string(),
            status: TaskStatus::Running,
            reason: None,
            timestamp: 0,
            sent_status: TaskStatus::None,
        };
        assert_eq!(change.to_string(), "task-1 -> RUNNING, Known Sent: NONE");
    }
}
