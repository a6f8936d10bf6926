use std::sync::{Mutex, MutexGuard, PoisonError};

use super::status::TaskStatus;
use super::tracker::{Rejected, StatusTracker};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub status: StatusTracker<TaskStatus>,
    pub reason: Option<String>,
}

#[derive(Debug)]
pub struct Task {
    arn: String,
    inner: Mutex<TaskSnapshot>,
}

impl Task {
    pub fn new(arn: impl Into<String>) -> Self {
        Self {
            arn: arn.into(),
            inner: Mutex::new(TaskSnapshot::default()),
        }
    }

    pub fn arn(&self) -> &str {
        &self.arn
    }

    fn lock(&self) -> MutexGuard<'_, TaskSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_known_status(&self, status: TaskStatus) -> bool {
        self.transition(status, None)
    }

    /// Like [`Task::set_known_status`], recording why the task moved.
    /// The reason is only kept when the status is accepted.
    pub fn transition(&self, status: TaskStatus, reason: Option<String>) -> bool {
        let mut inner = self.lock();
        match inner.status.advance_known(status) {
            Ok(previous) => {
                if reason.is_some() {
                    inner.reason = reason;
                }
                log::debug!("Task {} moved {} -> {}", self.arn, previous, status);
                true
            }
            Err(_) => {
                log::debug!(
                    "Ignoring stale status {} for task {} (known {})",
                    status,
                    self.arn,
                    inner.status.known()
                );
                false
            }
        }
    }

    pub fn known_status(&self) -> TaskStatus {
        self.lock().status.known()
    }

    pub fn sent_status(&self) -> TaskStatus {
        self.lock().status.sent()
    }

    pub fn set_sent_status(&self, status: TaskStatus) -> bool {
        let mut inner = self.lock();
        match inner.status.advance_sent(status) {
            Ok(_) => true,
            Err(Rejected::Stale { current }) => {
                log::debug!(
                    "Ignoring acknowledgment of {} for task {} (sent {})",
                    status,
                    self.arn,
                    current
                );
                false
            }
            Err(Rejected::AheadOfKnown { known }) => {
                log::warn!(
                    "Refusing acknowledgment of {} for task {} ahead of known {}",
                    status,
                    self.arn,
                    known
                );
                false
            }
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        self.lock().clone()
    }

    pub fn is_settled(&self) -> bool {
        self.lock().status.is_settled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_reason_only_kept_with_accepted_status() {
        let task = Task::new("task-1");
        assert!(task.transition(TaskStatus::Stopped, Some("Essential container exited".into())));
        assert!(!task.transition(TaskStatus::Running, Some("late".into())));
        let snapshot = task.snapshot();
        assert_eq!(snapshot.status.known(), TaskStatus::Stopped);
        assert_eq!(
            snapshot.reason.as_deref(),
            Some("Essential container exited")
        );
    }

    #[test]
    fn test_duplicate_acknowledgments_are_noops() {
        let task = Task::new("task-1");
        task.set_known_status(TaskStatus::Running);
        assert!(task.set_sent_status(TaskStatus::Running));
        assert!(!task.set_sent_status(TaskStatus::Running));
        assert_eq!(task.sent_status(), TaskStatus::Running);
        assert!(!task.is_settled());
    }

    #[test]
    fn test_concurrent_acknowledgments_never_regress() {
        let task = Arc::new(Task::new("task-1"));
        task.set_known_status(TaskStatus::Stopped);

        let handles: Vec<_> = [
            TaskStatus::Running,
            TaskStatus::Stopped,
            TaskStatus::Pending,
            TaskStatus::Stopped,
            TaskStatus::Created,
        ]
        .into_iter()
        .map(|status| {
            let task = Arc::clone(&task);
            std::thread::spawn(move || {
                task.set_sent_status(status);
            })
        })
        .collect();
        for handle in handles {
            handle.join().expect("acknowledger panicked");
        }
        assert_eq!(task.sent_status(), TaskStatus::Stopped);
    }
}
