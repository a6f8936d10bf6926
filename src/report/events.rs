mod attachment;
mod container;
mod task;

pub use attachment::AttachmentStateChange;
pub use container::ContainerStateChange;
pub use task::TaskStateChange;

use std::fmt;

use crate::state::container::ContainerKey;

/// Which tracked entity a change belongs to. Acknowledgments are routed
/// through this key, never through a live reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Task(String),
    Container(ContainerKey),
    Attachment { task_arn: String, attachment_arn: String },
}

/// A change ready to be handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateChange {
    Container(ContainerStateChange),
    Task(TaskStateChange),
    Attachment(AttachmentStateChange),
}

impl StateChange {
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Container(change) => EntityKey::Container(change.key()),
            Self::Task(change) => EntityKey::Task(change.task_arn.clone()),
            Self::Attachment(change) => EntityKey::Attachment {
                task_arn: change.task_arn.clone(),
                attachment_arn: change.attachment_arn.clone(),
            },
        }
    }

    pub fn status(&self) -> &str {
        match self {
            Self::Container(change) => change.status.as_ref(),
            Self::Task(change) => change.status.as_ref(),
            Self::Attachment(change) => &change.status,
        }
    }
}

impl fmt::Display for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container(change) => fmt::Display::fmt(change, f),
            Self::Task(change) => fmt::Display::fmt(change, f),
            Self::Attachment(change) => fmt::Display::fmt(change, f),
        }
    }
}

impl From<ContainerStateChange> for StateChange {
    fn from(change: ContainerStateChange) -> Self {
        Self::Container(change)
    }
}

impl From<TaskStateChange> for StateChange {
    fn from(change: TaskStateChange) -> Self {
        Self::Task(change)
    }
}

impl From<AttachmentStateChange> for StateChange {
    fn from(change: AttachmentStateChange) -> Self {
        Self::Attachment(change)
    }
}
