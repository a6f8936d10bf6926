use std::cmp::Ordering;
use std::fmt;

use bollard::models::ContainerStateStatusEnum;
use serde::{Deserialize, Serialize};

/// A lifecycle status with an explicit total order.
///
/// The order is defined by [`Status::rank`], never by declaration order.
/// Two distinct statuses of the same domain must never share a rank.
pub trait Status: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// The lowest status of the domain. Every entity starts here.
    const NONE: Self;

    fn rank(self) -> u8;

    fn is_terminal(self) -> bool;

    /// Every status of the domain, in lifecycle order.
    fn all() -> &'static [Self];

    fn compare(self, other: Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }

    fn is_after(self, other: Self) -> bool {
        self.compare(other) == Ordering::Greater
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerStatus {
    None,
    Pending,
    Created,
    Running,
    Stopped,
}

impl Status for ContainerStatus {
    const NONE: Self = Self::None;

    fn rank(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Pending => 10,
            Self::Created => 20,
            Self::Running => 30,
            Self::Stopped => 40,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }

    fn all() -> &'static [Self] {
        &[
            Self::None,
            Self::Pending,
            Self::Created,
            Self::Running,
            Self::Stopped,
        ]
    }
}

impl AsRef<str> for ContainerStatus {
    fn as_ref(&self) -> &str {
        match self {
            Self::None => "NONE",
            Self::Pending => "PENDING",
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl PartialOrd for ContainerStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ContainerStatus {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(*other)
    }
}

/// Paused and restarting containers are still running from the control
/// plane's point of view. Anything on its way out is stopped.
impl From<ContainerStateStatusEnum> for ContainerStatus {
    fn from(status: ContainerStateStatusEnum) -> Self {
        match status {
            ContainerStateStatusEnum::EMPTY => Self::None,
            ContainerStateStatusEnum::CREATED => Self::Created,
            ContainerStateStatusEnum::RUNNING
            | ContainerStateStatusEnum::PAUSED
            | ContainerStateStatusEnum::RESTARTING => Self::Running,
            ContainerStateStatusEnum::REMOVING
            | ContainerStateStatusEnum::EXITED
            | ContainerStateStatusEnum::DEAD => Self::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    None,
    Pending,
    Created,
    Running,
    Stopped,
}

impl Status for TaskStatus {
    const NONE: Self = Self::None;

    fn rank(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Pending => 10,
            Self::Created => 20,
            Self::Running => 30,
            Self::Stopped => 40,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }

    fn all() -> &'static [Self] {
        &[
            Self::None,
            Self::Pending,
            Self::Created,
            Self::Running,
            Self::Stopped,
        ]
    }
}

impl AsRef<str> for TaskStatus {
    fn as_ref(&self) -> &str {
        match self {
            Self::None => "NONE",
            Self::Pending => "PENDING",
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl PartialOrd for TaskStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TaskStatus {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(*other)
    }
}

/// A task is as far along as the container it is derived from.
impl From<ContainerStatus> for TaskStatus {
    fn from(status: ContainerStatus) -> Self {
        match status {
            ContainerStatus::None => Self::None,
            ContainerStatus::Pending => Self::Pending,
            ContainerStatus::Created => Self::Created,
            ContainerStatus::Running => Self::Running,
            ContainerStatus::Stopped => Self::Stopped,
        }
    }
}
