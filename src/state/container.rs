use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use super::status::ContainerStatus;
use super::tracker::{Rejected, StatusTracker};

/// Identity of a container inside the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerKey {
    pub task_arn: String,
    pub name: String,
}

impl ContainerKey {
    pub fn new(task_arn: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            task_arn: task_arn.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.task_arn, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortBinding {
    pub container_port: u16,
    pub host_port: u16,
    pub bind_ip: String,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
}

impl AsRef<str> for Protocol {
    fn as_ref(&self) -> &str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Sctp => "sctp",
        }
    }
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}/{}",
            self.bind_ip,
            self.host_port,
            self.container_port,
            self.protocol.as_ref()
        )
    }
}

/// A status transition together with the data that must become visible
/// at the same instant as the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerUpdate {
    pub status: ContainerStatus,
    pub exit_code: Option<i32>,
    pub reason: Option<String>,
}

impl ContainerUpdate {
    pub fn new(status: ContainerStatus) -> Self {
        Self {
            status,
            exit_code: None,
            reason: None,
        }
    }

    pub fn exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Everything about a container that changes over its life, guarded as
/// one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSnapshot {
    pub status: StatusTracker<ContainerStatus>,
    pub exit_code: Option<i32>,
    pub reason: Option<String>,
    pub port_bindings: Option<Vec<PortBinding>>,
}

#[derive(Debug)]
pub struct Container {
    key: ContainerKey,
    essential: bool,
    inner: Mutex<ContainerSnapshot>,
}

impl Container {
    pub fn new(key: ContainerKey, essential: bool) -> Self {
        Self {
            key,
            essential,
            inner: Mutex::new(ContainerSnapshot::default()),
        }
    }

    pub fn key(&self) -> &ContainerKey {
        &self.key
    }

    pub fn task_arn(&self) -> &str {
        &self.key.task_arn
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn is_essential(&self) -> bool {
        self.essential
    }

    fn lock(&self) -> MutexGuard<'_, ContainerSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_known_status(&self, status: ContainerStatus) -> bool {
        self.apply(ContainerUpdate::new(status))
    }

    /// Moves the container forward. Ancillary fields are published in the
    /// same critical section as the status; a rejected update leaves them
    /// untouched.
    pub fn apply(&self, update: ContainerUpdate) -> bool {
        let mut inner = self.lock();
        match inner.status.advance_known(update.status) {
            Ok(previous) => {
                if update.exit_code.is_some() {
                    inner.exit_code = update.exit_code;
                }
                if update.reason.is_some() {
                    inner.reason = update.reason;
                }
                log::debug!(
                    "Container {} moved {} -> {}",
                    self.key,
                    previous,
                    update.status
                );
                true
            }
            Err(_) => {
                log::debug!(
                    "Ignoring stale status {} for container {} (known {})",
                    update.status,
                    self.key,
                    inner.status.known()
                );
                false
            }
        }
    }

    pub fn set_port_bindings(&self, port_bindings: Vec<PortBinding>) {
        self.lock().port_bindings = Some(port_bindings);
    }

    pub fn known_status(&self) -> ContainerStatus {
        self.lock().status.known()
    }

    pub fn sent_status(&self) -> ContainerStatus {
        self.lock().status.sent()
    }

    pub fn set_sent_status(&self, status: ContainerStatus) -> bool {
        let mut inner = self.lock();
        match inner.status.advance_sent(status) {
            Ok(_) => true,
            Err(Rejected::Stale { current }) => {
                log::debug!(
                    "Ignoring acknowledgment of {} for container {} (sent {})",
                    status,
                    self.key,
                    current
                );
                false
            }
            Err(Rejected::AheadOfKnown { known }) => {
                log::warn!(
                    "Refusing acknowledgment of {} for container {} ahead of known {}",
                    status,
                    self.key,
                    known
                );
                false
            }
        }
    }

    /// A consistent copy of every mutable field, taken under one lock.
    pub fn snapshot(&self) -> ContainerSnapshot {
        self.lock().clone()
    }

    pub fn is_settled(&self) -> bool {
        self.lock().status.is_settled()
    }
}
