use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::state::container::{ContainerKey, PortBinding};
use crate::state::status::ContainerStatus;

/// A container status worth reporting, frozen at emission time.
///
/// Equality and hashing only look at the container identity and the
/// status, so two emissions of the same status compare equal even when
/// their reason text differs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStateChange {
    pub task_arn: String,
    pub container_name: String,
    pub status: ContainerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(rename = "networkBindings", skip_serializing_if = "Vec::is_empty")]
    pub port_bindings: Vec<PortBinding>,
    /// Timestamp in microseconds (UTC)
    pub timestamp: i64,
    /// What had been acknowledged when this change was taken.
    #[serde(skip)]
    pub sent_status: ContainerStatus,
}

impl ContainerStateChange {
    pub fn key(&self) -> ContainerKey {
        ContainerKey::new(&self.task_arn, &self.container_name)
    }
}

impl PartialEq for ContainerStateChange {
    fn eq(&self, other: &Self) -> bool {
        self.task_arn == other.task_arn
            && self.container_name == other.container_name
            && self.status == other.status
    }
}

impl Eq for ContainerStateChange {}

impl Hash for ContainerStateChange {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.task_arn.hash(state);
        self.container_name.hash(state);
        self.status.hash(state);
    }
}

impl fmt::Display for ContainerStateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            self.task_arn, self.container_name, self.status
        )?;
        if let Some(exit_code) = self.exit_code {
            write!(f, ", Exit {exit_code}")?;
        }
        if let Some(reason) = self.reason.as_deref().filter(|r| !r.is_empty()) {
            write!(f, ", Reason {reason}")?;
        }
        if !self.port_bindings.is_empty() {
            let ports: Vec<String> = self.port_bindings.iter().map(|p| p.to_string()).collect();
            write!(f, ", Ports [{}]", ports.join(" "))?;
        }
        write!(f, ", Known Sent: {}", self.sent_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::container::Protocol;

    fn change(reason: Option<&str>) -> ContainerStateChange {
        ContainerStateChange {
            task_arn: "task-1".to_string(),
            container_name: "web".to_string(),
            status: ContainerStatus::Stopped,
            reason: reason.map(str::to_string),
            exit_code: Some(137),
            port_bindings: vec![PortBinding {
                container_port: 80,
                host_port: 32768,
                bind_ip: "0.0.0.0".to_string(),
                protocol: Protocol::Tcp,
            }],
            timestamp: 1700000000000000,
            sent_status: ContainerStatus::Running,
        }
    }

    #[test]
    fn test_rendering() {
        assert_eq!(
            change(Some("OOM")).to_string(),
            "task-1 web -> STOPPED, Exit 137, Reason OOM, Ports [0.0.0.0:32768->80/tcp], Known Sent: RUNNING"
        );
    }

    #[test]
    fn test_equality_ignores_reason() {
        assert_eq!(change(Some("OOM")), change(Some("oom ")));
        assert_eq!(change(None), change(Some("OOM")));
    }

    #[test]
    fn test_payload_shape() {
        let json = serde_json::to_value(change(None)).unwrap();
        assert_eq!(json["taskArn"], "task-1");
        assert_eq!(json["containerName"], "web");
        assert_eq!(json["status"], "STOPPED");
        assert_eq!(json["exitCode"], 137);
        assert_eq!(json["networkBindings"][0]["hostPort"], 32768);
        assert!(json.get("reason").is_none());
        assert!(json.get("sentStatus").is_none());
    }
}
