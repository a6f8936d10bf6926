use std::collections::HashMap;

use bollard::models::ContainerInspectResponse;

use crate::config_file::LabelConfig;
use crate::state::container::{ContainerKey, ContainerUpdate, PortBinding, Protocol};
use crate::state::status::ContainerStatus;

const OOM_REASON: &str = "OutOfMemoryError: Container killed due to memory usage";

/// What the runtime says about one labelled container at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerObservation {
    pub key: ContainerKey,
    pub essential: bool,
    pub update: ContainerUpdate,
    /// Only set once the container runs and its host ports are known.
    pub port_bindings: Option<Vec<PortBinding>>,
}

/// The task a container belongs to and its name inside that task, read
/// from the container labels. `None` for containers we do not manage.
pub fn container_key(
    labels: &LabelConfig,
    container_labels: &HashMap<String, String>,
    runtime_name: Option<&str>,
) -> Option<ContainerKey> {
    let task_arn = container_labels.get(&labels.task_arn)?;
    let name = container_labels
        .get(&labels.container_name)
        .map(String::as_str)
        .or_else(|| runtime_name.map(|n| n.trim_start_matches('/')))?;
    Some(ContainerKey::new(task_arn.as_str(), name))
}

fn is_essential(labels: &LabelConfig, container_labels: &HashMap<String, String>) -> bool {
    container_labels
        .get(&labels.essential)
        .map(|v| !v.eq_ignore_ascii_case("false"))
        .unwrap_or(true)
}

pub fn observe(labels: &LabelConfig, info: &ContainerInspectResponse) -> Option<ContainerObservation> {
    let container_labels = info.config.as_ref()?.labels.as_ref()?;
    let key = container_key(labels, container_labels, info.name.as_deref())?;
    let essential = is_essential(labels, container_labels);

    let state = info.state.as_ref();
    let status = state
        .and_then(|s| s.status)
        .map(ContainerStatus::from)
        .unwrap_or(ContainerStatus::None);

    let mut update = ContainerUpdate::new(status);
    if status == ContainerStatus::Stopped {
        if let Some(exit_code) = state
            .and_then(|s| s.exit_code)
            .and_then(|code| i32::try_from(code).ok())
        {
            update = update.exit_code(exit_code);
        }
        if let Some(reason) = stop_reason(state) {
            update = update.reason(reason);
        }
    }

    let port_bindings = match status {
        ContainerStatus::Running => Some(port_bindings(info)),
        _ => None,
    };

    Some(ContainerObservation {
        key,
        essential,
        update,
        port_bindings,
    })
}

fn stop_reason(state: Option<&bollard::models::ContainerState>) -> Option<String> {
    let state = state?;
    if state.oom_killed.unwrap_or(false) {
        return Some(OOM_REASON.to_string());
    }
    state.error.clone().filter(|e| !e.is_empty())
}

/// Host bindings from the runtime's port map, e.g. `"80/tcp" -> [0.0.0.0:32768]`.
fn port_bindings(info: &ContainerInspectResponse) -> Vec<PortBinding> {
    let Some(ports) = info
        .network_settings
        .as_ref()
        .and_then(|settings| settings.ports.as_ref())
    else {
        return Vec::new();
    };

    let mut bindings = Vec::new();
    for (port, host_bindings) in ports {
        let Some((container_port, protocol)) = parse_port(port) else {
            log::debug!("Skipping unparsable port {port}");
            continue;
        };
        for host in host_bindings.iter().flatten() {
            let Some(host_port) = host.host_port.as_deref().and_then(|p| p.parse().ok()) else {
                continue;
            };
            bindings.push(PortBinding {
                container_port,
                host_port,
                bind_ip: host.host_ip.clone().unwrap_or_default(),
                protocol,
            });
        }
    }
    bindings.sort_by(|a, b| {
        (a.container_port, a.host_port, &a.bind_ip).cmp(&(b.container_port, b.host_port, &b.bind_ip))
    });
    bindings
}

fn parse_port(port: &str) -> Option<(u16, Protocol)> {
    let (number, protocol) = port.split_once('/').unwrap_or((port, "tcp"));
    let protocol = match protocol {
        "tcp" => Protocol::Tcp,
        "udp" => Protocol::Udp,
        "sctp" => Protocol::Sctp,
        _ => return None,
    };
    Some((number.parse().ok()?, protocol))
}
