use std::collections::HashMap;
use std::time::Duration;

use bollard::Docker;
use bollard::models::{EventMessage, EventMessageTypeEnum};
use bollard::query_parameters::{EventsOptions, EventsOptionsBuilder};
use futures_util::StreamExt;
use tokio::sync::watch;

use super::docker::inspect;
use super::observe::{container_key, observe};
use super::source::RuntimeSource;
use crate::report::events::AttachmentStateChange;
use crate::state::container::ContainerKey;

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Container actions after which the container is inspected again.
const CONTAINER_ACTIONS: &[&str] = &[
    "create", "start", "restart", "pause", "unpause", "die", "stop", "kill", "oom", "destroy",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum RuntimeEvent {
    Container {
        id: String,
        action: String,
        attributes: HashMap<String, String>,
    },
    Network {
        network: String,
        container_id: String,
        attached: bool,
    },
}

fn classify(message: EventMessage) -> Option<RuntimeEvent> {
    let action = message.action?;
    let actor = message.actor?;
    let attributes = actor.attributes.unwrap_or_default();
    match message.typ? {
        EventMessageTypeEnum::CONTAINER if CONTAINER_ACTIONS.contains(&action.as_str()) => {
            Some(RuntimeEvent::Container {
                id: actor.id?,
                action,
                attributes,
            })
        }
        EventMessageTypeEnum::NETWORK => {
            let attached = match action.as_str() {
                "connect" => true,
                "disconnect" => false,
                _ => return None,
            };
            let network = attributes
                .get("name")
                .cloned()
                .or(actor.id)?;
            Some(RuntimeEvent::Network {
                network,
                container_id: attributes.get("container")?.clone(),
                attached,
            })
        }
        _ => None,
    }
}

/// Follows the runtime's event stream and feeds every relevant change
/// through [`RuntimeSource`]. Resubscribes when the stream breaks.
pub struct EventListener {
    docker: Docker,
    source: RuntimeSource,
    /// Runtime id to container key, for events that only carry the id.
    known_ids: HashMap<String, ContainerKey>,
}

impl EventListener {
    pub fn new(docker: Docker, source: RuntimeSource) -> Self {
        Self {
            docker,
            source,
            known_ids: HashMap::new(),
        }
    }

    fn options() -> EventsOptions {
        let mut filters = HashMap::new();
        filters.insert("type", vec!["container", "network"]);
        EventsOptionsBuilder::new().filters(&filters).build()
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        log::info!("Listening for runtime events");
        loop {
            let docker = self.docker.clone();
            let mut events = std::pin::pin!(docker.events(Some(Self::options())));
            loop {
                tokio::select! {
                    next = events.next() => match next {
                        Some(Ok(message)) => {
                            if let Some(event) = classify(message) {
                                self.handle(event).await;
                            }
                        }
                        Some(Err(e)) => {
                            log::warn!("Runtime event stream failed: {e}");
                            break;
                        }
                        None => {
                            log::warn!("Runtime event stream ended");
                            break;
                        }
                    },
                    _ = shutdown.changed() => {
                        log::info!("Event listener stopped");
                        return;
                    }
                }
            }
            tokio::time::sleep(RESUBSCRIBE_DELAY).await;
        }
    }

    /// The key of a container seen only by its runtime id.
    async fn resolve(&mut self, id: &str) -> Option<ContainerKey> {
        if let Some(key) = self.known_ids.get(id) {
            return Some(key.clone());
        }
        let info = match inspect(&self.docker, id).await {
            Ok(info) => info?,
            Err(e) => {
                log::warn!("Failed to inspect container {id}: {e}");
                return None;
            }
        };
        let key = container_key(
            self.source.labels(),
            info.config.as_ref()?.labels.as_ref()?,
            info.name.as_deref(),
        )?;
        self.known_ids.insert(id.to_string(), key.clone());
        Some(key)
    }

    async fn handle(&mut self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::Container {
                id,
                action,
                attributes,
            } => {
                let Some(key) = container_key(
                    self.source.labels(),
                    &attributes,
                    attributes.get("name").map(String::as_str),
                ) else {
                    return;
                };
                log::debug!("Runtime event {action} for {key}");
                match inspect(&self.docker, &id).await {
                    Ok(Some(info)) => {
                        if let Some(observation) = observe(self.source.labels(), &info) {
                            self.source.apply(observation);
                        }
                        self.known_ids.insert(id, key);
                    }
                    Ok(None) => {
                        self.source.container_removed(&key);
                        self.known_ids.remove(&id);
                    }
                    Err(e) => log::warn!("Failed to inspect container {key}: {e}"),
                }
            }
            RuntimeEvent::Network {
                network,
                container_id,
                attached,
            } => {
                let Some(key) = self.resolve(&container_id).await else {
                    return;
                };
                let status = if attached { "ATTACHED" } else { "DETACHED" };
                self.source.attachment(AttachmentStateChange::new(
                    key.task_arn,
                    format!("{network}/{container_id}"),
                    status,
                    None,
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::EventActor;

    fn message(typ: EventMessageTypeEnum, action: &str, attributes: &[(&str, &str)]) -> EventMessage {
        EventMessage {
            typ: Some(typ),
            action: Some(action.to_string()),
            actor: Some(EventActor {
                id: Some("abc123".to_string()),
                attributes: Some(
                    attributes
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_container_lifecycle_actions_are_kept() {
        let event = classify(message(EventMessageTypeEnum::CONTAINER, "die", &[("exitCode", "1")]));
        match event {
            Some(RuntimeEvent::Container { id, action, .. }) => {
                assert_eq!(id, "abc123");
                assert_eq!(action, "die");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_exec_actions_are_dropped() {
        assert!(classify(message(EventMessageTypeEnum::CONTAINER, "exec_start: sh", &[])).is_none());
        assert!(classify(message(EventMessageTypeEnum::IMAGE, "pull", &[])).is_none());
    }

    #[test]
    fn test_network_connect() {
        let event = classify(message(
            EventMessageTypeEnum::NETWORK,
            "connect",
            &[("name", "backend"), ("container", "c1")],
        ));
        assert_eq!(
            event,
            Some(RuntimeEvent::Network {
                network: "backend".to_string(),
                container_id: "c1".to_string(),
                attached: true,
            })
        );
        assert!(classify(message(EventMessageTypeEnum::NETWORK, "create", &[])).is_none());
    }
}
