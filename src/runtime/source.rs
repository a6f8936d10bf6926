use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config_file::LabelConfig;
use crate::report::events::AttachmentStateChange;
use crate::state::container::{ContainerKey, ContainerUpdate};
use crate::state::registry::Registry;
use crate::state::status::ContainerStatus;

use super::observe::ContainerObservation;

const CONTAINER_REMOVED: &str = "Container removed";

/// The single path through which runtime observations reach the
/// registry. Shared by the event listener and the reconciler.
#[derive(Debug, Clone)]
pub struct RuntimeSource {
    registry: Arc<Registry>,
    labels: LabelConfig,
}

impl RuntimeSource {
    pub fn new(registry: Arc<Registry>, labels: LabelConfig) -> Self {
        Self { registry, labels }
    }

    pub fn labels(&self) -> &LabelConfig {
        &self.labels
    }

    /// Registers the container if needed, applies the observed status and
    /// re-derives the task. Returns whether the container moved.
    ///
    /// Observations of retired containers are dropped; their final status
    /// was already delivered.
    pub fn apply(&self, observation: ContainerObservation) -> bool {
        let ContainerObservation {
            key,
            essential,
            update,
            port_bindings,
        } = observation;

        let Some(container) = self.registry.register_container(key, essential) else {
            return false;
        };
        if let Some(port_bindings) = port_bindings {
            container.set_port_bindings(port_bindings);
        }
        let moved = container.apply(update);
        self.registry.refresh_task(container.task_arn());
        moved
    }

    /// The runtime forgot a container. Whatever a tracked one was doing, it
    /// is not running anymore. A retired one may be forgotten for good.
    pub fn container_removed(&self, key: &ContainerKey) -> bool {
        let Some(container) = self.registry.container(key) else {
            self.registry.forget(key);
            return false;
        };
        let moved = container
            .apply(ContainerUpdate::new(ContainerStatus::Stopped).reason(CONTAINER_REMOVED));
        self.registry.refresh_task(&key.task_arn);
        moved
    }

    /// Drops retirement records of containers the runtime no longer lists.
    pub fn containers_listed(&self, present: &BTreeSet<ContainerKey>) -> usize {
        self.registry.forget_missing(present)
    }

    pub fn attachment(&self, change: AttachmentStateChange) -> bool {
        self.registry.queue_attachment(change)
    }
}
