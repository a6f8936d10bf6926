use std::sync::Arc;

use crate::report::events::StateChange;
use crate::state::registry::Registry;

/// Closes the loop after a transport confirmed a delivery.
#[derive(Debug, Clone)]
pub struct Acknowledger {
    registry: Arc<Registry>,
}

impl Acknowledger {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Records `change` as delivered. Returns whether the sent status
    /// moved.
    ///
    /// Duplicate and stale acknowledgments are no-ops, as are
    /// acknowledgments for entities that are no longer tracked.
    pub fn on_delivered(&self, change: &StateChange) -> bool {
        let advanced = match change {
            StateChange::Container(change) => self
                .registry
                .container(&change.key())
                .map(|container| container.set_sent_status(change.status)),
            StateChange::Task(change) => self
                .registry
                .task(&change.task_arn)
                .map(|task| task.set_sent_status(change.status)),
            StateChange::Attachment(change) => Some(self.registry.mark_attachment_sent(change)),
        };
        match advanced {
            Some(true) => log::info!("Delivered: {change}"),
            Some(false) => log::debug!("Acknowledgment changed nothing: {change}"),
            None => log::debug!("Acknowledgment for untracked {:?}: {change}", change.key()),
        }
        advanced.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::emitter::{ChangeEmitter, Reportable};
    use crate::report::events::AttachmentStateChange;
    use crate::state::container::{ContainerKey, ContainerUpdate};
    use crate::state::status::{ContainerStatus, Status};
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_acknowledgment_is_idempotent() {
        let registry = Arc::new(Registry::new());
        let ack = Acknowledger::new(Arc::clone(&registry));
        let c = registry.register_container(ContainerKey::new("task-1", "web"), true).unwrap();
        c.set_known_status(ContainerStatus::Running);

        let change = StateChange::from(c.try_emit().unwrap());
        assert!(ack.on_delivered(&change));
        assert!(!ack.on_delivered(&change));
        assert_eq!(c.sent_status(), ContainerStatus::Running);
        assert!(c.try_emit().is_none());
    }

    #[test]
    fn test_late_acknowledgment_of_superseded_change() {
        let registry = Arc::new(Registry::new());
        let ack = Acknowledger::new(Arc::clone(&registry));
        let c = registry.register_container(ContainerKey::new("task-1", "web"), true).unwrap();

        c.set_known_status(ContainerStatus::Running);
        let running = StateChange::from(c.try_emit().unwrap());
        c.apply(ContainerUpdate::new(ContainerStatus::Stopped).exit_code(137));
        let stopped = StateChange::from(c.try_emit().unwrap());

        assert!(ack.on_delivered(&stopped));
        assert!(!ack.on_delivered(&running));
        assert_eq!(c.sent_status(), ContainerStatus::Stopped);
    }

    #[test]
    fn test_acknowledgment_for_retired_entity_is_ignored() {
        let registry = Arc::new(Registry::new());
        let ack = Acknowledger::new(Arc::clone(&registry));
        let c = registry.register_container(ContainerKey::new("task-1", "web"), true).unwrap();
        c.set_known_status(ContainerStatus::Stopped);
        registry.refresh_task("task-1");
        let changes = ChangeEmitter.pending(&registry);
        for change in &changes {
            ack.on_delivered(change);
        }
        assert_eq!(registry.retire(), 1);
        for change in &changes {
            assert!(!ack.on_delivered(change));
        }
    }

    #[test]
    fn test_attachment_acknowledgment() {
        let registry = Arc::new(Registry::new());
        let ack = Acknowledger::new(Arc::clone(&registry));
        let change = AttachmentStateChange::new("task-1", "eni-1", "DETACHED", None);
        registry.queue_attachment(change.clone());

        assert!(ack.on_delivered(&StateChange::from(change.clone())));
        assert!(ChangeEmitter.pending(&registry).is_empty());
        assert!(!ack.on_delivered(&StateChange::from(change)));
    }

    #[derive(Debug, Clone)]
    enum Step {
        Observe(ContainerStatus),
        Emit,
        DeliverOldest,
        DeliverNewest,
    }

    impl Arbitrary for Step {
        fn arbitrary(g: &mut Gen) -> Self {
            match u8::arbitrary(g) % 4 {
                0 => Step::Observe(*g.choose(ContainerStatus::all()).unwrap()),
                1 => Step::Emit,
                2 => Step::DeliverOldest,
                _ => Step::DeliverNewest,
            }
        }
    }

    /// Random interleavings of observations, emissions and (possibly late,
    /// possibly repeated) acknowledgments never acknowledge a status twice,
    /// never move the sent status backward and never let it pass the known
    /// status.
    #[quickcheck]
    fn prop_each_status_acknowledged_at_most_once(steps: Vec<Step>) -> bool {
        let registry = Arc::new(Registry::new());
        let ack = Acknowledger::new(Arc::clone(&registry));
        let c = registry.register_container(ContainerKey::new("task-1", "web"), true).unwrap();

        let mut in_flight: Vec<StateChange> = Vec::new();
        let mut acknowledged: Vec<ContainerStatus> = Vec::new();
        let mut last_sent = c.sent_status();

        for step in steps {
            match step {
                Step::Observe(status) => {
                    c.set_known_status(status);
                }
                Step::Emit => {
                    if let Some(change) = c.try_emit() {
                        in_flight.push(change.into());
                    }
                }
                Step::DeliverOldest | Step::DeliverNewest => {
                    let change = match step {
                        Step::DeliverOldest => in_flight.first(),
                        _ => in_flight.last(),
                    };
                    if let Some(change) = change.cloned() {
                        if ack.on_delivered(&change) {
                            acknowledged.push(c.sent_status());
                        }
                    }
                }
            }

            let sent = c.sent_status();
            if sent < last_sent || sent > c.known_status() {
                return false;
            }
            last_sent = sent;
        }

        let mut unique = acknowledged.clone();
        unique.dedup();
        unique.len() == acknowledged.len()
    }

    #[test]
    fn test_concurrent_emit_and_acknowledge() {
        let registry = Arc::new(Registry::new());
        let c = registry.register_container(ContainerKey::new("task-1", "web"), true).unwrap();

        let observer = {
            let c = Arc::clone(&c);
            std::thread::spawn(move || {
                for status in ContainerStatus::all() {
                    c.set_known_status(*status);
                    std::thread::yield_now();
                }
            })
        };
        let reporters: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let c = Arc::clone(&c);
                std::thread::spawn(move || {
                    let ack = Acknowledger::new(registry);
                    for _ in 0..1_000 {
                        if let Some(change) = c.try_emit() {
                            ack.on_delivered(&change.into());
                        }
                        let snapshot = c.snapshot();
                        assert!(snapshot.status.sent() <= snapshot.status.known());
                    }
                })
            })
            .collect();

        observer.join().expect("observer panicked");
        for reporter in reporters {
            reporter.join().expect("reporter panicked");
        }
        if let Some(change) = c.try_emit() {
            Acknowledger::new(Arc::clone(&registry)).on_delivered(&change.into());
        }
        assert_eq!(c.sent_status(), ContainerStatus::Stopped);
    }
}
