use crate::report::events::{ContainerStateChange, StateChange, TaskStateChange};
use crate::state::container::Container;
use crate::state::registry::Registry;
use crate::state::status::Status;
use crate::state::task::Task;

/// An entity that can describe its unacknowledged status as a change.
pub trait Reportable {
    type Change: Into<StateChange>;

    /// Returns a change for the known status iff it is ahead of the sent
    /// status. The comparison and the copy of every field happen under the
    /// entity's lock, so the change never mixes two instants.
    ///
    /// Calling this again before acknowledgment yields an equal change.
    /// Once the known status moves on, only the latest status is offered.
    fn try_emit(&self) -> Option<Self::Change>;
}

fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

impl Reportable for Container {
    type Change = ContainerStateChange;

    fn try_emit(&self) -> Option<ContainerStateChange> {
        let snapshot = self.snapshot();
        let status = snapshot.status.unsent()?;
        Some(ContainerStateChange {
            task_arn: self.task_arn().to_string(),
            container_name: self.name().to_string(),
            status,
            reason: snapshot.reason,
            exit_code: if status.is_terminal() {
                snapshot.exit_code
            } else {
                None
            },
            port_bindings: snapshot.port_bindings.unwrap_or_default(),
            timestamp: now_micros(),
            sent_status: snapshot.status.sent(),
        })
    }
}

impl Reportable for Task {
    type Change = TaskStateChange;

    fn try_emit(&self) -> Option<TaskStateChange> {
        let snapshot = self.snapshot();
        let status = snapshot.status.unsent()?;
        Some(TaskStateChange {
            task_arn: self.arn().to_string(),
            status,
            reason: snapshot.reason,
            timestamp: now_micros(),
            sent_status: snapshot.status.sent(),
        })
    }
}

/// Collects every reportable change across the registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChangeEmitter;

impl ChangeEmitter {
    pub fn try_emit<E: Reportable>(&self, entity: &E) -> Option<E::Change> {
        entity.try_emit()
    }

    /// Containers come first so a task's stop is never offered ahead of
    /// the container stop that caused it.
    pub fn pending(&self, registry: &Registry) -> Vec<StateChange> {
        let containers = registry
            .containers()
            .into_iter()
            .filter_map(|c| self.try_emit(c.as_ref()).map(StateChange::from));
        let tasks = registry
            .tasks()
            .into_iter()
            .filter_map(|t| self.try_emit(t.as_ref()).map(StateChange::from));
        let attachments = registry
            .pending_attachments()
            .into_iter()
            .map(StateChange::from);

        let changes: Vec<StateChange> = containers.chain(tasks).chain(attachments).collect();
        for change in &changes {
            log::debug!("Pending: {change}");
        }
        changes
    }
}
