use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::container::{Container, ContainerKey};
use super::status::{ContainerStatus, Status, TaskStatus};
use super::task::Task;
use crate::report::events::AttachmentStateChange;

const ESSENTIAL_CONTAINER_EXITED: &str = "Essential container in task exited";

#[derive(Debug, Default)]
struct AttachmentLedger {
    pending: Vec<AttachmentStateChange>,
    /// Last delivered status per `(task_arn, attachment_arn)`.
    sent: HashMap<(String, String), String>,
}

impl AttachmentLedger {
    /// The status the attachment will have once everything queued is
    /// delivered.
    fn latest_status(&self, change: &AttachmentStateChange) -> Option<&str> {
        let key = change.attachment_key();
        self.pending
            .iter()
            .rev()
            .find(|pending| pending.attachment_key() == key)
            .map(|pending| pending.status.as_str())
            .or_else(|| self.sent.get(&key).map(String::as_str))
    }
}

#[derive(Debug, Default)]
struct Members {
    tasks: BTreeMap<String, Arc<Task>>,
    containers: BTreeMap<ContainerKey, Arc<Container>>,
    /// Fully reported and retired. Kept until the runtime forgets the
    /// container so that re-observing it reports nothing.
    retired_tasks: BTreeSet<String>,
    retired_containers: BTreeSet<ContainerKey>,
}

impl Members {
    fn containers_of<'a>(
        &'a self,
        task_arn: &'a str,
    ) -> impl Iterator<Item = (&'a ContainerKey, &'a Arc<Container>)> + 'a {
        self.containers
            .range(ContainerKey::new(task_arn, "")..)
            .take_while(move |(key, _)| key.task_arn == task_arn)
    }
}

/// Every task and container the agent currently tracks.
///
/// The maps only guard membership. Each entity carries its own lock, so
/// mutating one entity never blocks another. The membership lock is always
/// taken before an entity lock, never while holding one.
#[derive(Debug, Default)]
pub struct Registry {
    members: RwLock<Members>,
    attachments: Mutex<AttachmentLedger>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Members> {
        self.members.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Members> {
        self.members.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` once the task was retired.
    pub fn register_task(&self, arn: &str) -> Option<Arc<Task>> {
        if let Some(task) = self.task(arn) {
            return Some(task);
        }
        let mut members = self.write();
        if members.retired_tasks.contains(arn) {
            log::debug!("Ignoring retired task {arn}");
            return None;
        }
        Some(Arc::clone(members.tasks.entry(arn.to_string()).or_insert_with(|| {
            log::info!("Tracking task {arn}");
            Arc::new(Task::new(arn))
        })))
    }

    /// Registers the container and its task if either is new. `None` once
    /// the container or its task was retired.
    pub fn register_container(&self, key: ContainerKey, essential: bool) -> Option<Arc<Container>> {
        if let Some(container) = self.container(&key) {
            return Some(container);
        }
        let mut members = self.write();
        if members.retired_tasks.contains(&key.task_arn) || members.retired_containers.contains(&key) {
            log::debug!("Ignoring retired container {key}");
            return None;
        }
        if !members.tasks.contains_key(&key.task_arn) {
            log::info!("Tracking task {}", key.task_arn);
            members
                .tasks
                .insert(key.task_arn.clone(), Arc::new(Task::new(key.task_arn.as_str())));
        }
        Some(Arc::clone(members.containers.entry(key.clone()).or_insert_with(|| {
            log::info!("Tracking container {key}");
            Arc::new(Container::new(key, essential))
        })))
    }

    pub fn task(&self, arn: &str) -> Option<Arc<Task>> {
        self.read().tasks.get(arn).cloned()
    }

    pub fn container(&self, key: &ContainerKey) -> Option<Arc<Container>> {
        self.read().containers.get(key).cloned()
    }

    pub fn tasks(&self) -> Vec<Arc<Task>> {
        self.read().tasks.values().cloned().collect()
    }

    pub fn containers(&self) -> Vec<Arc<Container>> {
        self.read().containers.values().cloned().collect()
    }

    pub fn containers_of(&self, task_arn: &str) -> Vec<Arc<Container>> {
        self.read()
            .containers_of(task_arn)
            .map(|(_, container)| Arc::clone(container))
            .collect()
    }

    pub fn is_retired(&self, key: &ContainerKey) -> bool {
        let members = self.read();
        members.retired_tasks.contains(&key.task_arn) || members.retired_containers.contains(key)
    }

    /// Drops the record of a retired container once the runtime no longer
    /// knows it. The task record goes with its last container.
    pub fn forget(&self, key: &ContainerKey) -> bool {
        let mut members = self.write();
        if !members.retired_containers.remove(key) {
            return false;
        }
        let task_arn = key.task_arn.as_str();
        let last = !members
            .retired_containers
            .range(ContainerKey::new(task_arn, "")..)
            .next()
            .is_some_and(|other| other.task_arn == task_arn);
        if last {
            members.retired_tasks.remove(task_arn);
        }
        log::debug!("Forgot retired container {key}");
        true
    }

    /// Forgets every retired container not in `present`, the containers
    /// the runtime still knows. Returns how many were forgotten.
    pub fn forget_missing(&self, present: &BTreeSet<ContainerKey>) -> usize {
        let missing: Vec<ContainerKey> = self
            .read()
            .retired_containers
            .difference(present)
            .cloned()
            .collect();
        missing.iter().filter(|key| self.forget(key)).count()
    }

    /// Derives the task status from its containers and routes it through
    /// the task's regular status update.
    ///
    /// A stopped essential container stops the task. Otherwise the task is
    /// as far along as its slowest container.
    pub fn refresh_task(&self, task_arn: &str) -> bool {
        let Some(task) = self.task(task_arn) else {
            return false;
        };
        let containers = self.containers_of(task_arn);
        if containers.is_empty() {
            return false;
        }

        let essential_stopped = containers
            .iter()
            .any(|c| c.is_essential() && c.known_status() == ContainerStatus::Stopped);
        if essential_stopped {
            return task.transition(
                TaskStatus::Stopped,
                Some(ESSENTIAL_CONTAINER_EXITED.to_string()),
            );
        }

        let slowest = containers
            .iter()
            .map(|c| c.known_status())
            .min()
            .unwrap_or(ContainerStatus::NONE);
        let status = TaskStatus::from(slowest);
        if status == TaskStatus::NONE {
            return false;
        }
        task.set_known_status(status)
    }

    /// Queues an attachment change unless it would not move the
    /// attachment: its status equals the last queued one, or the last
    /// delivered one when nothing is queued. Changes of retired tasks are
    /// dropped.
    pub fn queue_attachment(&self, change: AttachmentStateChange) -> bool {
        if self.read().retired_tasks.contains(&change.task_arn) {
            log::debug!("Ignoring attachment change of retired task {change}");
            return false;
        }
        let mut ledger = self
            .attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if ledger.latest_status(&change) == Some(change.status.as_str()) {
            log::debug!("Ignoring duplicate attachment change {change}");
            return false;
        }
        ledger.pending.push(change);
        true
    }

    pub fn pending_attachments(&self) -> Vec<AttachmentStateChange> {
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .clone()
    }

    /// Returns whether `change` was still waiting for delivery.
    pub fn mark_attachment_sent(&self, change: &AttachmentStateChange) -> bool {
        let mut ledger = self
            .attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(index) = ledger.pending.iter().position(|pending| pending == change) else {
            return false;
        };
        let delivered = ledger.pending.remove(index);
        ledger
            .sent
            .insert(delivered.attachment_key(), delivered.status);
        true
    }

    /// Stops tracking tasks that are stopped and fully acknowledged, along
    /// with their containers, once every container and attachment is
    /// settled too. Retired entities are remembered until
    /// [`Registry::forget`].
    pub fn retire(&self) -> usize {
        let mut ledger = self
            .attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut members = self.write();

        let settled: Vec<String> = members
            .tasks
            .values()
            .filter(|task| task.is_settled())
            .filter(|task| {
                members
                    .containers_of(task.arn())
                    .all(|(_, container)| container.is_settled())
            })
            .filter(|task| !ledger.pending.iter().any(|p| p.task_arn == task.arn()))
            .map(|task| task.arn().to_string())
            .collect();

        for arn in &settled {
            let keys: Vec<ContainerKey> = members
                .containers_of(arn)
                .map(|(key, _)| key.clone())
                .collect();
            for key in keys {
                members.containers.remove(&key);
                members.retired_containers.insert(key);
            }
            members.tasks.remove(arn);
            members.retired_tasks.insert(arn.clone());
            log::info!("Retired task {arn}");
        }
        ledger.sent.retain(|(task_arn, _), _| !settled.contains(task_arn));
        settled.len()
    }
}
