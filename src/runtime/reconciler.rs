use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use bollard::Docker;
use bollard::query_parameters::{ListContainersOptions, ListContainersOptionsBuilder};
use tokio::sync::watch;

use super::RuntimeError;
use super::docker::inspect;
use super::observe::{container_key, observe};
use super::source::RuntimeSource;
use crate::state::container::ContainerKey;

/// Periodically walks every labelled container, stopped ones included,
/// and applies what the runtime reports.
///
/// The first pass after startup rebuilds the known statuses from scratch
/// while sent statuses start over at NONE, so a status delivered before a
/// restart may be delivered again.
pub struct Reconciler {
    docker: Docker,
    source: RuntimeSource,
    interval: Duration,
}

impl Reconciler {
    pub fn new(docker: Docker, source: RuntimeSource, interval: Duration) -> Self {
        Self {
            docker,
            source,
            interval,
        }
    }

    fn options(&self) -> ListContainersOptions {
        let label = self.source.labels().task_arn.as_str();
        let mut filters = HashMap::new();
        filters.insert("label", vec![label]);
        ListContainersOptionsBuilder::new()
            .all(true)
            .filters(&filters)
            .build()
    }

    /// Returns how many containers moved.
    pub async fn reconcile_once(&self) -> Result<usize, RuntimeError> {
        let summaries = self.docker.list_containers(Some(self.options())).await?;
        let present: BTreeSet<ContainerKey> = summaries
            .iter()
            .filter_map(|summary| {
                container_key(
                    self.source.labels(),
                    summary.labels.as_ref()?,
                    summary.names.as_ref()?.first().map(String::as_str),
                )
            })
            .collect();
        let forgotten = self.source.containers_listed(&present);
        if forgotten > 0 {
            log::debug!("Forgot {forgotten} removed containers");
        }

        let mut moved = 0;
        for id in summaries.into_iter().filter_map(|s| s.id) {
            match inspect(&self.docker, &id).await {
                Ok(Some(info)) => {
                    if let Some(observation) = observe(self.source.labels(), &info) {
                        if self.source.apply(observation) {
                            moved += 1;
                        }
                    }
                }
                // Removed between listing and inspecting, the listener sees the destroy
                Ok(None) => {}
                Err(e) => log::warn!("Failed to inspect container {id}: {e}"),
            }
        }
        Ok(moved)
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        log::info!("Reconciler started");
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.reconcile_once().await {
                        Ok(0) => {}
                        Ok(moved) => log::info!("Reconciliation moved {moved} containers"),
                        Err(e) => log::warn!("Reconciliation failed: {e}"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        log::info!("Reconciler stopped");
    }
}
