use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::report::ack::Acknowledger;
use crate::report::emitter::ChangeEmitter;
use crate::report::transport::Transport;
use crate::state::registry::Registry;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    pub submitted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub retired: usize,
}

/// Drives emission, submission and acknowledgment on its own schedule,
/// decoupled from the sources that mutate entities.
pub struct Reporter {
    registry: Arc<Registry>,
    emitter: ChangeEmitter,
    transport: Arc<dyn Transport>,
    acknowledger: Acknowledger,
    interval: Duration,
}

impl Reporter {
    pub fn new(registry: Arc<Registry>, transport: Arc<dyn Transport>, interval: Duration) -> Self {
        Self {
            acknowledger: Acknowledger::new(Arc::clone(&registry)),
            registry,
            emitter: ChangeEmitter,
            transport,
            interval,
        }
    }

    /// One pass over every pending change. A change whose submission fails
    /// stays pending and is offered again on the next pass.
    pub async fn report_once(&self) -> ReportSummary {
        let start = Instant::now();
        let mut summary = ReportSummary::default();

        for change in self.emitter.pending(&self.registry) {
            summary.submitted += 1;
            match self.transport.submit(&change).await {
                Ok(()) => {
                    self.acknowledger.on_delivered(&change);
                    summary.delivered += 1;
                }
                Err(e) => {
                    log::warn!("Failed to submit {change}: {e}");
                    summary.failed += 1;
                }
            }
        }
        summary.retired = self.registry.retire();

        if summary.failed > 0 {
            log::info!(
                "{} state changes still pending acknowledgment",
                summary.failed
            );
        }
        let duration = start.elapsed();
        if duration.as_secs() > 1 {
            log::warn!("Report cycle took {:?}", duration);
        }
        summary
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        log::info!("Reporter started");
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.report_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("Reporter stopping, flushing pending state changes");
        self.report_once().await;
        log::info!("Reporter stopped");
    }
}
