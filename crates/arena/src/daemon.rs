use std::sync::Arc;
use std::time::Duration;

use arena_agents::CycleOrchestrator;
use arena_models::cycle::CycleStatus;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Runs a cycle immediately and then on a fixed interval until cancelled.
pub struct Scheduler {
    orchestrator: Arc<CycleOrchestrator>,
    interval: Duration,
    force: bool,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<CycleOrchestrator>, interval: Duration, force: bool) -> Self {
        Self {
            orchestrator,
            interval,
            force,
            cancel: CancellationToken::new(),
        }
    }

    /// Returns a CancellationToken that can be used to trigger shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until cancelled. Returns the number of cycles completed.
    ///
    /// A cycle in progress is finished before shutdown takes effect.
    pub async fn run(&self) -> u64 {
        info!(interval_secs = self.interval.as_secs(), forced = self.force, "Scheduler starting");
        let mut cycles = 0;

        loop {
            let report = self.orchestrator.run_cycle(self.force).await;
            cycles += 1;
            let skipped = report.count(CycleStatus::MarketClosed)
                + report.count(CycleStatus::LimitReached);
            info!(
                cycle = %report.id,
                trades = report.count(CycleStatus::Success),
                skipped,
                "Scheduled cycle done"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(cycles, "Scheduler stopped");
        cycles
    }
}
