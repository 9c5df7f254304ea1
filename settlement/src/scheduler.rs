//! Background sweep scheduler
//!
//! Drives the periodic maintenance work: escrow timeouts, fuel
//! repricing, stale checkpoints and certificate expiry. Each tick runs
//! every sweep once; the sweeps themselves are idempotent, so an extra
//! tick is harmless.

use crate::orchestrator::SettlementOrchestrator;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Periodic sweep runner
pub struct SweepScheduler {
    orchestrator: Arc<SettlementOrchestrator>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SweepScheduler {
    pub fn new(orchestrator: Arc<SettlementOrchestrator>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            orchestrator,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Spawn the sweep loop on the current runtime
    pub fn spawn(&self) -> JoinHandle<()> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let mut shutdown_rx = self.shutdown_rx.clone();
        let interval_secs = orchestrator.config().sweep_interval_secs;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            // The first tick fires immediately; skip it so a fresh start
            // does not sweep an empty engine
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match orchestrator.run_sweeps(Utc::now()) {
                            Ok(report) => {
                                tracing::debug!(
                                    disputed = report.disputed_escrows.len(),
                                    repriced = report.repriced_routes.len(),
                                    "Scheduled sweep finished"
                                );
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Scheduled sweep failed");
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Sweep scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Signal the sweep loop to stop
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn test_orchestrator() -> (Arc<SettlementOrchestrator>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.ledger_data_dir = temp_dir.path().to_path_buf();
        config.sweep_interval_secs = 3600;
        (
            Arc::new(SettlementOrchestrator::new(config).unwrap()),
            temp_dir,
        )
    }

    #[tokio::test]
    async fn test_scheduler_shutdown() {
        let (orchestrator, _temp) = test_orchestrator();
        let scheduler = SweepScheduler::new(orchestrator);

        let handle = scheduler.spawn();
        scheduler.shutdown();

        handle.await.unwrap();
    }
}
