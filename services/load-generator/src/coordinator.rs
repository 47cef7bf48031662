//! Fan-out of workers and collection of their results.

use std::sync::Arc;

use store_client::ConnectionFactory;
use tracing::{error, info, warn};

use crate::config::RunConfig;
use crate::error::LoadTestError;
use crate::report::RunReport;
use crate::worker::{run_worker, WorkerResult};

/// Per-worker outcomes of one run.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub results: Vec<WorkerResult>,
    pub failures: Vec<LoadTestError>,
}

/// Launches one independent task per worker and waits for all of them.
pub struct Coordinator {
    config: RunConfig,
    factory: Arc<dyn ConnectionFactory>,
}

impl Coordinator {
    pub fn new(config: RunConfig, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { config, factory }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every worker to completion.
    ///
    /// A failing worker never cancels its siblings; its error is collected
    /// and the remaining workers are still awaited.
    pub async fn run(&self) -> RunOutcome {
        info!(
            workers = self.config.workers,
            duration_secs = self.config.duration_secs,
            "Running {} worker(s) for {} seconds",
            self.config.workers,
            self.config.duration_secs
        );
        if self.config.ops_per_second() == 0 {
            warn!("All quotas are zero; workers will only pace empty ticks");
        }

        // Each task gets its own copy of the configuration.
        let handles: Vec<_> = (0..self.config.workers)
            .map(|worker_id| {
                let config = self.config.clone();
                let factory = self.factory.clone();
                (worker_id, tokio::spawn(run_worker(worker_id, config, factory)))
            })
            .collect();

        let mut outcome = RunOutcome::default();
        for (worker_id, handle) in handles {
            match handle.await {
                Ok(Ok(result)) => outcome.results.push(result),
                Ok(Err(e)) => {
                    error!(worker = worker_id, error = %e, "Worker failed");
                    outcome.failures.push(e);
                }
                Err(e) => {
                    error!(worker = worker_id, error = %e, "Worker task aborted");
                    outcome.failures.push(LoadTestError::WorkerPanicked {
                        worker_id,
                        message: e.to_string(),
                    });
                }
            }
        }
        outcome
    }

    /// Run every worker and build the final report.
    pub async fn run_report(&self) -> RunReport {
        let outcome = self.run().await;
        RunReport::new(
            self.config.workers,
            self.config.duration_secs,
            outcome.results,
            outcome.failures.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadSettings;
    use store_client::OperationKind;
    use test_utils::RecordingFactory;

    fn config(workers: u32) -> RunConfig {
        let mut settings = LoadSettings {
            workers,
            duration_secs: 2,
            ..LoadSettings::default()
        };
        settings.set_quota(OperationKind::Insert, 2);
        RunConfig::from_settings(&settings).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_result_per_worker() {
        let factory = RecordingFactory::new();
        let log = factory.log();

        let coordinator = Coordinator::new(config(4), Arc::new(factory));
        assert_eq!(coordinator.config().workers, 4);
        let outcome = coordinator.run().await;

        assert_eq!(outcome.results.len(), 4);
        assert!(outcome.failures.is_empty());
        let mut ids: Vec<_> = outcome.results.iter().map(|r| r.worker_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        for worker_id in 0..4 {
            assert_eq!(log.count_for(worker_id, OperationKind::Insert), 4);
        }
        assert_eq!(log.connects(), 4);
        assert_eq!(log.closes(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_spares_siblings() {
        let factory = RecordingFactory::new().refuse_worker(1);
        let report = Coordinator::new(config(3), Arc::new(factory)).run_report().await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.summary.as_ref().map(|s| s.count), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_worker_reported_and_closed() {
        let factory = RecordingFactory::new().panic_worker_on_op(2, 1);
        let log = factory.log();

        let outcome = Coordinator::new(config(3), Arc::new(factory)).run().await;

        assert_eq!(outcome.results.len(), 2);
        assert!(matches!(
            outcome.failures.as_slice(),
            [LoadTestError::WorkerPanicked { worker_id: 2, .. }]
        ));
        assert_eq!(log.closes(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_workers_failing_reports_no_summary() {
        let factory = RecordingFactory::new()
            .fail_worker_on_op(0, 1)
            .fail_worker_on_op(1, 1);
        let report = Coordinator::new(config(2), Arc::new(factory)).run_report().await;

        assert_eq!(report.failed, 2);
        assert!(report.summary.is_none());
    }
}
