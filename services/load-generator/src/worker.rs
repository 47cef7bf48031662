//! One isolated worker: its own connection, scheduler and RNG.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use store_client::{ConnectionFactory, OperationKind};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::aggregate::serialize_secs;
use crate::config::RunConfig;
use crate::error::{LoadTestError, LoadTestResult};
use crate::scheduler::{worker_rng, WorkloadScheduler};

/// What a worker reports after reaching its deadline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerResult {
    pub worker_id: usize,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub ticks: u64,
    pub overruns: u64,
    pub operations: BTreeMap<OperationKind, u64>,
}

impl WorkerResult {
    pub fn total_operations(&self) -> u64 {
        self.operations.values().sum()
    }
}

/// Run one worker to its deadline.
///
/// The connection is closed on every exit path, including a panic inside the
/// scheduler; the error or panic is reported after the close.
#[instrument(skip_all, fields(worker = worker_id))]
pub async fn run_worker(
    worker_id: usize,
    config: RunConfig,
    factory: Arc<dyn ConnectionFactory>,
) -> LoadTestResult<WorkerResult> {
    info!(
        ops_per_second = config.ops_per_second(),
        "Worker {} will run {} operations per second",
        worker_id,
        config.ops_per_second()
    );

    let mut conn = factory
        .connect(worker_id)
        .await
        .map_err(|source| LoadTestError::Connection { worker_id, source })?;

    let process_start = Instant::now();
    let deadline = process_start + config.duration();
    let rng = worker_rng(config.seed, worker_id);
    let mut scheduler = WorkloadScheduler::new(worker_id, config.operations, rng);

    let outcome = AssertUnwindSafe(scheduler.run_until(conn.as_mut(), deadline))
        .catch_unwind()
        .await;
    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close connection");
    }
    match outcome {
        Ok(result) => result?,
        Err(panic) => {
            return Err(LoadTestError::WorkerPanicked {
                worker_id,
                message: panic_message(panic.as_ref()),
            })
        }
    }

    let stats = scheduler.into_stats();
    Ok(WorkerResult {
        worker_id,
        elapsed: process_start.elapsed(),
        ticks: stats.ticks,
        overruns: stats.overruns,
        operations: stats.operations,
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
