//! Rate-controlled workload generator for document stores.
//!
//! This crate provides tools to:
//! - Describe a mix of query/update/insert/delete/aggregate operations with per-second quotas
//! - Run that mix from many isolated workers, each paced to one-second ticks
//! - Summarize how long each worker took to get through its run

pub mod aggregate;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod operation;
pub mod report;
pub mod scheduler;
pub mod template;
pub mod worker;

use std::sync::Arc;

use store_client::ConnectionFactory;

pub use aggregate::RunSummary;
pub use config::{LoadSettings, OperationSettings, RunConfig};
pub use coordinator::{Coordinator, RunOutcome};
pub use error::{LoadTestError, LoadTestResult};
pub use operation::{Operation, OperationSpec};
pub use report::{ResultsReport, RunReport};
pub use scheduler::{Pacing, TickState, WorkloadScheduler};
pub use template::DocumentTemplate;
pub use worker::WorkerResult;

/// Validate `settings`, run every worker, and log the summary line.
///
/// Configuration errors are returned before any connection is opened.
pub async fn run_load_test(
    settings: &LoadSettings,
    factory: Arc<dyn ConnectionFactory>,
) -> LoadTestResult<RunReport> {
    let config = RunConfig::from_settings(settings)?;
    let report = Coordinator::new(config, factory).run_report().await;
    ResultsReport::log_summary(&report);
    Ok(report)
}
