//! Reduction of per-worker results into a run summary.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Serializer};
use store_client::OperationKind;

use crate::worker::WorkerResult;

/// Serialize a `Duration` as fractional seconds.
pub(crate) fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Aggregate timing over the workers that completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub count: usize,
    #[serde(rename = "total_secs", serialize_with = "serialize_secs")]
    pub total: Duration,
    #[serde(rename = "avg_secs", serialize_with = "serialize_secs")]
    pub avg: Duration,
    #[serde(rename = "max_secs", serialize_with = "serialize_secs")]
    pub max: Duration,
    #[serde(rename = "min_secs", serialize_with = "serialize_secs")]
    pub min: Duration,
    pub ticks: u64,
    pub overruns: u64,
    pub operations: BTreeMap<OperationKind, u64>,
}

impl RunSummary {
    /// Summarize `results`. Returns `None` when no worker completed.
    pub fn from_results(results: &[WorkerResult]) -> Option<Self> {
        let max = results.iter().map(|r| r.elapsed).max()?;
        let min = results.iter().map(|r| r.elapsed).min()?;
        let total: Duration = results.iter().map(|r| r.elapsed).sum();
        let count = results.len();

        let mut operations = BTreeMap::new();
        for result in results {
            for (kind, n) in &result.operations {
                *operations.entry(*kind).or_insert(0) += n;
            }
        }

        Some(Self {
            count,
            total,
            avg: total / count as u32,
            max,
            min,
            ticks: results.iter().map(|r| r.ticks).sum(),
            overruns: results.iter().map(|r| r.overruns).sum(),
            operations,
        })
    }

    pub fn total_operations(&self) -> u64 {
        self.operations.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(worker_id: usize, secs: u64, queries: u64) -> WorkerResult {
        WorkerResult {
            worker_id,
            elapsed: Duration::from_secs(secs),
            ticks: secs,
            overruns: worker_id as u64,
            operations: BTreeMap::from([
                (OperationKind::Query, queries),
                (OperationKind::Update, 1),
            ]),
        }
    }

    #[test]
    fn test_summary_of_three_workers() {
        let summary =
            RunSummary::from_results(&[result(0, 2, 4), result(1, 4, 8), result(2, 6, 12)])
                .unwrap();

        assert_eq!(summary.count, 3);
        assert_eq!(summary.total, Duration::from_secs(12));
        assert_eq!(summary.avg, Duration::from_secs(4));
        assert_eq!(summary.max, Duration::from_secs(6));
        assert_eq!(summary.min, Duration::from_secs(2));
        assert_eq!(summary.ticks, 12);
        assert_eq!(summary.overruns, 3);
        assert_eq!(summary.operations[&OperationKind::Query], 24);
        assert_eq!(summary.operations[&OperationKind::Update], 3);
        assert_eq!(summary.total_operations(), 27);
    }

    #[test]
    fn test_single_worker_min_equals_max() {
        let summary = RunSummary::from_results(&[result(0, 5, 1)]).unwrap();
        assert_eq!(summary.min, summary.max);
        assert_eq!(summary.avg, Duration::from_secs(5));
    }

    #[test]
    fn test_no_results_yields_none() {
        assert_eq!(RunSummary::from_results(&[]), None);
    }

    #[test]
    fn test_serializes_seconds() {
        let summary = RunSummary::from_results(&[result(0, 2, 0)]).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["total_secs"], 2.0);
        assert_eq!(json["operations"]["query"], 0);
    }
}
