//! Results reporting and formatting.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use serde::Serialize;
use tracing::{error, info};

use crate::aggregate::RunSummary;
use crate::worker::WorkerResult;

/// Everything known about a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub workers: usize,
    pub duration_secs: u64,
    pub failed: usize,
    pub summary: Option<RunSummary>,
    pub results: Vec<WorkerResult>,
}

impl RunReport {
    pub fn new(workers: usize, duration_secs: u64, results: Vec<WorkerResult>, failed: usize) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            workers,
            duration_secs,
            failed,
            summary: RunSummary::from_results(&results),
            results,
        }
    }

    /// True when at least one worker completed.
    pub fn has_results(&self) -> bool {
        self.summary.is_some()
    }
}

/// Formats run reports for output.
pub struct ResultsReport;

impl ResultsReport {
    /// The one-line summary written to the log at the end of every run.
    pub fn summary_line(report: &RunReport) -> String {
        match &report.summary {
            Some(s) => format!(
                "{} workers running for a total time of {:.3}s max = {:.3}s avg = {:.3}s min = {:.3}s",
                s.count,
                s.total.as_secs_f64(),
                s.max.as_secs_f64(),
                s.avg.as_secs_f64(),
                s.min.as_secs_f64(),
            ),
            None => format!("0 of {} workers completed", report.workers),
        }
    }

    /// Write the summary to the log.
    pub fn log_summary(report: &RunReport) {
        let line = Self::summary_line(report);
        match &report.summary {
            Some(s) => info!(
                workers = s.count,
                failed = report.failed,
                operations = s.total_operations(),
                overruns = s.overruns,
                "{}",
                line
            ),
            None => error!(failed = report.failed, "{}", line),
        }
    }

    /// Format results as a console table.
    pub fn format_table(report: &RunReport) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec!["Load Test Results".to_string(), report.timestamp.clone()]);

        table.add_row(vec!["Duration:".to_string(), format!("{}s", report.duration_secs)]);
        table.add_row(vec![
            "Workers:".to_string(),
            format!(
                "{} completed / {} failed",
                report.workers - report.failed,
                report.failed
            ),
        ]);

        let Some(s) = &report.summary else {
            return table.to_string();
        };

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Elapsed (s)", "total / avg / min / max"]);
        table.add_row(vec![
            String::new(),
            format!(
                "{:.3} / {:.3} / {:.3} / {:.3}",
                s.total.as_secs_f64(),
                s.avg.as_secs_f64(),
                s.min.as_secs_f64(),
                s.max.as_secs_f64()
            ),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Ticks:".to_string(), format!("{}", s.ticks)]);
        table.add_row(vec!["Overruns:".to_string(), format!("{}", s.overruns)]);
        for (kind, count) in &s.operations {
            table.add_row(vec![format!("{}:", kind), format!("{}", count)]);
        }

        table.to_string()
    }

    /// Format results as JSON.
    pub fn format_json(report: &RunReport) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use store_client::OperationKind;

    fn result(worker_id: usize, secs: u64) -> WorkerResult {
        WorkerResult {
            worker_id,
            elapsed: Duration::from_secs(secs),
            ticks: secs,
            overruns: 0,
            operations: BTreeMap::from([(OperationKind::Query, secs * 3)]),
        }
    }

    #[test]
    fn test_summary_line() {
        let report = RunReport::new(3, 4, vec![result(0, 2), result(1, 4), result(2, 6)], 0);
        assert_eq!(
            ResultsReport::summary_line(&report),
            "3 workers running for a total time of 12.000s max = 6.000s avg = 4.000s min = 2.000s"
        );
    }

    #[test]
    fn test_summary_line_without_results() {
        let report = RunReport::new(2, 4, Vec::new(), 2);
        assert!(!report.has_results());
        assert_eq!(ResultsReport::summary_line(&report), "0 of 2 workers completed");
        // the table still renders the header rows
        assert!(ResultsReport::format_table(&report).contains("0 completed / 2 failed"));
    }

    #[test]
    fn test_table_lists_operation_counts() {
        let report = RunReport::new(1, 2, vec![result(0, 2)], 0);
        let table = ResultsReport::format_table(&report);
        assert!(table.contains("query:"));
        assert!(table.contains("2.000 / 2.000 / 2.000 / 2.000"));
    }

    #[test]
    fn test_json_contains_summary_and_workers() {
        let report = RunReport::new(2, 2, vec![result(0, 2)], 1);
        let json: serde_json::Value =
            serde_json::from_str(&ResultsReport::format_json(&report).unwrap()).unwrap();
        assert_eq!(json["failed"], 1);
        assert_eq!(json["summary"]["count"], 1);
        assert_eq!(json["results"][0]["elapsed_secs"], 2.0);
    }
}
