//! Metrics for the ETL stages.
//!
//! Recording functions are grouped by stage. When no recorder is installed the
//! `metrics` macros are no-ops, so the stages can be run from tests without
//! any setup.

use std::fmt;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Every metric name emitted by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Ingest
    IngestRowsRead,
    IngestColumnsRead,
    IngestSchemaFailures,
    CoercionNulls,
    CoercionFailures,

    // Clean
    CleanRowsIn,
    CleanRowsOut,
    CleanDuplicatesRemoved,
    CleanNullsFilled,
    CleanZeroMargins,

    // Aggregate
    AggregateRowsOut,
    AggregateRowsDropped,
    AggregateFailures,

    // Stage and scheduler
    StageDuration,
    StageSuccess,
    StageError,
    TaskRetries,
    TaskTerminalFailures,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::IngestRowsRead => "etl_ingest_rows_read_total",
            MetricName::IngestColumnsRead => "etl_ingest_columns_read",
            MetricName::IngestSchemaFailures => "etl_ingest_schema_failures_total",
            MetricName::CoercionNulls => "etl_coercion_nulls",
            MetricName::CoercionFailures => "etl_coercion_failures_total",

            MetricName::CleanRowsIn => "etl_clean_rows_in_total",
            MetricName::CleanRowsOut => "etl_clean_rows_out_total",
            MetricName::CleanDuplicatesRemoved => "etl_clean_duplicates_removed_total",
            MetricName::CleanNullsFilled => "etl_clean_nulls_filled_total",
            MetricName::CleanZeroMargins => "etl_clean_zero_margins_total",

            MetricName::AggregateRowsOut => "etl_aggregate_rows_out",
            MetricName::AggregateRowsDropped => "etl_aggregate_rows_dropped_total",
            MetricName::AggregateFailures => "etl_aggregate_failures_total",

            MetricName::StageDuration => "etl_stage_duration_seconds",
            MetricName::StageSuccess => "etl_stage_success_total",
            MetricName::StageError => "etl_stage_error_total",
            MetricName::TaskRetries => "etl_task_retries_total",
            MetricName::TaskTerminalFailures => "etl_task_terminal_failures_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static HANDLE: OnceLock<Option<metrics_exporter_prometheus::PrometheusHandle>> = OnceLock::new();

/// Install the Prometheus recorder.
///
/// Idempotent. When `ETL_METRICS_ADDR` is set an HTTP exporter is started on
/// that address (requires a running tokio runtime); otherwise the recorder is
/// installed in-process and [`render`] can be used to dump a snapshot at the
/// end of a run.
pub fn init_metrics() {
    HANDLE.get_or_init(|| {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

        if let Ok(addr_str) = std::env::var("ETL_METRICS_ADDR") {
            match addr_str.parse::<SocketAddr>() {
                Ok(addr) => match builder.with_http_listener(addr).install() {
                    Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
                    Err(e) => warn!("Prometheus exporter install failed: {}", e),
                },
                Err(_) => warn!("Invalid ETL_METRICS_ADDR '{}', exporter disabled", addr_str),
            }
            return None;
        }

        match builder.install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Prometheus recorder install failed (possibly already installed): {}", e);
                None
            }
        }
    });
}

/// Render the in-process metrics snapshot, if a local recorder is installed.
pub fn render() -> Option<String> {
    HANDLE.get().and_then(|h| h.as_ref()).map(|h| h.render())
}

pub mod ingest {
    use super::MetricName;

    pub fn rows_read(rows: usize, columns: usize) {
        ::metrics::counter!(MetricName::IngestRowsRead.as_str()).increment(rows as u64);
        ::metrics::gauge!(MetricName::IngestColumnsRead.as_str()).set(columns as f64);
    }

    pub fn schema_failure(missing: usize) {
        ::metrics::counter!(MetricName::IngestSchemaFailures.as_str()).increment(1);
        ::metrics::gauge!("etl_ingest_missing_columns").set(missing as f64);
    }

    /// Nulls present in a designated column after coercion
    pub fn coercion_nulls(column: &str, nulls: usize) {
        ::metrics::gauge!(MetricName::CoercionNulls.as_str(), "column" => column.to_string())
            .set(nulls as f64);
    }

    pub fn coercion_failures(column: &str, failures: usize) {
        ::metrics::counter!(MetricName::CoercionFailures.as_str(), "column" => column.to_string())
            .increment(failures as u64);
    }
}

pub mod clean {
    use super::MetricName;

    pub fn rows(rows_in: usize, rows_out: usize) {
        ::metrics::counter!(MetricName::CleanRowsIn.as_str()).increment(rows_in as u64);
        ::metrics::counter!(MetricName::CleanRowsOut.as_str()).increment(rows_out as u64);
    }

    pub fn duplicates_removed(count: usize) {
        ::metrics::counter!(MetricName::CleanDuplicatesRemoved.as_str()).increment(count as u64);
    }

    pub fn nulls_filled(column: &str, count: usize) {
        ::metrics::counter!(MetricName::CleanNullsFilled.as_str(), "column" => column.to_string())
            .increment(count as u64);
    }

    pub fn zero_margins(count: usize) {
        ::metrics::counter!(MetricName::CleanZeroMargins.as_str()).increment(count as u64);
    }
}

pub mod aggregate {
    use super::MetricName;

    pub fn summary_built(summary: &'static str, rows_out: usize, rows_dropped: usize) {
        ::metrics::gauge!(MetricName::AggregateRowsOut.as_str(), "summary" => summary)
            .set(rows_out as f64);
        ::metrics::counter!(MetricName::AggregateRowsDropped.as_str(), "summary" => summary)
            .increment(rows_dropped as u64);
    }

    pub fn summary_failed(summary: &str) {
        ::metrics::counter!(MetricName::AggregateFailures.as_str(), "summary" => summary.to_string())
            .increment(1);
    }
}

pub mod stage {
    use super::MetricName;

    pub fn completed(stage: &'static str, secs: f64) {
        ::metrics::counter!(MetricName::StageSuccess.as_str(), "stage" => stage).increment(1);
        ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage).record(secs);
    }

    pub fn failed(stage: &'static str, secs: f64) {
        ::metrics::counter!(MetricName::StageError.as_str(), "stage" => stage).increment(1);
        ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage).record(secs);
    }
}

pub mod scheduler {
    use super::MetricName;

    pub fn task_retry(task: &str) {
        ::metrics::counter!(MetricName::TaskRetries.as_str(), "task" => task.to_string()).increment(1);
    }

    pub fn task_terminal_failure(task: &str) {
        ::metrics::counter!(MetricName::TaskTerminalFailures.as_str(), "task" => task.to_string())
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_prefixed() {
        let names = [
            MetricName::IngestRowsRead,
            MetricName::CleanDuplicatesRemoved,
            MetricName::AggregateRowsDropped,
            MetricName::TaskTerminalFailures,
        ];
        for name in names {
            assert!(name.as_str().starts_with("etl_"));
            assert_eq!(name.to_string(), name.as_str());
        }
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        ingest::rows_read(10, 20);
        clean::duplicates_removed(3);
        aggregate::summary_built("regional_performance", 4, 0);
        scheduler::task_retry("silver_transformation");
    }
}
