use std::time::Duration;

use crate::domain::IngestSummary;
use crate::error::Stage;

/// Naming convention: csv_ingest_{name}_total for counters
macro_rules! ingest_metric {
    (counter, $name:literal) => {
        concat!("csv_ingest_", $name, "_total")
    };
    (histogram, $name:literal) => {
        concat!("csv_ingest_", $name)
    };
}

pub const FILES_PROCESSED: &str = ingest_metric!(counter, "files_processed");
pub const FILES_SKIPPED: &str = ingest_metric!(counter, "files_skipped");
pub const ROWS_VALID: &str = ingest_metric!(counter, "rows_valid");
pub const ROWS_INVALID: &str = ingest_metric!(counter, "rows_invalid");
pub const STAGE_FAILURES: &str = ingest_metric!(counter, "stage_failures");
pub const PROCESSING_DURATION: &str = ingest_metric!(histogram, "processing_duration_seconds");

/// Metrics recorded by the orchestrator
pub struct IngestMetrics;

impl IngestMetrics {
    pub(crate) fn describe() {
        ::metrics::describe_counter!(FILES_PROCESSED, "Uploads fully processed");
        ::metrics::describe_counter!(FILES_SKIPPED, "Uploads skipped because their content was already processed");
        ::metrics::describe_counter!(ROWS_VALID, "Rows written to the processed partition");
        ::metrics::describe_counter!(ROWS_INVALID, "Rows written to the errors partition");
        ::metrics::describe_counter!(STAGE_FAILURES, "Runs aborted, labelled by failing stage");
        ::metrics::describe_histogram!(PROCESSING_DURATION, "Wall time of one ingestion run");
    }

    /// Record a finished run, processed or skipped.
    pub fn record_summary(summary: &IngestSummary, elapsed: Duration) {
        if summary.skipped {
            ::metrics::counter!(FILES_SKIPPED).increment(1);
        } else {
            ::metrics::counter!(FILES_PROCESSED).increment(1);
            ::metrics::counter!(ROWS_VALID).increment(summary.valid_count as u64);
            ::metrics::counter!(ROWS_INVALID).increment(summary.invalid_count as u64);
        }
        ::metrics::histogram!(PROCESSING_DURATION).record(elapsed.as_secs_f64());
    }

    pub fn record_stage_failure(stage: Stage, elapsed: Duration) {
        ::metrics::counter!(STAGE_FAILURES, "stage" => stage.as_str()).increment(1);
        ::metrics::histogram!(PROCESSING_DURATION).record(elapsed.as_secs_f64());
    }
}
