//! Metrics for the ingestion pipeline
//!
//! Call sites go through [`IngestMetrics`], which owns the metric names.
//! Without an installed recorder the `metrics` macros are no-ops, so the
//! library records unconditionally and the binary decides whether to install
//! the Prometheus recorder.

pub mod ingest;

pub use ingest::IngestMetrics;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Once, OnceLock};
use tracing::{debug, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install an in-process Prometheus recorder. Idempotent.
///
/// No HTTP listener is started; the snapshot is read back with [`render`].
pub fn init_metrics() {
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            IngestMetrics::describe();
            debug!("prometheus recorder installed");
        }
        Err(e) => warn!("failed to install prometheus recorder: {}", e),
    });
}

/// Prometheus text exposition of everything recorded so far.
pub fn render() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}
