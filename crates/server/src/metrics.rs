//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the coordinator:
//! - HTTP request metrics (latency, counts) for RPC and API routes
//! - Pipeline progress gauges (collected dynamically from the aggregator)
//! - Core metrics registered from `plumbline_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use tracing::warn;

use plumbline_core::status::{PipelinePhase, STATUS_FUNCTIONS};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "plumbline_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("plumbline_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "plumbline_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics (collected dynamically)
// =============================================================================

/// Current pipeline phase (1 for the current phase, 0 otherwise).
pub static PIPELINE_PHASE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("plumbline_pipeline_phase", "Current pipeline phase"),
        &["phase"],
    )
    .unwrap()
});

/// Whether the pipeline is stalled (1) or not (0).
pub static PIPELINE_STALLED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "plumbline_pipeline_stalled",
        "Whether no worker progress was seen for the idle timeout",
    )
    .unwrap()
});

/// Extraction workers known to the aggregator.
pub static EXTRACTION_WORKERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "plumbline_extraction_workers",
        "Number of extraction workers that reported status",
    )
    .unwrap()
});

/// Events produced by all extraction workers.
pub static EXTRACTED_EVENTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "plumbline_extracted_events",
        "Events produced by all extraction workers",
    )
    .unwrap()
});

/// Work items consumed by all extraction workers.
pub static EXTRACTED_WORK_ITEMS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "plumbline_extracted_work_items",
        "Work items consumed by all extraction workers",
    )
    .unwrap()
});

/// Events acknowledged by the storage writer.
pub static STORED_EVENTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "plumbline_stored_events",
        "Events acknowledged by the storage writer",
    )
    .unwrap()
});

const PHASES: [PipelinePhase; 6] = [
    PipelinePhase::Starting,
    PipelinePhase::CollectorRunning,
    PipelinePhase::ExtractionDraining,
    PipelinePhase::ExtractionCompleted,
    PipelinePhase::StorageDraining,
    PipelinePhase::ProcessingCompleted,
];

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Pipeline
    registry.register(Box::new(PIPELINE_PHASE.clone())).unwrap();
    registry
        .register(Box::new(PIPELINE_STALLED.clone()))
        .unwrap();
    registry
        .register(Box::new(EXTRACTION_WORKERS.clone()))
        .unwrap();
    registry
        .register(Box::new(EXTRACTED_EVENTS.clone()))
        .unwrap();
    registry
        .register(Box::new(EXTRACTED_WORK_ITEMS.clone()))
        .unwrap();
    registry.register(Box::new(STORED_EVENTS.clone())).unwrap();

    // Core metrics (status updates, protocol defects, monitor)
    for metric in plumbline_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from the aggregator.
///
/// Called before encoding so the gauges reflect the current status report.
pub async fn collect_dynamic_metrics(state: &AppState) {
    let report = state.status().report().await;

    for phase in PHASES {
        PIPELINE_PHASE
            .with_label_values(&[phase.as_str()])
            .set(i64::from(phase == report.phase));
    }
    PIPELINE_STALLED.set(i64::from(report.stalled));
    EXTRACTION_WORKERS.set(gauge_value(report.extraction_workers.len() as u64));
    EXTRACTED_EVENTS.set(gauge_value(report.number_of_extracted_events));
    EXTRACTED_WORK_ITEMS.set(gauge_value(report.number_of_extracted_work_items));
    STORED_EVENTS.set(gauge_value(report.storage_writer_events));
}

/// Reported counts are unbounded `u64`; gauges saturate instead of wrapping.
fn gauge_value(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Normalize a path for metric labels.
///
/// RPC paths keep the function name only for the known status functions so
/// arbitrary names sent by clients cannot grow the label set.
pub fn normalize_path(path: &str) -> String {
    match path.strip_prefix("/rpc/") {
        Some(name) if STATUS_FUNCTIONS.contains(&name) => path.to_string(),
        Some(_) => "/rpc/{name}".to_string(),
        None => path.to_string(),
    }
}
