//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Status updates received from upstream processes
//! - Protocol defects reported by those processes
//! - Stall detections made by the pipeline monitor

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

// =============================================================================
// Status Update Metrics
// =============================================================================

/// Status updates applied, by reporting process kind.
pub static STATUS_UPDATES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "plumbline_status_updates_total",
            "Total status updates applied to the aggregator",
        ),
        &["kind"], // "collector", "extraction_worker", "storage_writer"
    )
    .unwrap()
});

/// Worker updates whose cumulative event count went backwards.
pub static NEGATIVE_EVENT_DELTAS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "plumbline_negative_event_deltas_total",
        "Worker updates reporting fewer cumulative events than before",
    )
    .unwrap()
});

/// Collector updates whose cumulative work item count went backwards.
pub static COLLECTOR_COUNT_REGRESSIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "plumbline_collector_count_regressions_total",
        "Collector updates reporting fewer cumulative work items than before",
    )
    .unwrap()
});

// =============================================================================
// Monitor Metrics
// =============================================================================

/// Stall detections total.
pub static STALL_DETECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "plumbline_stall_detections_total",
        "Total pipeline stall detections",
    )
    .unwrap()
});

/// Phase transitions observed by the monitor, by target phase.
pub static PHASE_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "plumbline_phase_transitions_total",
            "Pipeline phase transitions observed by the monitor",
        ),
        &["phase"],
    )
    .unwrap()
});

// =============================================================================
// Helper Functions
// =============================================================================

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(STATUS_UPDATES.clone()),
        Box::new(NEGATIVE_EVENT_DELTAS.clone()),
        Box::new(COLLECTOR_COUNT_REGRESSIONS.clone()),
        Box::new(STALL_DETECTIONS.clone()),
        Box::new(PHASE_TRANSITIONS.clone()),
    ]
}
