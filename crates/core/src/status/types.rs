//! Status records kept by the aggregator and the updates that replace them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State reported by a collector or extraction worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Initialized,
    Running,
    Hashing,
    Parsing,
    Idle,
    Completed,
    Aborted,
    Error,
    Killed,
}

impl ProcessingState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Hashing => "hashing",
            Self::Parsing => "parsing",
            Self::Idle => "idle",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Error => "error",
            Self::Killed => "killed",
        }
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last reported state of the collector process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorStatus {
    pub identifier: String,
    pub pid: u32,
    /// Last time the collector reported while not completed.
    pub last_running_time: Option<DateTime<Utc>>,
    /// Cumulative number of work items produced.
    pub number_of_work_items: u64,
    pub status: ProcessingState,
}

/// Last reported state of one extraction worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWorkerStatus {
    pub identifier: String,
    pub pid: u32,
    /// Label of the item currently being processed.
    pub display_name: String,
    /// Cumulative number of events produced.
    pub number_of_events: u64,
    /// Change in `number_of_events` since the previous update.
    pub number_of_events_delta: i64,
    /// Cumulative number of work items consumed.
    pub number_of_work_items: u64,
    pub status: ProcessingState,
    /// Raw process status as reported by the OS.
    pub process_status: String,
    /// Last time this worker's event count increased.
    pub last_running_time: Option<DateTime<Utc>>,
}

/// Collector update as carried over the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorStatusUpdate {
    pub identifier: String,
    pub pid: u32,
    pub number_of_work_items: u64,
    pub status: ProcessingState,
}

/// Extraction worker update as carried over the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWorkerStatusUpdate {
    pub identifier: String,
    pub pid: u32,
    #[serde(default)]
    pub display_name: String,
    pub number_of_events: u64,
    pub number_of_work_items: u64,
    pub status: ProcessingState,
    #[serde(default)]
    pub process_status: String,
}

/// Storage writer update as carried over the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageWriterStatusUpdate {
    pub number_of_events: u64,
}

/// Position of a pipeline run as observed through the aggregator's queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Starting,
    CollectorRunning,
    ExtractionDraining,
    ExtractionCompleted,
    StorageDraining,
    ProcessingCompleted,
}

impl PipelinePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::CollectorRunning => "collector_running",
            Self::ExtractionDraining => "extraction_draining",
            Self::ExtractionCompleted => "extraction_completed",
            Self::StorageDraining => "storage_draining",
            Self::ProcessingCompleted => "processing_completed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::ProcessingCompleted
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub phase: PipelinePhase,
    /// No worker progress for at least the idle timeout.
    pub stalled: bool,
    pub collector: Option<CollectorStatus>,
    pub collector_completed: bool,
    /// Worker records ordered by identifier.
    pub extraction_workers: Vec<ExtractionWorkerStatus>,
    pub workers_running: bool,
    pub number_of_extracted_events: u64,
    pub number_of_extracted_work_items: u64,
    pub storage_writer_events: u64,
    pub last_running_time: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_processing_state_serialization() {
        let json = serde_json::to_string(&ProcessingState::Completed).unwrap();
        assert_eq!(json, "\"completed\"");

        let parsed: ProcessingState = serde_json::from_str("\"parsing\"").unwrap();
        assert_eq!(parsed, ProcessingState::Parsing);
        assert_eq!(parsed.to_string(), "parsing");
    }

    #[test]
    fn test_worker_update_optional_fields() {
        let update: ExtractionWorkerStatusUpdate = serde_json::from_value(json!({
            "identifier": "worker_0",
            "pid": 4242,
            "number_of_events": 5,
            "number_of_work_items": 2,
            "status": "running"
        }))
        .unwrap();

        assert_eq!(update.display_name, "");
        assert_eq!(update.process_status, "");
        assert_eq!(update.status, ProcessingState::Running);
    }

    #[test]
    fn test_collector_update_rejects_unknown_status() {
        let result: Result<CollectorStatusUpdate, _> = serde_json::from_value(json!({
            "identifier": "collector",
            "pid": 1,
            "number_of_work_items": 3,
            "status": "sleeping"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(PipelinePhase::StorageDraining.to_string(), "storage_draining");
        assert!(PipelinePhase::ProcessingCompleted.is_terminal());
        assert!(!PipelinePhase::ExtractionCompleted.is_terminal());
    }
}
