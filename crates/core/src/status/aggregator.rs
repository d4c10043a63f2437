//! The processing status aggregator.
//!
//! Owns the last reported snapshot of every upstream process and answers the
//! two questions the coordinator polls for: has the pipeline finished, and
//! has it stalled.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::StatusConfig;
use crate::metrics::{COLLECTOR_COUNT_REGRESSIONS, NEGATIVE_EVENT_DELTAS, STATUS_UPDATES};

use super::clock::{Clock, SystemClock};
use super::types::{
    CollectorStatus, CollectorStatusUpdate, ExtractionWorkerStatus, ExtractionWorkerStatusUpdate,
    PipelinePhase, ProcessingState, StatusReport,
};

/// Default time without worker progress before the pipeline counts as stalled.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Aggregated status of one pipeline run.
///
/// Created once per run and dropped with it. Updates never fail: an unknown
/// identifier is a first sighting, and protocol defects (counts going
/// backwards) are stored as reported, logged and counted.
pub struct ProcessingStatus {
    collector: Option<CollectorStatus>,
    collector_completed: bool,
    extraction_workers: HashMap<String, ExtractionWorkerStatus>,
    last_running_time: Option<DateTime<Utc>>,
    storage_writer_events: u64,
    idle_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl Default for ProcessingStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStatus {
    /// Create an empty aggregator using the system clock.
    pub fn new() -> Self {
        Self {
            collector: None,
            collector_completed: false,
            extraction_workers: HashMap::new(),
            last_running_time: None,
            storage_writer_events: 0,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create an aggregator configured from the `[status]` section.
    pub fn from_config(config: &StatusConfig) -> Self {
        Self::new().with_idle_timeout(config.idle_timeout())
    }

    /// Sets the idle timeout.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Sets the clock used for progress timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn collector(&self) -> Option<&CollectorStatus> {
        self.collector.as_ref()
    }

    pub fn collector_completed(&self) -> bool {
        self.collector_completed
    }

    pub fn storage_writer_events(&self) -> u64 {
        self.storage_writer_events
    }

    /// Last time any worker showed forward progress.
    pub fn last_running_time(&self) -> Option<DateTime<Utc>> {
        self.last_running_time
    }

    pub fn extraction_worker(&self, identifier: &str) -> Option<&ExtractionWorkerStatus> {
        self.extraction_workers.get(identifier)
    }

    /// Worker records sorted by identifier.
    pub fn extraction_workers(&self) -> Vec<&ExtractionWorkerStatus> {
        let mut identifiers: Vec<&String> = self.extraction_workers.keys().collect();
        identifiers.sort();
        identifiers
            .into_iter()
            .filter_map(|identifier| self.extraction_workers.get(identifier))
            .collect()
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Replaces the collector snapshot.
    ///
    /// A `Completed` report latches collector completion for the rest of the
    /// run; any other report refreshes the collector's last running time.
    pub fn update_collector_status(&mut self, update: CollectorStatusUpdate) {
        STATUS_UPDATES.with_label_values(&["collector"]).inc();

        if let Some(previous) = &self.collector {
            if previous.identifier == update.identifier
                && update.number_of_work_items < previous.number_of_work_items
            {
                COLLECTOR_COUNT_REGRESSIONS.inc();
                warn!(
                    "Collector {} reported {} work items after previously reporting {}",
                    update.identifier, update.number_of_work_items, previous.number_of_work_items
                );
            }
        }

        let last_running_time = self
            .collector
            .as_ref()
            .and_then(|collector| collector.last_running_time);

        let mut collector = CollectorStatus {
            identifier: update.identifier,
            pid: update.pid,
            last_running_time,
            number_of_work_items: update.number_of_work_items,
            status: update.status,
        };

        if update.status == ProcessingState::Completed {
            if !self.collector_completed {
                debug!(
                    "Collector {} completed with {} work items",
                    collector.identifier, collector.number_of_work_items
                );
            }
            self.collector_completed = true;
        } else {
            collector.last_running_time = Some(self.clock.now());
        }

        self.collector = Some(collector);
    }

    /// Replaces the snapshot of one extraction worker, creating it on first sight.
    ///
    /// A positive event delta stamps both the worker's and the global last
    /// running time; it is the only progress signal the idle check uses.
    pub fn update_extraction_worker_status(&mut self, update: ExtractionWorkerStatusUpdate) {
        STATUS_UPDATES
            .with_label_values(&["extraction_worker"])
            .inc();

        let (previous_events, previous_running_time) = self
            .extraction_workers
            .get(&update.identifier)
            .map(|worker| (worker.number_of_events, worker.last_running_time))
            .unwrap_or((0, None));

        let delta = event_delta(update.number_of_events, previous_events);
        if delta < 0 {
            NEGATIVE_EVENT_DELTAS.inc();
            warn!(
                "Extraction worker {} (pid {}) reported {} events after previously reporting {}",
                update.identifier, update.pid, update.number_of_events, previous_events
            );
        }

        let mut last_running_time = previous_running_time;
        if delta > 0 {
            let now = self.clock.now();
            last_running_time = Some(now);
            self.last_running_time = Some(now);
        }

        debug!(
            "Extraction worker {} at {} events (delta {}), {} work items, status {}",
            update.identifier,
            update.number_of_events,
            delta,
            update.number_of_work_items,
            update.status
        );

        let worker = ExtractionWorkerStatus {
            identifier: update.identifier.clone(),
            pid: update.pid,
            display_name: update.display_name,
            number_of_events: update.number_of_events,
            number_of_events_delta: delta,
            number_of_work_items: update.number_of_work_items,
            status: update.status,
            process_status: update.process_status,
            last_running_time,
        };
        self.extraction_workers.insert(update.identifier, worker);
    }

    /// Records the cumulative number of events acknowledged by the storage writer.
    pub fn update_storage_writer_status(&mut self, number_of_events: u64) {
        STATUS_UPDATES.with_label_values(&["storage_writer"]).inc();
        self.storage_writer_events = number_of_events;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Total events produced by all workers.
    pub fn number_of_extracted_events(&self) -> u64 {
        self.extraction_workers
            .values()
            .map(|worker| worker.number_of_events)
            .sum()
    }

    /// Total work items consumed by all workers.
    pub fn number_of_extracted_work_items(&self) -> u64 {
        self.extraction_workers
            .values()
            .map(|worker| worker.number_of_work_items)
            .sum()
    }

    /// Whether the collector finished, every work item it produced was
    /// consumed, and no worker showed progress in its last update.
    ///
    /// Work items generated by the workers themselves (nested containers) are
    /// not counted, so a worker that produces more work after the counts
    /// line up can make this report completion too early.
    pub fn extraction_completed(&self) -> bool {
        let Some(collector) = &self.collector else {
            return false;
        };

        self.collector_completed
            && collector.number_of_work_items == self.number_of_extracted_work_items()
            && !self.workers_running()
    }

    /// Whether extraction completed and the storage writer acknowledged
    /// every extracted event.
    pub fn processing_completed(&self) -> bool {
        self.extraction_completed()
            && self.storage_writer_events == self.number_of_extracted_events()
    }

    /// Whether any worker's most recent update showed a positive event delta.
    ///
    /// This reflects the last observed interval per worker, not live activity.
    pub fn workers_running(&self) -> bool {
        self.extraction_workers
            .values()
            .any(|worker| worker.number_of_events_delta > 0)
    }

    /// Whether no worker progress was seen for at least the idle timeout.
    ///
    /// False until some progress has been recorded at all.
    pub fn workers_idle(&self) -> bool {
        let Some(last_running_time) = self.last_running_time else {
            return false;
        };

        let now = self.clock.now();
        if last_running_time >= now {
            return false;
        }

        match chrono::Duration::from_std(self.idle_timeout) {
            Ok(idle_timeout) => now - last_running_time >= idle_timeout,
            Err(_) => false,
        }
    }

    /// Current position of the run in the observed state machine.
    pub fn phase(&self) -> PipelinePhase {
        if self.processing_completed() {
            PipelinePhase::ProcessingCompleted
        } else if self.extraction_completed() {
            if self.storage_writer_events == 0 {
                PipelinePhase::ExtractionCompleted
            } else {
                PipelinePhase::StorageDraining
            }
        } else if self.collector_completed {
            PipelinePhase::ExtractionDraining
        } else if self.collector.is_none() && self.extraction_workers.is_empty() {
            PipelinePhase::Starting
        } else {
            PipelinePhase::CollectorRunning
        }
    }

    /// Snapshot of everything the aggregator knows.
    pub fn report(&self) -> StatusReport {
        StatusReport {
            phase: self.phase(),
            stalled: self.workers_idle(),
            collector: self.collector.clone(),
            collector_completed: self.collector_completed,
            extraction_workers: self.extraction_workers().into_iter().cloned().collect(),
            workers_running: self.workers_running(),
            number_of_extracted_events: self.number_of_extracted_events(),
            number_of_extracted_work_items: self.number_of_extracted_work_items(),
            storage_writer_events: self.storage_writer_events,
            last_running_time: self.last_running_time,
            generated_at: self.clock.now(),
        }
    }
}

impl std::fmt::Debug for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingStatus")
            .field("collector", &self.collector)
            .field("collector_completed", &self.collector_completed)
            .field("extraction_workers", &self.extraction_workers.len())
            .field("last_running_time", &self.last_running_time)
            .field("storage_writer_events", &self.storage_writer_events)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

/// Signed difference between two cumulative counts.
fn event_delta(current: u64, previous: u64) -> i64 {
    if current >= previous {
        i64::try_from(current - previous).unwrap_or(i64::MAX)
    } else {
        i64::try_from(previous - current)
            .map(|d| -d)
            .unwrap_or(i64::MIN)
    }
}
