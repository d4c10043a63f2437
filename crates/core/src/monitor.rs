//! Coordinator polling loop.
//!
//! Polls the aggregator on a fixed interval and decides whether the run has
//! finished, has stalled, or should keep going:
//! - **Completed**: processing completed, the pipeline can shut down cleanly
//! - **Stalled**: no worker progress for the idle timeout
//! - **Shutdown**: the coordinator was asked to stop

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::metrics::{PHASE_TRANSITIONS, STALL_DETECTIONS};
use crate::status::{PipelinePhase, StatusHandle, StatusReport};

/// Why the monitor stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Every work item was extracted and every event stored.
    Completed(StatusReport),
    /// No progress was observed for the idle timeout.
    Stalled(StatusReport),
    /// A shutdown signal arrived first.
    Shutdown,
}

/// Watches one pipeline run through its [`StatusHandle`].
pub struct PipelineMonitor {
    status: StatusHandle,
    config: MonitorConfig,
    last_phase: Option<PipelinePhase>,
    stall_reported: bool,
    stalls_detected: u64,
}

impl PipelineMonitor {
    pub fn new(status: StatusHandle, config: MonitorConfig) -> Self {
        Self {
            status,
            config,
            last_phase: None,
            stall_reported: false,
            stalls_detected: 0,
        }
    }

    /// Number of stall episodes seen so far. A stall that persists across
    /// polls counts once; progress ends the episode.
    pub fn stalls_detected(&self) -> u64 {
        self.stalls_detected
    }

    /// Runs until the pipeline completes, stalls (when configured to abort)
    /// or `shutdown` fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> MonitorOutcome {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            "Pipeline monitor started (poll interval {} ms)",
            self.config.poll_interval_ms
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Pipeline monitor received shutdown signal");
                    return MonitorOutcome::Shutdown;
                }
                _ = interval.tick() => {
                    if let Some(outcome) = self.poll_once().await {
                        return outcome;
                    }
                }
            }
        }
    }

    /// Evaluates the aggregator once.
    ///
    /// Returns an outcome when the run is over, `None` to keep polling.
    pub async fn poll_once(&mut self) -> Option<MonitorOutcome> {
        let report = self.status.report().await;

        if self.last_phase != Some(report.phase) {
            info!(
                "Pipeline phase: {} (events extracted: {}, stored: {}, work items: {})",
                report.phase,
                report.number_of_extracted_events,
                report.storage_writer_events,
                report.number_of_extracted_work_items
            );
            PHASE_TRANSITIONS
                .with_label_values(&[report.phase.as_str()])
                .inc();
            self.last_phase = Some(report.phase);
        }

        if report.phase.is_terminal() {
            info!(
                "Processing completed: {} events stored",
                report.storage_writer_events
            );
            return Some(MonitorOutcome::Completed(report));
        }

        if !report.stalled {
            self.stall_reported = false;
            debug!(
                "Pipeline in phase {}, workers running: {}",
                report.phase, report.workers_running
            );
            return None;
        }

        if !self.stall_reported {
            STALL_DETECTIONS.inc();
            self.stalls_detected += 1;
            self.stall_reported = true;
        }

        if self.config.abort_on_stall {
            error!(
                "Pipeline stalled in phase {}: no worker progress since {:?}",
                report.phase, report.last_running_time
            );
            return Some(MonitorOutcome::Stalled(report));
        }

        warn!(
            "Pipeline stalled in phase {}: no worker progress since {:?}, continuing",
            report.phase, report.last_running_time
        );
        None
    }
}
