use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};

use super::aggregator::ProcessingStatus;
use super::types::{
    CollectorStatusUpdate, ExtractionWorkerStatusUpdate, PipelinePhase, StatusReport,
};

/// Shared access to the aggregator of one pipeline run.
///
/// This is cheaply cloneable and can be handed to every proxy handler and to
/// the monitor. Updates take the write lock, queries share the read lock, and
/// no lock is held across an await point.
#[derive(Clone)]
pub struct StatusHandle {
    inner: Arc<RwLock<ProcessingStatus>>,
}

impl StatusHandle {
    pub fn new(status: ProcessingStatus) -> Self {
        Self {
            inner: Arc::new(RwLock::new(status)),
        }
    }

    pub async fn update_collector_status(&self, update: CollectorStatusUpdate) {
        self.inner.write().await.update_collector_status(update);
    }

    pub async fn update_extraction_worker_status(&self, update: ExtractionWorkerStatusUpdate) {
        self.inner
            .write()
            .await
            .update_extraction_worker_status(update);
    }

    pub async fn update_storage_writer_status(&self, number_of_events: u64) {
        self.inner
            .write()
            .await
            .update_storage_writer_status(number_of_events);
    }

    pub async fn number_of_extracted_events(&self) -> u64 {
        self.inner.read().await.number_of_extracted_events()
    }

    pub async fn number_of_extracted_work_items(&self) -> u64 {
        self.inner.read().await.number_of_extracted_work_items()
    }

    pub async fn extraction_completed(&self) -> bool {
        self.inner.read().await.extraction_completed()
    }

    pub async fn processing_completed(&self) -> bool {
        self.inner.read().await.processing_completed()
    }

    pub async fn workers_running(&self) -> bool {
        self.inner.read().await.workers_running()
    }

    pub async fn workers_idle(&self) -> bool {
        self.inner.read().await.workers_idle()
    }

    pub async fn phase(&self) -> PipelinePhase {
        self.inner.read().await.phase()
    }

    pub async fn report(&self) -> StatusReport {
        self.inner.read().await.report()
    }

    /// Read access for queries not mirrored on the handle.
    pub async fn read(&self) -> RwLockReadGuard<'_, ProcessingStatus> {
        self.inner.read().await
    }
}

impl Default for StatusHandle {
    fn default() -> Self {
        Self::new(ProcessingStatus::new())
    }
}
