//! Client-side helper used by collector, worker and storage-writer processes.

use serde_json::Value;
use std::sync::Arc;

use crate::proxy::{ProxyClient, ProxyError};

use super::functions::{
    GET_PROCESSING_COMPLETED, GET_PROCESSING_STATUS, UPDATE_COLLECTOR_STATUS,
    UPDATE_EXTRACTION_WORKER_STATUS, UPDATE_STORAGE_WRITER_STATUS,
};
use super::types::{
    CollectorStatusUpdate, ExtractionWorkerStatusUpdate, StatusReport, StorageWriterStatusUpdate,
};

/// Pushes status updates to the coordinator through a proxy client.
#[derive(Clone)]
pub struct StatusReporter {
    client: Arc<dyn ProxyClient>,
}

impl StatusReporter {
    pub fn new(client: Arc<dyn ProxyClient>) -> Self {
        Self { client }
    }

    pub async fn report_collector(&self, update: &CollectorStatusUpdate) -> Result<(), ProxyError> {
        self.push(UPDATE_COLLECTOR_STATUS, update).await
    }

    pub async fn report_extraction_worker(
        &self,
        update: &ExtractionWorkerStatusUpdate,
    ) -> Result<(), ProxyError> {
        self.push(UPDATE_EXTRACTION_WORKER_STATUS, update).await
    }

    pub async fn report_storage_writer(&self, number_of_events: u64) -> Result<(), ProxyError> {
        self.push(
            UPDATE_STORAGE_WRITER_STATUS,
            &StorageWriterStatusUpdate { number_of_events },
        )
        .await
    }

    /// Fetches the coordinator's current status report.
    pub async fn fetch_report(&self) -> Result<StatusReport, ProxyError> {
        let value = self.client.get_data(GET_PROCESSING_STATUS).await?;
        serde_json::from_value(value)
            .map_err(|e| ProxyError::Transport(format!("invalid status report: {}", e)))
    }

    pub async fn processing_completed(&self) -> Result<bool, ProxyError> {
        match self.client.get_data(GET_PROCESSING_COMPLETED).await? {
            Value::Bool(completed) => Ok(completed),
            other => Err(ProxyError::Transport(format!(
                "expected boolean from {}, got {}",
                GET_PROCESSING_COMPLETED, other
            ))),
        }
    }

    async fn push<T: serde::Serialize>(&self, name: &str, update: &T) -> Result<(), ProxyError> {
        let params = serde_json::to_value(update)
            .map_err(|e| ProxyError::Transport(format!("failed to encode {}: {}", name, e)))?;
        self.client.call(name, params).await?;
        Ok(())
    }
}
