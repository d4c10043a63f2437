//! Proxy functions exposing the aggregator to other processes.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::proxy::{proxy_function, ProxyError, ProxyServer};

use super::handle::StatusHandle;
use super::types::{
    CollectorStatusUpdate, ExtractionWorkerStatusUpdate, StorageWriterStatusUpdate,
};

pub const UPDATE_COLLECTOR_STATUS: &str = "update_collector_status";
pub const UPDATE_EXTRACTION_WORKER_STATUS: &str = "update_extraction_worker_status";
pub const UPDATE_STORAGE_WRITER_STATUS: &str = "update_storage_writer_status";
pub const GET_PROCESSING_STATUS: &str = "get_processing_status";
pub const GET_EXTRACTION_COMPLETED: &str = "get_extraction_completed";
pub const GET_PROCESSING_COMPLETED: &str = "get_processing_completed";

/// Every function registered by [`register_status_functions`].
pub const STATUS_FUNCTIONS: [&str; 6] = [
    UPDATE_COLLECTOR_STATUS,
    UPDATE_EXTRACTION_WORKER_STATUS,
    UPDATE_STORAGE_WRITER_STATUS,
    GET_PROCESSING_STATUS,
    GET_EXTRACTION_COMPLETED,
    GET_PROCESSING_COMPLETED,
];

/// Registers the status update and query functions on `server`.
///
/// Update functions take their typed update as JSON params and return
/// `null`. Params of the wrong shape are rejected as a remote call error
/// before the aggregator is touched.
pub async fn register_status_functions(
    server: &dyn ProxyServer,
    status: StatusHandle,
) -> Result<(), ProxyError> {
    let handle = status.clone();
    server
        .register_function(
            UPDATE_COLLECTOR_STATUS,
            proxy_function(move |params| {
                let handle = handle.clone();
                async move {
                    let update: CollectorStatusUpdate =
                        parse_params(UPDATE_COLLECTOR_STATUS, params)?;
                    handle.update_collector_status(update).await;
                    Ok::<_, ProxyError>(Value::Null)
                }
            }),
        )
        .await?;

    let handle = status.clone();
    server
        .register_function(
            UPDATE_EXTRACTION_WORKER_STATUS,
            proxy_function(move |params| {
                let handle = handle.clone();
                async move {
                    let update: ExtractionWorkerStatusUpdate =
                        parse_params(UPDATE_EXTRACTION_WORKER_STATUS, params)?;
                    handle.update_extraction_worker_status(update).await;
                    Ok::<_, ProxyError>(Value::Null)
                }
            }),
        )
        .await?;

    let handle = status.clone();
    server
        .register_function(
            UPDATE_STORAGE_WRITER_STATUS,
            proxy_function(move |params| {
                let handle = handle.clone();
                async move {
                    let update: StorageWriterStatusUpdate =
                        parse_params(UPDATE_STORAGE_WRITER_STATUS, params)?;
                    handle
                        .update_storage_writer_status(update.number_of_events)
                        .await;
                    Ok::<_, ProxyError>(Value::Null)
                }
            }),
        )
        .await?;

    let handle = status.clone();
    server
        .register_function(
            GET_PROCESSING_STATUS,
            proxy_function(move |_params| {
                let handle = handle.clone();
                async move {
                    let report = handle.report().await;
                    serde_json::to_value(report).map_err(|e| {
                        ProxyError::remote_call(GET_PROCESSING_STATUS, e.to_string())
                    })
                }
            }),
        )
        .await?;

    let handle = status.clone();
    server
        .register_function(
            GET_EXTRACTION_COMPLETED,
            proxy_function(move |_params| {
                let handle = handle.clone();
                async move {
                    let completed = handle.extraction_completed().await;
                    Ok::<_, ProxyError>(Value::Bool(completed))
                }
            }),
        )
        .await?;

    let handle = status;
    server
        .register_function(
            GET_PROCESSING_COMPLETED,
            proxy_function(move |_params| {
                let handle = handle.clone();
                async move {
                    let completed = handle.processing_completed().await;
                    Ok::<_, ProxyError>(Value::Bool(completed))
                }
            }),
        )
        .await?;

    debug!(
        "Registered {} status functions on {} proxy",
        STATUS_FUNCTIONS.len(),
        server.name()
    );
    Ok(())
}

fn parse_params<T: DeserializeOwned>(name: &str, params: Value) -> Result<T, ProxyError> {
    serde_json::from_value(params)
        .map_err(|e| ProxyError::remote_call(name, format!("invalid params: {}", e)))
}
