//! Status aggregation for a multi-process extraction pipeline.
//!
//! Upstream processes push snapshots of their progress to the coordinator,
//! which keeps them in a [`ProcessingStatus`] and polls it to decide whether
//! the run has finished or stalled.
//!
//! # Example
//!
//! ```ignore
//! use plumbline_core::status::{register_status_functions, ProcessingStatus, StatusHandle};
//!
//! let status = StatusHandle::new(ProcessingStatus::from_config(&config.status));
//! register_status_functions(&server, status.clone()).await?;
//!
//! if status.processing_completed().await {
//!     // shut the pipeline down
//! }
//! ```

mod aggregator;
mod clock;
mod functions;
mod handle;
mod reporter;
mod types;

pub use aggregator::{ProcessingStatus, DEFAULT_IDLE_TIMEOUT};
pub use clock::{Clock, SystemClock};
pub use functions::{
    register_status_functions, GET_EXTRACTION_COMPLETED, GET_PROCESSING_COMPLETED,
    GET_PROCESSING_STATUS, STATUS_FUNCTIONS, UPDATE_COLLECTOR_STATUS,
    UPDATE_EXTRACTION_WORKER_STATUS, UPDATE_STORAGE_WRITER_STATUS,
};
pub use handle::StatusHandle;
pub use reporter::StatusReporter;
pub use types::{
    CollectorStatus, CollectorStatusUpdate, ExtractionWorkerStatus, ExtractionWorkerStatusUpdate,
    PipelinePhase, ProcessingState, StatusReport, StorageWriterStatusUpdate,
};
