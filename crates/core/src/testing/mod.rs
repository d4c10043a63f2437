//! Testing utilities and mock implementations.
//!
//! This module provides an in-memory proxy transport and a controllable
//! clock, so the aggregator and everything built on it can be exercised
//! without sockets or real waiting.
//!
//! # Example
//!
//! ```rust,ignore
//! use plumbline_core::testing::{MockClock, MockNetwork, MockProxyServer};
//!
//! let network = MockNetwork::new();
//! let server = MockProxyServer::new(network.clone(), 4465);
//! register_status_functions(&server, status.clone()).await?;
//! server.open().await?;
//! server.start_proxy().await?;
//!
//! let client = network.client(4465);
//! client.call("update_storage_writer_status", json!({ "number_of_events": 3 })).await?;
//! ```

mod mock_clock;
mod mock_proxy;

pub use mock_clock::MockClock;
pub use mock_proxy::{MockNetwork, MockProxyClient, MockProxyServer, RecordedCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::status::{CollectorStatusUpdate, ExtractionWorkerStatusUpdate, ProcessingState};

    /// Identifier used by [`collector_update`].
    pub const COLLECTOR_IDENTIFIER: &str = "collector";

    /// Create a collector update with reasonable defaults.
    pub fn collector_update(
        number_of_work_items: u64,
        status: ProcessingState,
    ) -> CollectorStatusUpdate {
        CollectorStatusUpdate {
            identifier: COLLECTOR_IDENTIFIER.to_string(),
            pid: 1000,
            number_of_work_items,
            status,
        }
    }

    /// Create a running extraction worker update.
    ///
    /// The pid is derived from the identifier length so distinct workers in a
    /// test usually get distinct pids.
    pub fn worker_update(
        identifier: &str,
        number_of_events: u64,
        number_of_work_items: u64,
    ) -> ExtractionWorkerStatusUpdate {
        ExtractionWorkerStatusUpdate {
            identifier: identifier.to_string(),
            pid: 2000 + identifier.len() as u32,
            display_name: format!("{}: item {}", identifier, number_of_work_items),
            number_of_events,
            number_of_work_items,
            status: ProcessingState::Running,
            process_status: "running".to_string(),
        }
    }
}
