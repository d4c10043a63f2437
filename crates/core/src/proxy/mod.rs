//! Remote-procedure abstraction used to carry status updates between processes.
//!
//! A [`ProxyServer`] binds to a port, accepts registration of named callables
//! and serves them; a [`ProxyClient`] connects to a server and invokes those
//! callables by name. Concrete transports implement both traits. This module
//! ships the HTTP client side ([`HttpProxyClient`]); the coordinator binary
//! provides the matching server, and [`crate::testing`] has an in-memory pair.
//!
//! # Example
//!
//! ```ignore
//! use plumbline_core::proxy::{port_for_pid, HttpProxyClient, ProxyClient};
//!
//! let port = port_for_pid(coordinator_pid);
//! let client = HttpProxyClient::new("127.0.0.1".parse()?, port, Duration::from_secs(30))?;
//! client.open().await?;
//! let report = client.get_data("get_processing_status").await?;
//! ```

mod error;
mod function;
mod http_client;
mod port;
mod traits;

pub use error::ProxyError;
pub use function::{proxy_function, FunctionRegistry, ProxyFunction};
pub use http_client::{HttpProxyClient, RpcResponse, HEALTH_PATH, RPC_PATH};
pub use port::{port_for_pid, MAX_PORT, MIN_UNPRIVILEGED_PORT};
pub use traits::{ProxyClient, ProxyServer};
