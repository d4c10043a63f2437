//! Trait definitions for the proxy module.

use async_trait::async_trait;
use serde_json::Value;

use super::error::ProxyError;
use super::function::ProxyFunction;

/// Server side of a proxy transport.
#[async_trait]
pub trait ProxyServer: Send + Sync {
    /// Returns the name of this transport implementation.
    fn name(&self) -> &str;

    /// The port the server listens (or will listen) on.
    fn listening_port(&self) -> u16;

    /// Acquires whatever local resources the transport needs before listening.
    ///
    /// Calling it again on an opened server is a no-op.
    async fn open(&self) -> Result<(), ProxyError>;

    /// Binds to the configured port and serves registered functions.
    ///
    /// Resolves once the server is stopped, or with `Bind`/`Listen` errors.
    async fn start_proxy(&self) -> Result<(), ProxyError>;

    /// Changes the listening port. Rejected once the server is listening.
    async fn set_listening_port(&self, port: u16) -> Result<(), ProxyError>;

    /// Associates `name` with `function`. Names must be unique.
    async fn register_function(
        &self,
        name: &str,
        function: ProxyFunction,
    ) -> Result<(), ProxyError>;

    /// Asks `start_proxy` to finish. Sticky: a later `start_proxy` returns
    /// without serving.
    fn stop(&self);
}

/// Client side of a proxy transport.
#[async_trait]
pub trait ProxyClient: Send + Sync {
    /// Returns the name of this transport implementation.
    fn name(&self) -> &str;

    /// Establishes the connection to the configured server.
    async fn open(&self) -> Result<(), ProxyError>;

    /// Invokes the named remote operation with `params`.
    async fn call(&self, name: &str, params: Value) -> Result<Value, ProxyError>;

    /// Invokes the named remote operation without arguments and returns its result.
    async fn get_data(&self, name: &str) -> Result<Value, ProxyError> {
        self.call(name, Value::Null).await
    }
}
