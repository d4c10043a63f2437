//! In-memory proxy transport for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::proxy::{FunctionRegistry, ProxyClient, ProxyError, ProxyFunction, ProxyServer};

/// A call received by a [`MockProxyClient`], recorded for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub name: String,
    pub params: Value,
}

/// Functions served on one port, plus whether the server is still up.
#[derive(Debug, Default)]
struct Endpoint {
    functions: RwLock<FunctionRegistry>,
    listening: AtomicBool,
}

/// Shared "network" connecting mock servers and clients by port.
///
/// Cloning yields another handle to the same network.
#[derive(Debug, Clone, Default)]
pub struct MockNetwork {
    endpoints: Arc<RwLock<HashMap<u16, Arc<Endpoint>>>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client addressing `port` on this network.
    pub fn client(&self, port: u16) -> MockProxyClient {
        MockProxyClient::new(self.clone(), port)
    }

    /// Ports with a listening server.
    pub async fn listening_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self
            .endpoints
            .read()
            .await
            .iter()
            .filter(|(_, endpoint)| endpoint.listening.load(Ordering::SeqCst))
            .map(|(port, _)| *port)
            .collect();
        ports.sort_unstable();
        ports
    }

    async fn bind(&self, port: u16, endpoint: Arc<Endpoint>) -> Result<(), ProxyError> {
        let mut endpoints = self.endpoints.write().await;
        if let Some(existing) = endpoints.get(&port) {
            if !Arc::ptr_eq(existing, &endpoint) && existing.listening.load(Ordering::SeqCst) {
                return Err(ProxyError::Bind {
                    port,
                    reason: "address already in use".to_string(),
                });
            }
        }
        endpoint.listening.store(true, Ordering::SeqCst);
        endpoints.insert(port, endpoint);
        Ok(())
    }

    async fn endpoint(&self, port: u16) -> Option<Arc<Endpoint>> {
        self.endpoints
            .read()
            .await
            .get(&port)
            .filter(|endpoint| endpoint.listening.load(Ordering::SeqCst))
            .cloned()
    }
}

/// Mock implementation of the ProxyServer trait.
///
/// `start_proxy` binds the server on the [`MockNetwork`] and returns right
/// away instead of blocking; `stop` takes it off the network again.
#[derive(Debug)]
pub struct MockProxyServer {
    network: MockNetwork,
    port: AtomicU16,
    opened: AtomicBool,
    endpoint: Arc<Endpoint>,
    /// If set, the next `open` or `start_proxy` fails with this error.
    next_error: RwLock<Option<ProxyError>>,
}

impl MockProxyServer {
    pub fn new(network: MockNetwork, port: u16) -> Self {
        Self {
            network,
            port: AtomicU16::new(port),
            opened: AtomicBool::new(false),
            endpoint: Arc::new(Endpoint::default()),
            next_error: RwLock::new(None),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.endpoint.listening.load(Ordering::SeqCst)
    }

    /// Names of the registered functions.
    pub async fn function_names(&self) -> Vec<String> {
        self.endpoint.functions.read().await.names()
    }

    /// Configure the next `open` or `start_proxy` to fail with the given error.
    pub async fn set_next_error(&self, error: ProxyError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Option<ProxyError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl ProxyServer for MockProxyServer {
    fn name(&self) -> &str {
        "mock"
    }

    fn listening_port(&self) -> u16 {
        self.port.load(Ordering::SeqCst)
    }

    async fn open(&self) -> Result<(), ProxyError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        self.opened.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn start_proxy(&self) -> Result<(), ProxyError> {
        if !self.opened.load(Ordering::SeqCst) {
            return Err(ProxyError::NotOpen);
        }
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        self.network
            .bind(self.listening_port(), Arc::clone(&self.endpoint))
            .await
    }

    async fn set_listening_port(&self, port: u16) -> Result<(), ProxyError> {
        if self.is_listening() {
            return Err(ProxyError::AlreadyListening {
                port: self.listening_port(),
            });
        }
        self.port.store(port, Ordering::SeqCst);
        Ok(())
    }

    async fn register_function(
        &self,
        name: &str,
        function: ProxyFunction,
    ) -> Result<(), ProxyError> {
        self.endpoint.functions.write().await.register(name, function)
    }

    fn stop(&self) {
        self.endpoint.listening.store(false, Ordering::SeqCst);
    }
}

/// Mock implementation of the ProxyClient trait.
///
/// Calls are dispatched straight to the functions of the server listening on
/// the same port of the [`MockNetwork`], and recorded. `open` fails with
/// `Connection` when nothing listens there; a call fails with `Transport`.
#[derive(Debug)]
pub struct MockProxyClient {
    network: MockNetwork,
    port: u16,
    calls: RwLock<Vec<RecordedCall>>,
    /// If set, the next call fails with this error.
    next_error: RwLock<Option<ProxyError>>,
}

impl MockProxyClient {
    pub fn new(network: MockNetwork, port: u16) -> Self {
        Self {
            network,
            port,
            calls: RwLock::new(Vec::new()),
            next_error: RwLock::new(None),
        }
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: ProxyError) {
        *self.next_error.write().await = Some(error);
    }

    fn connection_refused(&self) -> ProxyError {
        ProxyError::Connection {
            address: format!("mock:{}", self.port),
            reason: "connection refused".to_string(),
        }
    }
}

#[async_trait]
impl ProxyClient for MockProxyClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open(&self) -> Result<(), ProxyError> {
        match self.network.endpoint(self.port).await {
            Some(_) => Ok(()),
            None => Err(self.connection_refused()),
        }
    }

    async fn call(&self, name: &str, params: Value) -> Result<Value, ProxyError> {
        self.calls.write().await.push(RecordedCall {
            name: name.to_string(),
            params: params.clone(),
        });

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let endpoint = self
            .network
            .endpoint(self.port)
            .await
            .ok_or_else(|| {
                ProxyError::Transport(format!("mock:{}: connection refused", self.port))
            })?;

        let function = endpoint
            .functions
            .read()
            .await
            .get(name)
            .ok_or_else(|| ProxyError::unknown_function(name))?;

        function(params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::proxy_function;
    use serde_json::json;

    fn double() -> ProxyFunction {
        proxy_function(|params: Value| async move {
            let n = params.as_i64().unwrap_or(0);
            Ok::<_, ProxyError>(json!(n * 2))
        })
    }

    async fn listening_server(network: &MockNetwork, port: u16) -> MockProxyServer {
        let server = MockProxyServer::new(network.clone(), port);
        server.register_function("double", double()).await.unwrap();
        server.open().await.unwrap();
        server.start_proxy().await.unwrap();
        server
    }

    #[tokio::test]
    async fn test_call_round_trip() {
        let network = MockNetwork::new();
        let _server = listening_server(&network, 1034).await;

        let client = network.client(1034);
        client.open().await.unwrap();
        assert_eq!(client.call("double", json!(21)).await.unwrap(), json!(42));

        let calls = client.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "double");
        assert_eq!(calls[0].params, json!(21));
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let network = MockNetwork::new();
        let _server = listening_server(&network, 1034).await;

        let err = network.client(1034).get_data("triple").await.unwrap_err();
        assert!(matches!(err, ProxyError::RemoteCall { name, .. } if name == "triple"));
    }

    #[tokio::test]
    async fn test_client_without_server() {
        let network = MockNetwork::new();
        let client = network.client(1034);
        assert!(matches!(
            client.open().await,
            Err(ProxyError::Connection { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_before_open_fails() {
        let network = MockNetwork::new();
        let server = MockProxyServer::new(network, 1034);
        assert!(matches!(
            server.start_proxy().await,
            Err(ProxyError::NotOpen)
        ));
    }

    #[tokio::test]
    async fn test_port_collision_surfaces_as_bind_error() {
        let network = MockNetwork::new();
        let _first = listening_server(&network, 1034).await;

        let second = MockProxyServer::new(network.clone(), 1034);
        second.open().await.unwrap();
        let err = second.start_proxy().await.unwrap_err();
        assert!(matches!(err, ProxyError::Bind { port: 1034, .. }));
    }

    #[tokio::test]
    async fn test_set_port_rejected_while_listening() {
        let network = MockNetwork::new();
        let server = MockProxyServer::new(network.clone(), 1034);
        server.set_listening_port(2048).await.unwrap();
        assert_eq!(server.listening_port(), 2048);

        server.open().await.unwrap();
        server.start_proxy().await.unwrap();
        let err = server.set_listening_port(4096).await.unwrap_err();
        assert!(matches!(err, ProxyError::AlreadyListening { port: 2048 }));
        assert_eq!(network.listening_ports().await, vec![2048]);
    }

    #[tokio::test]
    async fn test_stop_takes_server_off_network() {
        let network = MockNetwork::new();
        let server = listening_server(&network, 1034).await;
        server.stop();

        assert!(!server.is_listening());
        assert!(network.listening_ports().await.is_empty());
        assert!(network.client(1034).call("double", json!(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_errors() {
        let network = MockNetwork::new();
        let server = MockProxyServer::new(network.clone(), 1034);
        server
            .set_next_error(ProxyError::transport_init("no sockets"))
            .await;
        assert!(matches!(
            server.open().await,
            Err(ProxyError::TransportInit { .. })
        ));

        let _server = listening_server(&network, 1035).await;
        let client = network.client(1035);
        client
            .set_next_error(ProxyError::Transport("reset by peer".to_string()))
            .await;
        assert!(matches!(
            client.call("double", json!(1)).await,
            Err(ProxyError::Transport(_))
        ));
        assert_eq!(client.call("double", json!(1)).await.unwrap(), json!(2));
    }
}
