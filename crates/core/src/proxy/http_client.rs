//! JSON-over-HTTP proxy client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::debug;

use super::{ProxyClient, ProxyError};
use crate::config::Config;

/// Path prefix under which registered functions are served.
pub const RPC_PATH: &str = "/rpc";

/// Path answered by any HTTP proxy server once it is listening.
pub const HEALTH_PATH: &str = "/health";

/// Body returned by `POST /rpc/{name}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RpcResponse {
    pub fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Proxy client speaking to an HTTP proxy server.
pub struct HttpProxyClient {
    client: Client,
    address: SocketAddr,
}

impl HttpProxyClient {
    /// Create a client for the server at `host:port`.
    pub fn new(host: IpAddr, port: u16, timeout: Duration) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProxyError::transport_init(e.to_string()))?;

        Ok(Self {
            client,
            address: SocketAddr::new(host, port),
        })
    }

    /// Create a client for the coordinator running as `coordinator_pid`.
    ///
    /// Uses the configured server port when set, the pid-derived one
    /// otherwise, so both sides agree without exchanging the port.
    pub fn for_coordinator(config: &Config, coordinator_pid: u32) -> Result<Self, ProxyError> {
        Self::new(
            config.server.host,
            config.server.resolved_port(coordinator_pid),
            config.client.timeout(),
        )
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    fn rpc_url(&self, name: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url(),
            RPC_PATH,
            urlencoding::encode(name)
        )
    }

    fn connection_error(&self, e: reqwest::Error) -> ProxyError {
        ProxyError::Connection {
            address: self.address.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl ProxyClient for HttpProxyClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn open(&self) -> Result<(), ProxyError> {
        let url = format!("{}{}", self.base_url(), HEALTH_PATH);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;

        if !response.status().is_success() {
            return Err(ProxyError::Connection {
                address: self.address.to_string(),
                reason: format!("health check returned {}", response.status()),
            });
        }

        debug!("Connected to proxy server at {}", self.address);
        Ok(())
    }

    async fn call(&self, name: &str, params: Value) -> Result<Value, ProxyError> {
        let response = self
            .client
            .post(self.rpc_url(name))
            .json(&params)
            .send()
            .await
            .map_err(|e| ProxyError::Transport(format!("{}: {}", self.address, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProxyError::unknown_function(name));
        }

        if !status.is_success() {
            let reason = response
                .json::<RpcResponse>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| format!("server returned {}", status));
            return Err(ProxyError::remote_call(name, reason));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| ProxyError::Transport(format!("invalid response body: {}", e)))?;

        Ok(body.result.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(port: u16) -> HttpProxyClient {
        HttpProxyClient::new(
            "127.0.0.1".parse().unwrap(),
            port,
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_rpc_url() {
        let client = client(4465);
        assert_eq!(
            client.rpc_url("update_collector_status"),
            "http://127.0.0.1:4465/rpc/update_collector_status"
        );
        assert_eq!(client.rpc_url("a b"), "http://127.0.0.1:4465/rpc/a%20b");
    }

    #[test]
    fn test_for_coordinator_derives_port_from_pid() {
        let client = HttpProxyClient::for_coordinator(&Config::default(), 70000).unwrap();
        assert_eq!(client.address().to_string(), "127.0.0.1:4465");

        let mut config = Config::default();
        config.server.port = Some(9100);
        let client = HttpProxyClient::for_coordinator(&config, 70000).unwrap();
        assert_eq!(client.address().port(), 9100);
    }

    #[test]
    fn test_rpc_response_serialization() {
        let ok = serde_json::to_value(RpcResponse::success(json!(3))).unwrap();
        assert_eq!(ok, json!({ "result": 3 }));

        let failed = serde_json::to_value(RpcResponse::failure("nope")).unwrap();
        assert_eq!(failed, json!({ "error": "nope" }));

        let parsed: RpcResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(parsed, RpcResponse::default());
    }

    #[tokio::test]
    async fn test_open_unreachable_server() {
        // Port 1 is privileged and never served by the test environment.
        let client = client(1);
        let err = client.open().await.unwrap_err();
        assert!(matches!(err, ProxyError::Connection { .. }));

        let err = client.call("get_processing_status", Value::Null).await.unwrap_err();
        assert!(matches!(err, ProxyError::Transport(_)));
    }
}
