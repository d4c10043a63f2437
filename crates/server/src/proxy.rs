//! HTTP transport for the proxy server.
//!
//! Registered functions are served as `POST /rpc/{name}` with JSON params in
//! the body and an [`RpcResponse`] back. `GET /health` answers as soon as the
//! listener is bound, which is what [`HttpProxyClient::open`] probes.
//!
//! [`HttpProxyClient::open`]: plumbline_core::HttpProxyClient

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use plumbline_core::proxy::{FunctionRegistry, RpcResponse, HEALTH_PATH, RPC_PATH};
use plumbline_core::{ProxyError, ProxyFunction, ProxyServer};

use crate::api::{handlers, middleware::metrics_middleware};

type SharedRegistry = Arc<RwLock<FunctionRegistry>>;

/// Proxy server speaking JSON over HTTP.
pub struct HttpProxyServer {
    host: IpAddr,
    port: AtomicU16,
    opened: AtomicBool,
    /// Held by the one `start_proxy` call that owns the listener.
    serving: AtomicBool,
    listening: AtomicBool,
    functions: SharedRegistry,
    routes: Router,
    /// `true` once `stop()` was called; never reset.
    stopped_tx: watch::Sender<bool>,
}

impl HttpProxyServer {
    pub fn new(host: IpAddr, port: u16) -> Self {
        let (stopped_tx, _) = watch::channel(false);
        Self {
            host,
            port: AtomicU16::new(port),
            opened: AtomicBool::new(false),
            serving: AtomicBool::new(false),
            listening: AtomicBool::new(false),
            functions: Arc::new(RwLock::new(FunctionRegistry::new())),
            routes: Router::new(),
            stopped_tx,
        }
    }

    /// Serves `routes` next to the RPC endpoints.
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.routes = routes;
        self
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Binds and serves until stopped. Callers hold the `serving` guard.
    async fn serve(&self) -> Result<(), ProxyError> {
        let mut stopped_rx = self.stopped_tx.subscribe();
        if *stopped_rx.borrow() {
            debug!("Proxy server was stopped before it started listening");
            return Ok(());
        }

        let requested_port = self.listening_port();
        let addr = SocketAddr::new(self.host, requested_port);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ProxyError::Bind {
                port: requested_port,
                reason: e.to_string(),
            })?;

        // Port 0 asks the OS for one; report the port actually bound.
        let local_addr = listener.local_addr().map_err(|e| ProxyError::Listen {
            reason: e.to_string(),
        })?;
        self.port.store(local_addr.port(), Ordering::SeqCst);
        self.listening.store(true, Ordering::SeqCst);
        info!("Proxy server listening on {}", local_addr);

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = stopped_rx.wait_for(|stopped| *stopped).await;
            })
            .await;

        info!("Proxy server on {} stopped", local_addr);
        result.map_err(|e| ProxyError::Listen {
            reason: e.to_string(),
        })
    }

    fn router(&self) -> Router {
        let rpc = Router::new()
            .route(&format!("{}/{{name}}", RPC_PATH), post(invoke))
            .with_state(Arc::clone(&self.functions));

        Router::new()
            .route(HEALTH_PATH, get(handlers::health))
            .merge(rpc)
            .merge(self.routes.clone())
            .layer(middleware::from_fn(metrics_middleware))
            .layer(TraceLayer::new_for_http())
    }
}

#[async_trait]
impl ProxyServer for HttpProxyServer {
    fn name(&self) -> &str {
        "http"
    }

    fn listening_port(&self) -> u16 {
        self.port.load(Ordering::SeqCst)
    }

    async fn open(&self) -> Result<(), ProxyError> {
        if !self.opened.swap(true, Ordering::SeqCst) {
            debug!("HTTP proxy server opened for {}", self.host);
        }
        Ok(())
    }

    async fn start_proxy(&self) -> Result<(), ProxyError> {
        if !self.opened.load(Ordering::SeqCst) {
            return Err(ProxyError::NotOpen);
        }
        if self
            .serving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ProxyError::AlreadyListening {
                port: self.listening_port(),
            });
        }

        let result = self.serve().await;
        self.listening.store(false, Ordering::SeqCst);
        self.serving.store(false, Ordering::SeqCst);
        result
    }

    async fn set_listening_port(&self, port: u16) -> Result<(), ProxyError> {
        if self.serving.load(Ordering::SeqCst) {
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
        self.functions.write().await.register(name, function)
    }

    fn stop(&self) {
        // Sticky: a `start_proxy` that has not subscribed yet still sees it.
        self.stopped_tx.send_replace(true);
    }
}

/// `POST /rpc/{name}`
async fn invoke(
    State(functions): State<SharedRegistry>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let params: Value = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(params) => params,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(RpcResponse::failure(format!("invalid JSON params: {}", e))),
                )
                    .into_response();
            }
        }
    };

    let Some(function) = functions.read().await.get(&name) else {
        debug!("Call to unknown function {}", name);
        return (
            StatusCode::NOT_FOUND,
            Json(RpcResponse::failure("unknown function")),
        )
            .into_response();
    };

    match function(params).await {
        Ok(result) => (StatusCode::OK, Json(RpcResponse::success(result))).into_response(),
        Err(e) => {
            warn!("Function {} failed: {}", name, e);
            let reason = match e {
                ProxyError::RemoteCall { reason, .. } => reason,
                other => other.to_string(),
            };
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(RpcResponse::failure(reason)),
            )
                .into_response()
        }
    }
}
