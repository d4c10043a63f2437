//! Error types for the proxy module.

use thiserror::Error;

/// Errors raised by proxy transports.
///
/// Server-side and client-side failures share one enum so a transport can
/// forward a remote failure to its caller unchanged.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Local resources needed before listening could not be acquired.
    #[error("Failed to initialize transport: {reason}")]
    TransportInit { reason: String },

    /// The configured address could not be bound.
    #[error("Failed to bind to port {port}: {reason}")]
    Bind { port: u16, reason: String },

    /// Serving stopped with an error after binding succeeded.
    #[error("Proxy stopped listening: {reason}")]
    Listen { reason: String },

    /// A function with this name is already registered.
    #[error("Function already registered: {name}")]
    DuplicateRegistration { name: String },

    /// The server is already listening and can no longer be reconfigured.
    #[error("Proxy is already listening on port {port}")]
    AlreadyListening { port: u16 },

    /// An operation needing an opened proxy was called before `open()`.
    #[error("Proxy has not been opened")]
    NotOpen,

    /// The server could not be reached.
    #[error("Failed to connect to {address}: {reason}")]
    Connection { address: String, reason: String },

    /// The remote operation is unknown or reported a failure.
    #[error("Remote call {name} failed: {reason}")]
    RemoteCall { name: String, reason: String },

    /// The transport failed while carrying a call.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ProxyError {
    /// Creates a new remote call error.
    pub fn remote_call(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RemoteCall {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new error for a function name the server does not know.
    pub fn unknown_function(name: impl Into<String>) -> Self {
        Self::remote_call(name, "unknown function")
    }

    /// Creates a new transport initialization error.
    pub fn transport_init(reason: impl Into<String>) -> Self {
        Self::TransportInit {
            reason: reason.into(),
        }
    }

    /// Whether this error originated on the client side of the transport.
    pub fn is_client_side(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::RemoteCall { .. } | Self::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProxyError::DuplicateRegistration {
            name: "update_collector_status".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Function already registered: update_collector_status"
        );

        let err = ProxyError::unknown_function("missing");
        assert_eq!(err.to_string(), "Remote call missing failed: unknown function");
    }

    #[test]
    fn test_is_client_side() {
        assert!(ProxyError::Transport("reset".to_string()).is_client_side());
        assert!(ProxyError::remote_call("a", "b").is_client_side());
        assert!(!ProxyError::NotOpen.is_client_side());
        assert!(!ProxyError::Bind {
            port: 1034,
            reason: "in use".to_string()
        }
        .is_client_side());
    }
}
