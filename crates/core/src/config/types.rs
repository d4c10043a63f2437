use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::proxy::port_for_pid;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

/// Coordinator proxy server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    /// Listening port. When absent the port is derived from the
    /// coordinator's own pid.
    #[serde(default)]
    pub port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
        }
    }
}

impl ServerConfig {
    /// The configured port, or the pid-derived one.
    pub fn resolved_port(&self, pid: u32) -> u16 {
        self.port.unwrap_or_else(|| port_for_pid(u64::from(pid)))
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

/// Status aggregation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusConfig {
    /// Seconds without observed worker progress before the pipeline is
    /// reported as stalled.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl StatusConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

fn default_idle_timeout() -> u64 {
    300 // 5 minutes
}

/// Pipeline monitor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// How often the completion and liveness queries are polled (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Whether a stalled pipeline terminates the coordinator with an error.
    #[serde(default = "default_abort_on_stall")]
    pub abort_on_stall: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            abort_on_stall: default_abort_on_stall(),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_abort_on_stall() -> bool {
    true
}

/// Proxy client configuration, used by reporting processes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_client_timeout(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_client_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.server.port, None);
        assert_eq!(config.status.idle_timeout_secs, 300);
        assert_eq!(config.status.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.monitor.poll_interval(), Duration::from_millis(1000));
        assert!(config.monitor.abort_on_stall);
        assert_eq!(config.client.timeout_secs, 30);
        assert_eq!(config.client.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_resolved_port_explicit() {
        let server = ServerConfig {
            port: Some(7777),
            ..Default::default()
        };
        assert_eq!(server.resolved_port(10), 7777);
    }

    #[test]
    fn test_resolved_port_from_pid() {
        let server = ServerConfig::default();
        assert_eq!(server.resolved_port(10), 1034);
        assert_eq!(server.resolved_port(70000), 4465);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed.status.idle_timeout_secs,
            config.status.idle_timeout_secs
        );
    }
}
