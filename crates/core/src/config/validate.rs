use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - An explicit server port is not 0
/// - Idle timeout, poll interval and client timeout are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == Some(0) {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0 (omit it to derive the port from the pid)".to_string(),
        ));
    }

    if config.status.idle_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "status.idle_timeout_secs must be greater than 0".to_string(),
        ));
    }

    if config.monitor.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "monitor.poll_interval_ms must be greater than 0".to_string(),
        ));
    }

    if config.client.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "client.timeout_secs must be greater than 0".to_string(),
        ));
    }

    Ok(())
}
