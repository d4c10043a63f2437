use plumbline_core::{Config, StatusHandle};

/// Shared application state
pub struct AppState {
    config: Config,
    status: StatusHandle,
}

impl AppState {
    pub fn new(config: Config, status: StatusHandle) -> Self {
        Self { config, status }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn status(&self) -> &StatusHandle {
        &self.status
    }
}
