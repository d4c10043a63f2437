pub mod config;
pub mod metrics;
pub mod monitor;
pub mod proxy;
pub mod status;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, ClientConfig, Config, ConfigError,
    MonitorConfig, ServerConfig, StatusConfig,
};
pub use monitor::{MonitorOutcome, PipelineMonitor};
pub use proxy::{
    port_for_pid, proxy_function, FunctionRegistry, HttpProxyClient, ProxyClient, ProxyError,
    ProxyFunction, ProxyServer, RpcResponse,
};
pub use status::{
    register_status_functions, CollectorStatusUpdate, ExtractionWorkerStatusUpdate,
    PipelinePhase, ProcessingState, ProcessingStatus, StatusHandle, StatusReport, StatusReporter,
    StorageWriterStatusUpdate,
};
