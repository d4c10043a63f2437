use std::io::Write;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tempfile::NamedTempFile;
use tokio::time::{sleep, timeout};

use plumbline_core::status::{PipelinePhase, ProcessingState, StatusReport};
use plumbline_core::{
    CollectorStatusUpdate, ExtractionWorkerStatusUpdate, HttpProxyClient, ProxyClient, ProxyError,
    StatusReporter,
};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Config with a fixed port and a fast monitor
fn test_config(port: u16, idle_timeout_secs: u64) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[status]
idle_timeout_secs = {}

[monitor]
poll_interval_ms = 50
abort_on_stall = true
"#,
        port, idle_timeout_secs
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the coordinator and return a handle
async fn spawn_coordinator(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_plumbline"))
        .env("PLUMBLINE_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn coordinator")
}

/// Wait for the coordinator to answer health checks
async fn wait_for_coordinator(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

fn reporter(port: u16) -> StatusReporter {
    let client = HttpProxyClient::new(
        "127.0.0.1".parse().unwrap(),
        port,
        Duration::from_secs(5),
    )
    .unwrap();
    StatusReporter::new(Arc::new(client))
}

fn worker(identifier: &str, events: u64, items: u64) -> ExtractionWorkerStatusUpdate {
    ExtractionWorkerStatusUpdate {
        identifier: identifier.to_string(),
        pid: 4242,
        display_name: format!("/evidence/{}.img", identifier),
        number_of_events: events,
        number_of_work_items: items,
        status: ProcessingState::Running,
        process_status: "running".to_string(),
    }
}

fn collector(items: u64, status: ProcessingState) -> CollectorStatusUpdate {
    CollectorStatusUpdate {
        identifier: "collector".to_string(),
        pid: 4241,
        number_of_work_items: items,
        status,
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let port = get_available_port();
    let config = write_config(&test_config(port, 300));
    let mut coordinator = spawn_coordinator(config.path()).await;

    assert!(
        wait_for_coordinator(port, 40).await,
        "Coordinator did not start in time"
    );

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");

    coordinator.kill().await.ok();
}

#[tokio::test]
async fn test_updates_are_visible_in_status() {
    let port = get_available_port();
    let config = write_config(&test_config(port, 300));
    let mut coordinator = spawn_coordinator(config.path()).await;
    assert!(wait_for_coordinator(port, 40).await);

    let reporter = reporter(port);
    reporter
        .report_collector(&collector(2, ProcessingState::Running))
        .await
        .unwrap();
    reporter
        .report_extraction_worker(&worker("worker_0", 5, 1))
        .await
        .unwrap();

    let report = reporter.fetch_report().await.unwrap();
    assert_eq!(report.phase, PipelinePhase::CollectorRunning);
    assert_eq!(report.number_of_extracted_events, 5);
    assert!(report.workers_running);

    let report: StatusReport = Client::new()
        .get(format!("http://127.0.0.1:{}/status", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report.extraction_workers.len(), 1);
    assert_eq!(report.extraction_workers[0].display_name, "/evidence/worker_0.img");

    let metrics = Client::new()
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("plumbline_extracted_events 5"));

    coordinator.kill().await.ok();
}

#[tokio::test]
async fn test_unknown_function_is_remote_call_error() {
    let port = get_available_port();
    let config = write_config(&test_config(port, 300));
    let mut coordinator = spawn_coordinator(config.path()).await;
    assert!(wait_for_coordinator(port, 40).await);

    let client = HttpProxyClient::new("127.0.0.1".parse().unwrap(), port, Duration::from_secs(5))
        .unwrap();
    client.open().await.unwrap();

    let err = client.call("get_nothing", json!(null)).await.unwrap_err();
    assert!(matches!(err, ProxyError::RemoteCall { ref name, .. } if name == "get_nothing"));

    let err = client
        .call("update_storage_writer_status", json!({ "events": 1 }))
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyError::RemoteCall { .. }));

    coordinator.kill().await.ok();
}

#[tokio::test]
async fn test_exits_successfully_after_processing_completed() {
    let port = get_available_port();
    let config = write_config(&test_config(port, 300));
    let mut coordinator = spawn_coordinator(config.path()).await;
    assert!(wait_for_coordinator(port, 40).await);

    let reporter = reporter(port);
    reporter
        .report_collector(&collector(3, ProcessingState::Completed))
        .await
        .unwrap();
    reporter
        .report_extraction_worker(&worker("worker_0", 5, 2))
        .await
        .unwrap();
    reporter
        .report_extraction_worker(&worker("worker_1", 7, 1))
        .await
        .unwrap();
    reporter.report_storage_writer(12).await.unwrap();
    assert!(!reporter.processing_completed().await.unwrap());

    // Final updates without new events
    reporter
        .report_extraction_worker(&worker("worker_0", 5, 2))
        .await
        .unwrap();
    reporter
        .report_extraction_worker(&worker("worker_1", 7, 1))
        .await
        .unwrap();

    let status = timeout(Duration::from_secs(10), coordinator.wait())
        .await
        .expect("Coordinator did not exit after completion")
        .expect("Failed to wait for coordinator");
    assert!(status.success());
}

#[tokio::test]
async fn test_exits_with_error_when_stalled() {
    let port = get_available_port();
    let config = write_config(&test_config(port, 1));
    let mut coordinator = spawn_coordinator(config.path()).await;
    assert!(wait_for_coordinator(port, 40).await);

    reporter(port)
        .report_extraction_worker(&worker("worker_0", 1, 1))
        .await
        .unwrap();

    let status = timeout(Duration::from_secs(10), coordinator.wait())
        .await
        .expect("Coordinator did not exit after stalling")
        .expect("Failed to wait for coordinator");
    assert!(!status.success());
}

#[tokio::test]
async fn test_port_from_environment() {
    let port = get_available_port();
    let config = write_config(
        r#"
[monitor]
poll_interval_ms = 50
"#,
    );

    let mut coordinator = tokio::process::Command::new(env!("CARGO_BIN_EXE_plumbline"))
        .env("PLUMBLINE_CONFIG", config.path())
        .env("PLUMBLINE_SERVER__PORT", port.to_string())
        .env("RUST_LOG", "error")
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn coordinator");

    assert!(
        wait_for_coordinator(port, 40).await,
        "Coordinator did not listen on the environment port"
    );

    coordinator.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_plumbline"))
            .env("PLUMBLINE_CONFIG", "/nonexistent/plumbline.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_invalid_config_exits_with_error() {
    let config = write_config(
        r#"
[monitor]
poll_interval_ms = 0
"#,
    );

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_plumbline"))
            .env("PLUMBLINE_CONFIG", config.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_port_in_use_exits_with_error() {
    let taken = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let config = write_config(&test_config(port, 300));

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_plumbline"))
            .env("PLUMBLINE_CONFIG", config.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
    drop(taken);
}
