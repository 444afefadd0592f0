//! Smoke tests for the `cvlens-submit` binary against a live gateway.

use std::{path::Path, process::Output, sync::Arc, time::Duration};

use cvlens::{
    api,
    gateway::{GatewayConfig, UpstreamGateway},
    metrics::GatewayMetrics,
};
use httpmock::{Method::POST, MockServer};
use serde_json::{Value, json};
use tokio::{net::TcpListener, process::Command};

async fn spawn_gateway(upstream: &MockServer) -> String {
    let gateway = UpstreamGateway::new(GatewayConfig {
        base_url: upstream.base_url(),
        api_key: "sk-cli".into(),
        model: "gpt-3.5-turbo".into(),
        timeout: Duration::from_secs(5),
    })
    .expect("gateway");
    let app = api::create_router(Arc::new(gateway), Arc::new(GatewayMetrics::new()));

    let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

async fn run_cli(file: &Path, gateway_url: &str) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cvlens-submit"))
        .arg(file)
        .args(["--gateway-url", gateway_url])
        .env_remove("RUST_LOG")
        .output()
        .await
        .expect("run cvlens-submit")
}

#[tokio::test]
async fn submit_prints_results_and_progress() {
    let upstream = MockServer::start_async().await;
    let body = json!({
        "id": "chatcmpl-cli",
        "choices": [{ "message": { "role": "assistant", "content": "Strong profile." } }]
    });
    let mock = upstream
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("Analyze this CV: Jane Doe");
            then.status(200).json_body(body.clone());
        })
        .await;
    let gateway_url = spawn_gateway(&upstream).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("jane-doe.txt");
    std::fs::write(&file, "Jane Doe\nStaff Engineer").expect("write cv");

    let output = run_cli(&file, &gateway_url).await;
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr: {stderr}");

    let printed: Value = serde_json::from_slice(&output.stdout).expect("stdout is json");
    assert_eq!(printed, body);
    assert!(stderr.contains("Submitting document for analysis..."), "stderr: {stderr}");
    assert!(stderr.contains("Analysis complete."), "stderr: {stderr}");
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn submit_exits_nonzero_on_rejected_document() {
    let upstream = MockServer::start_async().await;
    let mock = upstream
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({}));
        })
        .await;
    let gateway_url = spawn_gateway(&upstream).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("photo.png");
    std::fs::write(&file, [0x89, b'P', b'N', b'G']).expect("write image");

    let output = run_cli(&file, &gateway_url).await;
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(1), "stderr: {stderr}");
    assert!(output.stdout.is_empty());
    assert!(stderr.contains("error: invalid input"), "stderr: {stderr}");
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn submit_reports_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = run_cli(&dir.path().join("absent.pdf"), "http://127.0.0.1:9").await;

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(1), "stderr: {stderr}");
    assert!(stderr.contains("error: failed to load"), "stderr: {stderr}");
}
