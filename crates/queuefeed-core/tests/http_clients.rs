use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use queuefeed_core::config::Settings;
use queuefeed_core::dune::{CsvUpload, DuneClient, TableUploader, UploadError, UPLOAD_CSV_PATH};
use queuefeed_core::http::build_client;
use queuefeed_core::secret::SecretString;
use queuefeed_core::source::{HttpRecordSource, RecordSource, SourceError};
use queuefeed_core::{Job, JobContext, JobOutcome, Trigger};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../queuefeed-parser/tests/data")
        .join(name);
    std::fs::read_to_string(path).expect("read fixture")
}

async fn serve(router: Router) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service()).await.ok();
    });
    Ok(format!("http://{addr}"))
}

async fn accept_upload(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let key = headers
        .get("x-dune-api-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    captured.lock().unwrap().push((key, body));
    Json(json!({ "success": true, "table_name": "dataset_eth_validator_queue_metrics" }))
}

async fn reject_upload() -> Json<Value> {
    Json(json!({ "success": false, "message": "table limit reached" }))
}

async fn unauthorized() -> impl IntoResponse {
    (StatusCode::UNAUTHORIZED, "invalid API Key")
}

fn mock_dune(captured: Captured) -> Router {
    Router::new()
        .route(UPLOAD_CSV_PATH, post(accept_upload))
        .route("/historical_data.json", get(|| async { fixture("historical_sample.json") }))
        .with_state(captured)
}

fn client() -> reqwest::Client {
    build_client(Duration::from_secs(5)).expect("client")
}

fn sample_upload() -> CsvUpload {
    CsvUpload {
        table_name: "eth_validator_queue_metrics".into(),
        description: "test".into(),
        data: "date,validators\n2024-03-01,1\n".into(),
        is_private: false,
        rows: 1,
    }
}

#[tokio::test]
async fn dune_client_sends_key_header_and_json_body() -> Result<()> {
    let captured = Captured::default();
    let base = serve(mock_dune(captured.clone())).await?;
    let dune = DuneClient::with_client(&base, client());

    let receipt = dune
        .upload(&SecretString::new("key-abc"), &sample_upload())
        .await?;

    assert_eq!(
        receipt.table_name.as_deref(),
        Some("dataset_eth_validator_queue_metrics")
    );
    assert_eq!(receipt.bytes, sample_upload().data.len());
    assert_eq!(receipt.content_hash.len(), 64);
    assert_eq!(receipt.rows, 1);

    let requests = captured.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let (key, body) = &requests[0];
    assert_eq!(key.as_deref(), Some("key-abc"));
    assert_eq!(body["table_name"], "eth_validator_queue_metrics");
    assert_eq!(body["description"], "test");
    assert_eq!(body["data"], "date,validators\n2024-03-01,1\n");
    assert_eq!(body["is_private"], false);
    assert!(body.get("rows").is_none());
    Ok(())
}

#[tokio::test]
async fn dune_client_surfaces_explicit_rejection() -> Result<()> {
    let base = serve(Router::new().route(UPLOAD_CSV_PATH, post(reject_upload))).await?;
    let dune = DuneClient::with_client(&base, client());

    let err = dune
        .upload(&SecretString::new("key"), &sample_upload())
        .await
        .unwrap_err();

    match err {
        UploadError::Rejected(reason) => assert_eq!(reason, "table limit reached"),
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn dune_client_reports_http_status() -> Result<()> {
    let base = serve(Router::new().route(UPLOAD_CSV_PATH, post(unauthorized))).await?;
    let dune = DuneClient::with_client(&base, client());

    let err = dune
        .upload(&SecretString::new("wrong"), &sample_upload())
        .await
        .unwrap_err();

    match err {
        UploadError::Status { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid API Key");
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn http_source_loads_records() -> Result<()> {
    let base = serve(mock_dune(Captured::default())).await?;
    let source = HttpRecordSource::new(format!("{base}/historical_data.json"), client());

    let records = source.fetch().await?;
    assert_eq!(records.len(), 5);
    Ok(())
}

#[tokio::test]
async fn http_source_fails_on_error_status() -> Result<()> {
    let base = serve(mock_dune(Captured::default())).await?;
    let source = HttpRecordSource::new(format!("{base}/missing.json"), client());

    match source.fetch().await.unwrap_err() {
        SourceError::Status { status, .. } => assert_eq!(status, 404),
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn scheduled_run_uploads_cleaned_table_end_to_end() -> Result<()> {
    let captured = Captured::default();
    let base = serve(mock_dune(captured.clone())).await?;
    let dir = TempDir::new()?;

    let mut settings = Settings::default();
    settings.source_url = format!("{base}/historical_data.json");
    settings.dune.base_url = base.clone();
    settings.env_file = dir.path().join(".env");

    let http = client();
    let job = Job::upload(
        &settings,
        Arc::new(HttpRecordSource::new(settings.source_url.clone(), http.clone())),
        Arc::new(DuneClient::with_client(&settings.dune.base_url, http)),
    );
    let ctx = JobContext::new(settings.clone(), Some(SecretString::new("ci-secret")));

    let report = job.run(Trigger::Schedule, ctx).await;

    assert_eq!(report.outcome, JobOutcome::Succeeded, "{report:?}");
    assert_eq!(report.receipt.as_ref().map(|receipt| receipt.rows), Some(3));
    let requests = captured.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let (key, body) = &requests[0];
    assert_eq!(key.as_deref(), Some("ci-secret"));
    let data = body["data"].as_str().unwrap_or_default();
    assert_eq!(data.lines().count(), 4);
    assert_eq!(
        std::fs::read_to_string(&settings.env_file)?,
        "DUNE_API_KEY=ci-secret\n"
    );
    Ok(())
}
