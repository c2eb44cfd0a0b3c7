use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{Value, json};
use shield_sync::api::{ApiError, HttpScanApi, ScanApi};
use shield_sync::model::{ScanStatus, Severity};

#[derive(Clone, Default)]
struct Backend {
    seen: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl Backend {
    fn record(&self, what: String, headers: &HeaderMap) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.seen.lock().push((what, auth));
    }
}

async fn create_scan(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    backend.record(format!("create {}", body["target"]), &headers);
    Json(json!({ "scan_id": "abc123" }))
}

async fn history(State(backend): State<Backend>, headers: HeaderMap) -> impl IntoResponse {
    backend.record("history".into(), &headers);
    Json(json!({
        "scans": [
            { "scan_id": "abc123", "target": "example.com", "status": "completed",
              "vulnerabilities": [{ "title": "XSS", "severity": "High" }] },
            { "scan_id": "def456", "target": "internal.test", "status": "running" }
        ]
    }))
}

async fn scan_status(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> axum::response::Response {
    backend.record(format!("status {id}"), &headers);
    match id.as_str() {
        "abc123" => Json(json!({
            "status": "completed",
            "results": { "vulnerabilities": [{
                "title": "SQLi",
                "description": "Unsanitised input in /login",
                "severity": "Critical",
                "solution": "Use parameterised queries",
                "compliance": ["ISO 27001: A.14.2.6", "not-a-tag"]
            }]}
        }))
        .into_response(),
        "queued1" => Json(json!({ "status": "queued" })).into_response(),
        "garbage" => "definitely not json".into_response(),
        "broken" => {
            (StatusCode::INTERNAL_SERVER_ERROR, "database down").into_response()
        }
        _ => (StatusCode::NOT_FOUND, "scan not found").into_response(),
    }
}

async fn serve(backend: Backend) -> String {
    let app = Router::new()
        .route("/api/v1/scans", get(history).post(create_scan))
        .route("/api/v1/scans/{id}", get(scan_status))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn create_scan_posts_target_with_bearer_token() {
    let backend = Backend::default();
    let base = serve(backend.clone()).await;
    let api = HttpScanApi::new(&base).unwrap().with_token("t0ken");

    let scan_id = api.create_scan("  example.com ").await.unwrap();
    assert_eq!(scan_id, "abc123");

    let seen = backend.seen.lock().clone();
    assert_eq!(
        seen,
        vec![(
            "create \"example.com\"".to_string(),
            Some("Bearer t0ken".to_string())
        )]
    );
}

#[tokio::test]
async fn empty_target_is_rejected_locally() {
    let backend = Backend::default();
    let base = serve(backend.clone()).await;
    let api = HttpScanApi::new(&base).unwrap();

    assert!(matches!(api.create_scan("   ").await, Err(ApiError::EmptyTarget)));
    assert!(backend.seen.lock().is_empty());
}

#[tokio::test]
async fn completed_status_carries_findings() {
    let base = serve(Backend::default()).await;
    let api = HttpScanApi::new(&base).unwrap();

    let job = api.scan_status("abc123").await.unwrap();
    assert_eq!(job.id, "abc123");
    assert_eq!(job.status, ScanStatus::Completed);
    assert_eq!(job.findings.len(), 1);

    let finding = &job.findings[0];
    assert_eq!(finding.severity, Severity::Critical);
    assert_eq!(finding.solution.as_deref(), Some("Use parameterised queries"));
    assert_eq!(finding.compliance.len(), 1);
    assert_eq!(finding.compliance[0].control(), "A.14.2.6");

    let queued = api.scan_status("queued1").await.unwrap();
    assert_eq!(queued.status, ScanStatus::Queued);
    assert!(queued.findings.is_empty());
}

#[tokio::test]
async fn error_statuses_keep_the_body() {
    let base = serve(Backend::default()).await;
    let api = HttpScanApi::new(&base).unwrap();

    match api.scan_status("nope").await {
        Err(ApiError::Status { status, body }) => {
            assert_eq!(status, 404);
            assert_eq!(body, "scan not found");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let err = api.scan_status("broken").await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let base = serve(Backend::default()).await;
    let api = HttpScanApi::new(&base).unwrap();

    let err = api.scan_status("garbage").await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn history_lists_every_scan() {
    let base = serve(Backend::default()).await;
    let api = HttpScanApi::new(&base).unwrap();

    let jobs = api.scan_history().await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].target, "example.com");
    assert_eq!(jobs[0].findings[0].title, "XSS");
    assert_eq!(jobs[1].status, ScanStatus::Running);
    assert!(jobs[1].findings.is_empty());
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = HttpScanApi::new(&format!("http://{addr}")).unwrap();
    let err = api.scan_history().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    assert!(err.is_transient());
}
