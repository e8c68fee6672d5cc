//! HTTP handler tests.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot` against
//! a scripted model client, so neither a socket nor Ollama is needed.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use docqa::server::router;
use docqa::{AskContext, ModelClient, ModelError, ServiceConfig};
use futures::future::BoxFuture;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

const BOUNDARY: &str = "docqa-test-boundary";

/// Answers every prompt with the same scripted result.
struct Scripted {
    generate: Result<String, ModelError>,
    health: Result<Vec<String>, ModelError>,
}

impl Scripted {
    fn answering(raw: &str) -> Self {
        Self {
            generate: Ok(raw.to_string()),
            health: Ok(vec!["llama3:latest".to_string()]),
        }
    }

    fn failing(e: ModelError) -> Self {
        Self {
            generate: Err(e.clone()),
            health: Err(e),
        }
    }
}

impl ModelClient for Scripted {
    fn generate<'a>(&'a self, _prompt: &'a str) -> BoxFuture<'a, Result<String, ModelError>> {
        let reply = self.generate.clone();
        Box::pin(async move { reply })
    }

    fn health(&self) -> BoxFuture<'_, Result<Vec<String>, ModelError>> {
        let reply = self.health.clone();
        Box::pin(async move { reply })
    }
}

fn app(client: Scripted) -> axum::Router {
    app_with_limit(client, ServiceConfig::default().max_upload_bytes)
}

fn app_with_limit(client: Scripted, max_upload_bytes: usize) -> axum::Router {
    // RUST_LOG=docqa=debug shows the orchestrator's logs for a failing test.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let config = ServiceConfig::default();
    let ctx = AskContext::with_client(&config, Arc::new(client));
    router(Arc::new(ctx), max_upload_bytes)
}

/// Multipart body with an optional file part and an optional question part.
fn multipart(file: Option<(&str, &str)>, question: Option<&str>) -> Request<Body> {
    let mut body = String::new();
    if let Some(q) = question {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"question\"\r\n\r\n{q}\r\n"
        ));
    }
    if let Some((filename, content)) = file {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method("POST")
        .uri("/ask")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

const DOCUMENT: &str = "# Relatório anual\n\nA empresa cresceu 12% no período.";

// ── POST /ask ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ask_returns_answer_body() {
    let app = app(Scripted::answering(
        r#"{"perguntas": {"pergunta_1": "Quanto a empresa cresceu?"}}"#,
    ));
    let (status, body) = send(
        app,
        multipart(Some(("relatorio.md", DOCUMENT)), Some("perguntas de revisão")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["answer"]["perguntas"]["pergunta_1"],
        "Quanto a empresa cresceu?"
    );
    assert_eq!(body["answer"]["recovery"]["status"], "success");
}

#[tokio::test]
async fn ask_reports_degraded_recovery() {
    let app = app(Scripted::answering(
        r#"{"perguntas": {"pergunta_1": "What is the scope"#,
    ));
    let (status, body) = send(app, multipart(Some(("relatorio.md", DOCUMENT)), Some("q"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"]["recovery"]["status"], "degraded");
    assert_eq!(body["answer"]["recovery"]["tier"], 2);
    assert_eq!(
        body["answer"]["perguntas"]["pergunta_1"],
        "What is the scope"
    );
}

#[tokio::test]
async fn ask_rejects_unsupported_format() {
    let app = app(Scripted::answering("{}"));
    let (status, body) = send(app, multipart(Some(("planilha.xlsx", "x")), Some("q"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let supported: Vec<&str> = body["suportados"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(supported, [".pdf", ".docx", ".doc", ".md"]);
}

#[tokio::test]
async fn ask_requires_file_and_question() {
    let (status, body) = send(
        app(Scripted::answering("{}")),
        multipart(None, Some("q")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("file"));

    let (status, body) = send(
        app(Scripted::answering("{}")),
        multipart(Some(("relatorio.md", DOCUMENT)), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("question"));
}

#[tokio::test]
async fn ask_rejects_tiny_document() {
    let app = app(Scripted::answering("{}"));
    let (status, body) = send(app, multipart(Some(("vazio.md", "  ok ")), Some("q"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("too small"));
}

#[tokio::test]
async fn model_timeout_is_gateway_timeout() {
    let app = app(Scripted::failing(ModelError::Timeout { secs: 120 }));
    let (status, body) = send(app, multipart(Some(("relatorio.md", DOCUMENT)), Some("q"))).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body["error"].as_str().unwrap().contains("120s"));
}

#[tokio::test]
async fn backend_error_is_bad_gateway_with_details() {
    let app = app(Scripted::failing(ModelError::BackendError {
        status: 404,
        body: "model 'llama3' not found".into(),
    }));
    let (status, body) = send(app, multipart(Some(("relatorio.md", DOCUMENT)), Some("q"))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["detalhes"], "model 'llama3' not found");
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let app = app_with_limit(Scripted::answering("{}"), 1024);
    let document = "a".repeat(4096);
    let (status, body) = send(app, multipart(Some(("grande.md", &document)), Some("q"))).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].as_str().unwrap().starts_with("Upload too large"));
}

// ── GET /health/ollama ───────────────────────────────────────────────────────

fn health_request() -> Request<Body> {
    Request::builder()
        .uri("/health/ollama")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_lists_models() {
    let (status, body) = send(app(Scripted::answering("")), health_request()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["models_available"][0], "llama3:latest");
}

#[tokio::test]
async fn health_reports_errors_with_200() {
    let app = app(Scripted::failing(ModelError::Unreachable {
        url: "http://localhost:11434/api/tags".into(),
        reason: "connection refused".into(),
    }));
    let (status, body) = send(app, health_request()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("connection refused"));
}
