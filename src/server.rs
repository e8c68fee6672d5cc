//! HTTP surface: `POST /ask` and `GET /health/ollama`.
//!
//! Thin adapter over [`crate::ask::ask`]: handlers parse the multipart body,
//! call the orchestrator and turn a [`DocQaError`] into a JSON error body with
//! the status from [`DocQaError::status_code`].

use crate::ask::{self, AskContext, Upload};
use crate::config::ServiceConfig;
use crate::error::{DocQaError, ExtractError, ModelError};
use crate::output::AnswerBody;
use crate::pipeline::extract::SUPPORTED_EXTENSIONS;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct AskResponse {
    answer: AnswerBody,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suportados: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detalhes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum HealthResponse {
    Ok { models_available: Vec<String> },
    Error { message: String },
}

impl IntoResponse for DocQaError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let suportados = match &self {
            DocQaError::Extraction(ExtractError::UnsupportedFormat { .. }) => {
                Some(SUPPORTED_EXTENSIONS.to_vec())
            }
            _ => None,
        };
        let detalhes = match &self {
            DocQaError::Model(ModelError::BackendError { body, .. }) => Some(body.clone()),
            DocQaError::Model(ModelError::Unreachable { reason, .. }) => Some(reason.clone()),
            DocQaError::Model(ModelError::ProviderError { detail, .. }) => Some(detail.clone()),
            _ => None,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                suportados,
                detalhes,
            }),
        )
            .into_response()
    }
}

/// Build the router around a shared request context.
pub fn router(ctx: Arc<AskContext>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/ask", post(handle_ask))
        .route("/health/ollama", get(handle_health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(ctx)
}

/// Bind `config.bind_addr` and serve until Ctrl-C.
pub async fn serve(config: &ServiceConfig) -> Result<(), DocQaError> {
    let ctx = Arc::new(AskContext::from_config(config)?);
    let app = router(ctx, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str()).await?;
    info!(
        addr = %config.bind_addr,
        model = %config.generation.model,
        "docqa server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn handle_ask(State(ctx): State<Arc<AskContext>>, multipart: Multipart) -> Response {
    let (upload, question) = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => return reject(e),
    };

    match ask::ask(&upload, &question, &ctx).await {
        Ok(answer) => (StatusCode::OK, Json(AskResponse { answer })).into_response(),
        Err(e) => reject(e),
    }
}

async fn handle_health(State(ctx): State<Arc<AskContext>>) -> Json<HealthResponse> {
    Json(match ctx.client.health().await {
        Ok(models_available) => HealthResponse::Ok { models_available },
        Err(e) => HealthResponse::Error {
            message: e.to_string(),
        },
    })
}

fn reject(e: DocQaError) -> Response {
    warn!(status = e.status_code().as_u16(), "Request failed: {}", e);
    e.into_response()
}

/// Pull the `file` and `question` fields out of the multipart body.
async fn read_form(mut multipart: Multipart) -> Result<(Upload, String), DocQaError> {
    let mut upload: Option<Upload> = None;
    let mut question: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(form_error(e)),
        };
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field.bytes().await.map_err(form_error)?;
                upload = Some(Upload::new(filename, bytes.to_vec()));
            }
            "question" => {
                question = Some(field.text().await.map_err(form_error)?);
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| DocQaError::MissingField("file".into()))?;
    let question = question.ok_or_else(|| DocQaError::MissingField("question".into()))?;
    Ok((upload, question))
}

/// Over-limit bodies surface as multipart errors; keep their 413.
fn form_error(e: MultipartError) -> DocQaError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        DocQaError::PayloadTooLarge(e.body_text())
    } else {
        DocQaError::InvalidRequest(e.body_text())
    }
}
