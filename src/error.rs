//! Error types for the docqa library.
//!
//! Three layers of errors reflect three distinct failure modes:
//!
//! * [`DocQaError`] — **Fatal for one request**: the question cannot be
//!   answered at all (no file name, unsupported format, empty document, model
//!   backend down). Returned as `Err(DocQaError)` from [`crate::ask::ask`] and
//!   mapped to an HTTP status by [`DocQaError::status_code`].
//!
//! * [`ExtractError`] / [`ModelError`] — failures of the two collaborators
//!   the orchestrator drives. They are wrapped into [`DocQaError`] at the
//!   orchestrator boundary.
//!
//! * [`RecoveryError`] — **Never observable**: control signals between the
//!   tiers of [`crate::recovery::RecoveryPipeline`]. A failed tier only means
//!   "try the next one"; the pipeline itself has no failure mode.

use axum::http::StatusCode;
use thiserror::Error;

/// All fatal per-request errors returned by the docqa library.
#[derive(Debug, Error)]
pub enum DocQaError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The upload carried no file name, so the format cannot be resolved.
    #[error("Uploaded file has no name; a file name with extension is required")]
    MissingFilename,

    /// A required multipart field was absent.
    #[error("Missing required field '{0}'")]
    MissingField(String),

    /// The request body could not be read as a multipart form.
    #[error("Malformed request body: {0}")]
    InvalidRequest(String),

    /// The request body went over the configured upload limit.
    #[error("Upload too large: {0}\nRaise --max-upload-mb to accept bigger documents.")]
    PayloadTooLarge(String),

    // ── Document errors ───────────────────────────────────────────────────
    /// Text extraction failed or the format is not supported.
    #[error(transparent)]
    Extraction(#[from] ExtractError),

    /// Extraction worked but produced (almost) no text.
    #[error("Document is empty or too small: {chars} characters of text (minimum {min})")]
    DocumentTooSmall { chars: usize, min: usize },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The generation backend could not produce a completion.
    #[error(transparent)]
    Model(#[from] ModelError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Staging the upload, reading a local file or binding the listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocQaError {
    /// HTTP status the server answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DocQaError::MissingFilename
            | DocQaError::MissingField(_)
            | DocQaError::InvalidRequest(_)
            | DocQaError::DocumentTooSmall { .. }
            | DocQaError::Extraction(ExtractError::UnsupportedFormat { .. }) => {
                StatusCode::BAD_REQUEST
            }
            DocQaError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            DocQaError::Extraction(ExtractError::ExtractionFailed { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DocQaError::Model(ModelError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            DocQaError::Model(_) => StatusCode::BAD_GATEWAY,
            DocQaError::InvalidConfig(_) | DocQaError::Io(_) | DocQaError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Failures of the text extractor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// The file extension is not one of [`crate::pipeline::extract::SUPPORTED_EXTENSIONS`].
    #[error("Unsupported file format '{extension}'. Supported: .pdf, .docx, .doc, .md")]
    UnsupportedFormat { extension: String },

    /// The file looked like the declared format but could not be read.
    #[error("Failed to extract text from {format} document: {detail}")]
    ExtractionFailed { format: String, detail: String },
}

/// Failures of the generation backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    /// No complete response within the configured timeout.
    #[error("Model request timed out after {secs}s\nIncrease --api-timeout for long documents.")]
    Timeout { secs: u64 },

    /// The backend could not be reached at all (connection refused, DNS, …).
    #[error("Model backend unreachable at '{url}': {reason}\nIs the server running?")]
    Unreachable { url: String, reason: String },

    /// The backend answered with a non-success HTTP status.
    #[error("Model backend returned status {status}")]
    BackendError { status: u16, body: String },

    /// The backend answered 200 but the body was not what we expected.
    #[error("Unexpected model response: {0}")]
    InvalidResponse(String),

    /// A hosted provider reported a failure.
    #[error("Provider '{provider}' failed: {detail}")]
    ProviderError { provider: String, detail: String },
}

impl ModelError {
    /// Transient failures worth retrying: connection problems and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::Unreachable { .. } => true,
            ModelError::BackendError { status, .. } => *status >= 500,
            ModelError::Timeout { .. }
            | ModelError::InvalidResponse(_)
            | ModelError::ProviderError { .. } => false,
        }
    }
}

/// Why a single recovery tier gave up.
///
/// Internal to [`crate::recovery`]; surfaced only as the diagnostic of an
/// unrecoverable outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecoveryError {
    /// The text is not a JSON document.
    #[error("parse failure: {0}")]
    ParseFailure(String),

    /// Parsed, but there is no `perguntas` object at the top level.
    #[error("no 'perguntas' object in document")]
    MissingField,

    /// A `perguntas` entry is not a usable question.
    #[error("entry '{key}' rejected: {reason}")]
    InvalidEntry { key: String, reason: String },

    /// The `perguntas` object has no entries.
    #[error("'perguntas' object is empty")]
    EmptySet,

    /// Pattern extraction found nothing that looks like a question.
    #[error("no question-shaped text found")]
    NoMatchFound,

    /// A cleanup rule could not apply to this text.
    #[error("cleanup rule '{rule}' skipped: {reason}")]
    RuleSkipped { rule: &'static str, reason: String },

    /// A tier panicked; caught at the pipeline boundary.
    #[error("tier '{0}' panicked")]
    Panicked(&'static str),
}
