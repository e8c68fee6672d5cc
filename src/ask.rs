//! Request orchestration: one uploaded document plus one question in, one
//! answer body out.
//!
//! The HTTP handler and the `docqa ask` subcommand both end up here, so the
//! request lifecycle (format check, staging, extraction, prompt, model call,
//! recovery) is written once.

use crate::config::ServiceConfig;
use crate::error::DocQaError;
use crate::output::AnswerBody;
use crate::pipeline::extract::{self, DocumentFormat};
use crate::pipeline::llm::{self, ModelClient};
use crate::prompts::PromptBuilder;
use crate::recovery::RecoveryPipeline;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// An uploaded document.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    /// Client-supplied file name; only its extension is used.
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a local file, keeping its name for format detection.
    pub fn from_path(path: &Path) -> Result<Self, DocQaError> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { filename, bytes })
    }
}

/// Everything a request needs that outlives it. Built once, shared by
/// every request.
pub struct AskContext {
    pub prompts: PromptBuilder,
    pub client: Arc<dyn ModelClient>,
    pub recovery: RecoveryPipeline,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub min_document_chars: usize,
}

impl AskContext {
    /// Build the context, resolving the model client from `config`.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, DocQaError> {
        let client = llm::resolve_client(config)?;
        Ok(Self::with_client(config, client))
    }

    /// Build the context around an explicit client.
    pub fn with_client(config: &ServiceConfig, client: Arc<dyn ModelClient>) -> Self {
        Self {
            prompts: PromptBuilder::new(config.prompt.clone()),
            client,
            recovery: RecoveryPipeline::default(),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            min_document_chars: config.min_document_chars,
        }
    }
}

impl std::fmt::Debug for AskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AskContext")
            .field("prompts", &self.prompts)
            .field("recovery", &self.recovery)
            .field("max_retries", &self.max_retries)
            .field("min_document_chars", &self.min_document_chars)
            .finish_non_exhaustive()
    }
}

/// Answer `question` about the uploaded document.
///
/// # Errors
/// Returns `Err(DocQaError)` only when no answer can be produced at all:
/// - no file name, or an unsupported extension
/// - extraction failed, or the document has (almost) no text
/// - the model backend timed out or failed
///
/// A malformed model answer is *not* an error: it is repaired or replaced by
/// the recovery pipeline, and the outcome is reported in
/// [`AnswerBody::recovery`].
pub async fn ask(upload: &Upload, question: &str, ctx: &AskContext) -> Result<AnswerBody, DocQaError> {
    let total_start = Instant::now();

    // ── Step 1: Validate request ─────────────────────────────────────────
    if upload.filename.trim().is_empty() {
        return Err(DocQaError::MissingFilename);
    }
    if question.trim().is_empty() {
        return Err(DocQaError::MissingField("question".into()));
    }
    let format = DocumentFormat::from_filename(&upload.filename)?;
    info!(
        "Question about '{}' ({}, {} bytes)",
        upload.filename,
        format,
        upload.bytes.len()
    );

    // ── Step 2: Stage upload and extract text ────────────────────────────
    let text = stage_and_extract(&upload.bytes, format).await?;
    let chars = text.trim().chars().count();
    if chars < ctx.min_document_chars {
        return Err(DocQaError::DocumentTooSmall {
            chars,
            min: ctx.min_document_chars,
        });
    }
    debug!("Extracted {} chars", chars);

    // ── Step 3: Build prompt ─────────────────────────────────────────────
    let prompt = ctx.prompts.build(question, &text);

    // ── Step 4: Call the model ───────────────────────────────────────────
    let llm_start = Instant::now();
    let raw = llm::generate_with_retry(
        ctx.client.as_ref(),
        &prompt,
        ctx.max_retries,
        ctx.retry_backoff_ms,
    )
    .await?;
    debug!(
        "Model answered {} chars in {}ms",
        raw.len(),
        llm_start.elapsed().as_millis()
    );

    // ── Step 5: Recover structured answer ────────────────────────────────
    let outcome = ctx.recovery.recover(&raw);
    if !outcome.is_success() {
        warn!(
            "Answer for '{}' recovered at {} ({} questions)",
            upload.filename,
            outcome.tier(),
            outcome.questions().len()
        );
    }

    info!(
        "Answered '{}' in {}ms",
        upload.filename,
        total_start.elapsed().as_millis()
    );
    Ok(outcome.into_answer())
}

/// Write the bytes to a temp file with the format's extension and extract
/// its text on the blocking pool. The file is removed when this returns.
async fn stage_and_extract(bytes: &[u8], format: DocumentFormat) -> Result<String, DocQaError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("docqa-")
        .suffix(format.extension())
        .tempfile()?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    let path = tmp.path().to_path_buf();

    let result = tokio::task::spawn_blocking(move || extract::extract_text(&path, format))
        .await
        .map_err(|e| DocQaError::Internal(format!("extraction task failed: {e}")))?;

    // `tmp` is dropped (and the file deleted) here, after the blocking task
    // has finished reading it.
    drop(tmp);
    result.map_err(|e| {
        warn!("Extraction failed: {}", e);
        DocQaError::from(e)
    })
}
