//! Model clients: send the prompt to a generation backend, get raw text back.
//!
//! This module is intentionally thin — prompt wording lives in
//! [`crate::prompts`] and everything done with the answer lives in
//! [`crate::recovery`]. A client only moves text and classifies failures into
//! [`ModelError`].
//!
//! Two backends implement [`ModelClient`]:
//!
//! * [`OllamaClient`] — the local Ollama server (`/api/generate`), the
//!   default.
//! * [`ProviderClient`] — any hosted provider `edgequake-llm` supports
//!   (OpenAI, Anthropic, Gemini, …), selected with `provider_name`.

use crate::config::{GenerationConfig, ServiceConfig};
use crate::error::{DocQaError, ModelError};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// A text-generation backend.
///
/// Implementations must be `Send + Sync`: one client is shared by every
/// request the server handles.
pub trait ModelClient: Send + Sync {
    /// Generate a completion for `prompt`, bounded by the client's timeout.
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, ModelError>>;

    /// Check the backend is up; returns the models it offers.
    fn health(&self) -> BoxFuture<'_, Result<Vec<String>, ModelError>>;
}

// ── Ollama ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    config: GenerationConfig,
}

impl OllamaClient {
    pub fn new(config: GenerationConfig) -> Result<Self, DocQaError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| DocQaError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn generate_inner(&self, prompt: &str) -> Result<String, ModelError> {
        let url = self.url("/api/generate");
        let secs = self.config.timeout_secs;
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                num_predict: self.config.max_tokens,
            },
        };

        let start = Instant::now();
        let response = self
            .http
            .post(&url)
            .json(&body)
            .timeout(Duration::from_secs(secs))
            .send()
            .await
            .map_err(|e| classify(e, &url, secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::BackendError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout { secs }
            } else {
                ModelError::InvalidResponse(e.to_string())
            }
        })?;

        debug!(
            "Ollama {}: {} chars in {:?}",
            self.config.model,
            parsed.response.len(),
            start.elapsed()
        );
        Ok(parsed.response.trim().to_string())
    }

    async fn health_inner(&self) -> Result<Vec<String>, ModelError> {
        let url = self.url("/api/tags");
        let secs = self.config.health_timeout_secs;
        let response = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(secs))
            .send()
            .await
            .map_err(|e| classify(e, &url, secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::BackendError {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

impl ModelClient for OllamaClient {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, ModelError>> {
        Box::pin(self.generate_inner(prompt))
    }

    fn health(&self) -> BoxFuture<'_, Result<Vec<String>, ModelError>> {
        Box::pin(self.health_inner())
    }
}

/// Map a transport-level reqwest error to a [`ModelError`].
fn classify(e: reqwest::Error, url: &str, secs: u64) -> ModelError {
    if e.is_timeout() {
        ModelError::Timeout { secs }
    } else {
        ModelError::Unreachable {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

// ── Hosted providers ─────────────────────────────────────────────────────────

/// Adapter over an `edgequake-llm` provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    provider_name: String,
    config: GenerationConfig,
}

impl ProviderClient {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        provider_name: impl Into<String>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            provider,
            provider_name: provider_name.into(),
            config,
        }
    }

    /// Instantiate a named provider (`openai`, `anthropic`, …) with the
    /// configured model. The API key is read from the environment.
    pub fn from_name(provider_name: &str, config: GenerationConfig) -> Result<Self, DocQaError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, &config.model)
            .map_err(|e| {
                DocQaError::InvalidConfig(format!(
                    "LLM provider '{provider_name}' is not configured: {e}"
                ))
            })?;
        Ok(Self::new(provider, provider_name, config))
    }

    async fn generate_inner(&self, prompt: &str) -> Result<String, ModelError> {
        let secs = self.config.timeout_secs;
        let messages = vec![ChatMessage::user(prompt)];
        let options = CompletionOptions {
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_tokens,
            ..Default::default()
        };

        let call = self.provider.chat(&messages, Some(&options));
        match tokio::time::timeout(Duration::from_secs(secs), call).await {
            Err(_) => Err(ModelError::Timeout { secs }),
            Ok(Err(e)) => Err(ModelError::ProviderError {
                provider: self.provider_name.clone(),
                detail: e.to_string(),
            }),
            Ok(Ok(response)) => {
                debug!(
                    "{} {}: {} input tokens, {} output tokens",
                    self.provider_name,
                    self.config.model,
                    response.prompt_tokens,
                    response.completion_tokens
                );
                Ok(response.content.trim().to_string())
            }
        }
    }
}

impl ModelClient for ProviderClient {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, ModelError>> {
        Box::pin(self.generate_inner(prompt))
    }

    fn health(&self) -> BoxFuture<'_, Result<Vec<String>, ModelError>> {
        let model = self.config.model.clone();
        Box::pin(async move { Ok(vec![model]) })
    }
}

/// Call `client.generate`, retrying retryable failures with exponential
/// backoff (`backoff_ms`, then ×2 per attempt).
///
/// Timeouts are not retried: the request already used its full budget.
pub async fn generate_with_retry(
    client: &dyn ModelClient,
    prompt: &str,
    max_retries: u32,
    backoff_ms: u64,
) -> Result<String, ModelError> {
    let mut attempt = 0;
    loop {
        match client.generate(prompt).await {
            Ok(text) => return Ok(text),
            Err(e) if attempt < max_retries && e.is_retryable() => {
                attempt += 1;
                let backoff = backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Model call failed ({}); retry {}/{} after {}ms",
                    e, attempt, max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Resolve the model client, from most-specific to least-specific.
///
/// 1. **Pre-built client** (`config.client`) — used as-is (tests, custom
///    middleware).
/// 2. **Named provider** (`config.provider_name`) — hosted provider through
///    `edgequake-llm`, API key from the environment.
/// 3. **Ollama** at `config.generation.base_url`.
pub fn resolve_client(config: &ServiceConfig) -> Result<Arc<dyn ModelClient>, DocQaError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    if let Some(ref name) = config.provider_name {
        if !name.eq_ignore_ascii_case("ollama") {
            return Ok(Arc::new(ProviderClient::from_name(
                name,
                config.generation.clone(),
            )?));
        }
    }

    Ok(Arc::new(OllamaClient::new(config.generation.clone())?))
}
