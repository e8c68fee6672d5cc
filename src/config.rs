//! Configuration types for the question-answering service.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. The sampling parameters and prompt limits live
//! in two small immutable values, [`GenerationConfig`] and [`PromptConfig`],
//! which are handed to the model client and prompt builder when they are
//! constructed. Nothing reads process-wide mutable settings at request time.

use crate::error::DocQaError;
use crate::pipeline::llm::ModelClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default local model.
pub const DEFAULT_MODEL: &str = "llama3";

/// Limits applied when building the generation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Characters of document text sent to the model. Default: 3000.
    ///
    /// Hard cut, not word-aware: anything after this many characters is never
    /// seen by the model. Small local models have 4–8k-token contexts; 3000
    /// characters leaves room for the instructions and the answer.
    pub max_context_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 3000,
        }
    }
}

/// Sampling parameters and limits for the generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the Ollama server. Default: `http://localhost:11434`.
    pub base_url: String,

    /// Model name. Default: `llama3`.
    pub model: String,

    /// Sampling temperature. Default: 0.3.
    ///
    /// Low enough that the model sticks to the JSON format, high enough that
    /// the three questions are not paraphrases of each other.
    pub temperature: f32,

    /// Nucleus sampling cut-off. Default: 0.9.
    pub top_p: f32,

    /// Maximum tokens generated per answer, when the backend honours it.
    pub max_tokens: Option<usize>,

    /// Seconds before a generation request is abandoned. Default: 120.
    ///
    /// CPU-only Ollama installs can take over a minute for a 3000-character
    /// context; shorter timeouts mostly produce spurious failures.
    pub timeout_secs: u64,

    /// Seconds allowed for the `/api/tags` health probe. Default: 5.
    pub health_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            top_p: 0.9,
            max_tokens: None,
            timeout_secs: 120,
            health_timeout_secs: 5,
        }
    }
}

/// Configuration for the whole service.
///
/// Built via [`ServiceConfig::builder()`] or using [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use docqa::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .model("llama3.1")
///     .temperature(0.2)
///     .max_context_chars(4000)
///     .build()
///     .unwrap();
/// assert_eq!(config.prompt.max_context_chars, 4000);
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    pub prompt: PromptConfig,
    pub generation: GenerationConfig,

    /// Hosted provider name for the `edgequake-llm` backend (e.g. "openai").
    /// If None along with `client`, the Ollama backend is used.
    pub provider_name: Option<String>,

    /// Pre-constructed model client. Takes precedence over everything else.
    pub client: Option<Arc<dyn ModelClient>>,

    /// Extra attempts on a retryable model failure. Default: 0.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Documents whose extracted text is shorter than this (trimmed) are
    /// rejected before calling the model. Default: 10.
    pub min_document_chars: usize,

    /// Maximum accepted upload size in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Address the HTTP server binds to. Default: `0.0.0.0:8000`.
    pub bind_addr: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            prompt: PromptConfig::default(),
            generation: GenerationConfig::default(),
            provider_name: None,
            client: None,
            max_retries: 0,
            retry_backoff_ms: 500,
            min_document_chars: 10,
            max_upload_bytes: 50 * 1024 * 1024,
            bind_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("prompt", &self.prompt)
            .field("generation", &self.generation)
            .field("provider_name", &self.provider_name)
            .field("client", &self.client.as_ref().map(|_| "<dyn ModelClient>"))
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("min_document_chars", &self.min_document_chars)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn ollama_url(mut self, url: impl Into<String>) -> Self {
        self.config.generation.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.generation.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.config.generation.top_p = p.clamp(0.0, 1.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.generation.max_tokens = Some(n);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.generation.timeout_secs = secs;
        self
    }

    pub fn health_timeout_secs(mut self, secs: u64) -> Self {
        self.config.generation.health_timeout_secs = secs;
        self
    }

    pub fn max_context_chars(mut self, n: usize) -> Self {
        self.config.prompt.max_context_chars = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn min_document_chars(mut self, n: usize) -> Self {
        self.config.min_document_chars = n;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, DocQaError> {
        let c = &self.config;
        if c.prompt.max_context_chars == 0 {
            return Err(DocQaError::InvalidConfig(
                "max_context_chars must be ≥ 1".into(),
            ));
        }
        if c.generation.timeout_secs == 0 {
            return Err(DocQaError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.generation.model.trim().is_empty() {
            return Err(DocQaError::InvalidConfig("model name is empty".into()));
        }
        if !c.generation.base_url.starts_with("http://")
            && !c.generation.base_url.starts_with("https://")
        {
            return Err(DocQaError::InvalidConfig(format!(
                "Ollama URL must start with http:// or https://, got '{}'",
                c.generation.base_url
            )));
        }
        Ok(self.config)
    }
}
