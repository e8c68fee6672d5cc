//! # docqa
//!
//! Ask questions about PDF, DOCX and Markdown documents through a local LLM,
//! and get a well-formed JSON answer back even when the model's output is not.
//!
//! ## Why this crate?
//!
//! Small local models (Llama 3 8B on a laptop CPU) are good at writing
//! questions about a document and bad at writing valid JSON: they wrap it in
//! prose, stop mid-string, forget commas, leave trailing commas. Rejecting
//! those answers makes the service useless; passing them through breaks
//! every client. This crate repairs them instead, in tiers, and reports how
//! much repair was needed.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload + question
//!  │
//!  ├─ 1. Extract   PDF (pdfium) / DOCX (docx-rs) / Markdown → text
//!  ├─ 2. Prompt    instructions + question + first 3000 chars of text
//!  ├─ 3. Model     Ollama /api/generate, or a hosted provider
//!  ├─ 4. Recover   strict → cleanup → pattern → default placeholders
//!  └─ 5. Answer    {"perguntas": {...}, "recovery": {"status", "tier"}}
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use docqa::{recover, RecoveryStatus};
//!
//! // Truncated generation: the closing quote and braces are missing.
//! let raw = r#"{"perguntas": {"pergunta_1": "What is the scope"#;
//! let answer = recover(raw).into_answer();
//! assert_eq!(answer.recovery.status, RecoveryStatus::Degraded);
//! assert_eq!(answer.perguntas.get("pergunta_1"), Some("What is the scope"));
//! ```
//!
//! Serving the HTTP API:
//!
//! ```rust,no_run
//! use docqa::ServiceConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder().model("llama3").build()?;
//!     docqa::server::serve(&config).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docqa` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docqa = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod ask;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod recovery;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use ask::{ask, AskContext, Upload};
pub use config::{GenerationConfig, PromptConfig, ServiceConfig, ServiceConfigBuilder};
pub use error::{DocQaError, ExtractError, ModelError, RecoveryError};
pub use output::{
    default_questions, AnswerBody, Question, QuestionSet, RecoveryOutcome, RecoveryReport,
    RecoveryStatus, Tier,
};
pub use pipeline::llm::{ModelClient, OllamaClient, ProviderClient};
pub use prompts::PromptBuilder;
pub use recovery::{recover, RecoveryPipeline, RecoveryTier};
