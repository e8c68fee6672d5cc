//! Pipeline stages that surround answer recovery.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ extract ──▶ prompt ──▶ llm ──▶ recovery
//! (bytes)   (pdfium/    (truncate) (Ollama/ (tiers 1-4)
//!            docx-rs)              provider)
//! ```
//!
//! 1. [`extract`] — plain text from PDF, DOCX or Markdown; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 2. [`llm`]     — the model call with timeout and retry/backoff; the only
//!    stage with network I/O
//!
//! Prompt building lives in [`crate::prompts`] and recovery in
//! [`crate::recovery`].

pub mod extract;
pub mod llm;
