//! Structured recovery: turn a raw model completion into a [`QuestionSet`].
//!
//! ## Why is recovery necessary?
//!
//! Even when told to answer with JSON only, small local models regularly
//! return something *almost* right:
//!
//! - prose before or after the object ("Claro! Aqui estão as perguntas: …")
//! - a generation cut off mid-string, losing the closing quote and braces
//! - a missing comma between two fields
//! - a trailing comma before `}`
//! - no object at all, just questions scattered through the text
//!
//! ## Tier Order
//!
//! Tiers run in order and the first success wins. Each one assumes a little
//! more about what the model meant than the one before it:
//!
//! ```text
//! raw ──▶ 1. strict   serde_json as-is
//!     ──▶ 2. cleanup  fail-soft rewrite rules, then serde_json
//!     ──▶ 3. pattern  regex over the raw text
//!     ──▶ 4. default  fixed placeholder questions (cannot fail)
//! ```
//!
//! Tiers 1–3 are [`RecoveryTier`] strategies held in an ordered list, so the
//! policy can be changed with [`RecoveryPipeline::with_tiers`] without
//! touching the loop. Tier 4 is the loop's terminal case.

pub mod cleanup;
pub mod pattern;
pub mod strict;

use crate::error::RecoveryError;
use crate::output::{
    default_questions, is_question_key, QuestionSet, RecoveryOutcome, Tier, QUESTIONS_FIELD,
};
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

pub use cleanup::CleanupReparse;
pub use pattern::PatternExtraction;
pub use strict::StrictParse;

/// One fallback strategy of the pipeline.
///
/// Implementations must be pure: same input, same result, no I/O.
pub trait RecoveryTier: Send + Sync {
    /// Short name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Tier reported in the outcome when this strategy succeeds.
    fn tier(&self) -> Tier;

    /// Try to recover questions from the raw completion.
    fn attempt(&self, raw: &str) -> Result<QuestionSet, RecoveryError>;
}

/// Ordered list of recovery tiers, ending in the static default.
pub struct RecoveryPipeline {
    tiers: Vec<Box<dyn RecoveryTier>>,
}

impl Default for RecoveryPipeline {
    fn default() -> Self {
        Self::with_tiers(vec![
            Box::new(StrictParse),
            Box::new(CleanupReparse::default()),
            Box::new(PatternExtraction::default()),
        ])
    }
}

impl std::fmt::Debug for RecoveryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryPipeline")
            .field(
                "tiers",
                &self.tiers.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl RecoveryPipeline {
    /// Build a pipeline from an explicit tier order.
    pub fn with_tiers(tiers: Vec<Box<dyn RecoveryTier>>) -> Self {
        Self { tiers }
    }

    /// Names of the configured tiers, in order.
    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Run every tier in order; fall back to the placeholder set.
    ///
    /// Never fails and never panics past this boundary.
    pub fn recover(&self, raw: &str) -> RecoveryOutcome {
        let mut last_err: Option<String> = None;

        for tier in &self.tiers {
            let result = catch_unwind(AssertUnwindSafe(|| tier.attempt(raw)))
                .unwrap_or(Err(RecoveryError::Panicked(tier.name())));

            match result {
                Ok(questions) if !questions.is_empty() => {
                    let level = tier.tier();
                    if level == Tier::STRICT {
                        debug!("Recovered {} questions via {}", questions.len(), tier.name());
                        return RecoveryOutcome::Success(questions);
                    }
                    warn!(
                        "Model output needed recovery: {} questions via {} ({})",
                        questions.len(),
                        tier.name(),
                        level
                    );
                    return RecoveryOutcome::Degraded {
                        questions,
                        tier: level,
                    };
                }
                Ok(_) => {
                    debug!("{}: produced no questions", tier.name());
                    last_err = Some(format!("{}: {}", tier.name(), RecoveryError::EmptySet));
                }
                Err(e) => {
                    debug!("{}: {}", tier.name(), e);
                    last_err = Some(format!("{}: {}", tier.name(), e));
                }
            }
        }

        let diagnostic = last_err.unwrap_or_else(|| "no recovery tiers configured".to_string());
        warn!(
            "Could not recover questions from model output ({} bytes): {}",
            raw.len(),
            diagnostic
        );
        RecoveryOutcome::Unrecoverable {
            original: raw.to_string(),
            diagnostic,
            fallback: default_questions(),
        }
    }
}

static DEFAULT_PIPELINE: Lazy<RecoveryPipeline> = Lazy::new(RecoveryPipeline::default);

/// Recover questions from a raw completion using the default tier order.
pub fn recover(raw: &str) -> RecoveryOutcome {
    DEFAULT_PIPELINE.recover(raw)
}

/// Parse `text` as JSON and pull out a validated `perguntas` object.
///
/// Shared acceptance test of the strict and cleanup tiers.
pub(crate) fn parse_question_document(text: &str) -> Result<QuestionSet, RecoveryError> {
    let doc: Value =
        serde_json::from_str(text).map_err(|e| RecoveryError::ParseFailure(e.to_string()))?;
    match doc.get(QUESTIONS_FIELD) {
        Some(Value::Object(map)) => validate_questions(map),
        _ => Err(RecoveryError::MissingField),
    }
}

/// Check every entry of a `perguntas` object.
///
/// Values must be strings with visible content; nothing is coerced. An empty
/// object is rejected so the next tier gets a chance. If any key is not
/// `pergunta_N`, the whole set is renumbered from `pergunta_1` in order.
pub fn validate_questions(map: &Map<String, Value>) -> Result<QuestionSet, RecoveryError> {
    if map.is_empty() {
        return Err(RecoveryError::EmptySet);
    }

    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::String(s) if !s.trim().is_empty() => pairs.push((key.clone(), s.clone())),
            Value::String(_) => {
                return Err(RecoveryError::InvalidEntry {
                    key: key.clone(),
                    reason: "blank question".into(),
                })
            }
            other => {
                return Err(RecoveryError::InvalidEntry {
                    key: key.clone(),
                    reason: format!("expected a string, found {}", json_kind(other)),
                })
            }
        }
    }

    if pairs.iter().all(|(key, _)| is_question_key(key)) {
        return Ok(QuestionSet::from_pairs(pairs));
    }
    debug!("Renumbering {} questions with non-standard keys", pairs.len());
    Ok(QuestionSet::numbered(pairs.into_iter().map(|(_, text)| text)))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
