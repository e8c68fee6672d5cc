//! Tier 3: pull questions straight out of the raw text with regexes.
//!
//! Runs on the *original* completion, never on the tier-2 rewrite: the cleanup
//! rules can splice quotes in ways that hide a pair that was intact in the
//! raw output.
//!
//! Two scans, the second only when the first finds nothing:
//!
//! 1. **Labelled pairs** — `"pergunta_N": "…"`, keys kept verbatim.
//! 2. **Question-like strings** — any quoted run containing `?` and longer
//!    than [`MIN_LOOSE_QUESTION_CHARS`] once trimmed, numbered from 1.

use super::RecoveryTier;
use crate::error::RecoveryError;
use crate::output::{QuestionSet, Tier};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// A loose match must be longer than this (trimmed) to count as a question.
pub const MIN_LOOSE_QUESTION_CHARS: usize = 10;

static RE_LABELLED_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(pergunta_\d+)"\s*:\s*"([^"]*)""#).unwrap());

static RE_QUOTED_QUESTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]*\?[^"]*)""#).unwrap());

/// Pattern-extraction tier.
#[derive(Debug, Clone, Copy)]
pub struct PatternExtraction {
    /// Fall back to loose `?`-string matching when no labelled pair exists.
    pub loose_fallback: bool,
}

impl Default for PatternExtraction {
    fn default() -> Self {
        Self {
            loose_fallback: true,
        }
    }
}

impl RecoveryTier for PatternExtraction {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn tier(&self) -> Tier {
        Tier::PATTERN
    }

    fn attempt(&self, raw: &str) -> Result<QuestionSet, RecoveryError> {
        let labelled = extract_labelled(raw);
        if !labelled.is_empty() {
            return Ok(labelled);
        }

        if self.loose_fallback {
            let loose = extract_loose(raw);
            if !loose.is_empty() {
                debug!("pattern: {} loose question strings", loose.len());
                return Ok(loose);
            }
        }

        Err(RecoveryError::NoMatchFound)
    }
}

/// All `"pergunta_N": "value"` pairs in document order.
pub fn extract_labelled(raw: &str) -> QuestionSet {
    QuestionSet::from_pairs(
        RE_LABELLED_PAIR
            .captures_iter(raw)
            .map(|caps| (caps[1].to_string(), caps[2].to_string())),
    )
}

/// Quoted strings that look like questions, renumbered from `pergunta_1`.
pub fn extract_loose(raw: &str) -> QuestionSet {
    QuestionSet::numbered(
        RE_QUOTED_QUESTION
            .captures_iter(raw)
            .map(|caps| caps[1].trim().to_string())
            .filter(|s| s.chars().count() > MIN_LOOSE_QUESTION_CHARS),
    )
}
