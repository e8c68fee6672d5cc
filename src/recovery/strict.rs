//! Tier 1: parse the completion exactly as received.

use super::{parse_question_document, RecoveryTier};
use crate::error::RecoveryError;
use crate::output::{QuestionSet, Tier};

/// Accepts only a well-formed JSON document with a `perguntas` object.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictParse;

impl RecoveryTier for StrictParse {
    fn name(&self) -> &'static str {
        "strict"
    }

    fn tier(&self) -> Tier {
        Tier::STRICT
    }

    fn attempt(&self, raw: &str) -> Result<QuestionSet, RecoveryError> {
        parse_question_document(raw)
    }
}
