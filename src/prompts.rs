//! Generation prompt for question extraction.
//!
//! Centralising the prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the schema example and the formatting rules
//!    live next to each other, so changing the key names means editing one
//!    place (and [`crate::output::QUESTIONS_FIELD`]).
//!
//! 2. **Testability** — unit tests can build and inspect prompts directly
//!    without a running model.
//!
//! The rules target exactly the failure modes [`crate::recovery`] repairs:
//! prose around the JSON, unclosed quotes, line breaks inside values. A model
//! that follows them never needs more than the strict tier.

use crate::config::PromptConfig;

/// Instructions, schema example and rules. [`PromptBuilder::build`] appends
/// the requested question type and the document context.
pub const QUESTION_PROMPT_INSTRUCTIONS: &str = r#"
Você é um assistente que cria perguntas baseadas em documentos.

IMPORTANTE: Responda APENAS com JSON válido no formato exato abaixo:

{
  "perguntas": {
    "pergunta_1": "Primeira pergunta aqui",
    "pergunta_2": "Segunda pergunta aqui",
    "pergunta_3": "Terceira pergunta aqui"
  }
}

Regras:
1. Use APENAS o formato JSON mostrado acima
2. Use exatamente as chaves "pergunta_1", "pergunta_2" e "pergunta_3"
3. Não adicione texto antes ou depois do JSON
4. Todas as aspas devem estar fechadas corretamente
5. Não quebre linhas no meio das perguntas
6. Crie a quantidade de perguntas que aparece no prompt
7. Use português correto"#;

/// Builds the generation prompt from a question and extracted document text.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// Build the prompt. Document text beyond `max_context_chars` is dropped.
    pub fn build(&self, question: &str, document_text: &str) -> String {
        let context = truncate_chars(document_text, self.config.max_context_chars);
        format!(
            "{}\n\nTipo de perguntas solicitadas: {}\n\nContexto do documento:\n{}...\n",
            QUESTION_PROMPT_INSTRUCTIONS,
            question.trim(),
            context
        )
    }
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
