//! Result types: the question schema, recovery outcomes and the answer body.
//!
//! [`QuestionSet`] is the only shape the service ever emits. Whatever the
//! model returned, and however badly, callers receive a `perguntas` object
//! with at least one non-empty question; [`RecoveryOutcome`] records how much
//! work it took to get there.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Prefix of every question key (`pergunta_1`, `pergunta_2`, …).
pub const QUESTION_KEY_PREFIX: &str = "pergunta_";

/// Name of the top-level field holding the questions.
pub const QUESTIONS_FIELD: &str = "perguntas";

/// Build the key for the `n`-th question (1-indexed).
pub fn question_key(n: usize) -> String {
    format!("{QUESTION_KEY_PREFIX}{n}")
}

/// True for `pergunta_<digits>`.
pub fn is_question_key(key: &str) -> bool {
    key.strip_prefix(QUESTION_KEY_PREFIX)
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// One entry of a [`QuestionSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub key: String,
    pub text: String,
}

/// Ordered mapping `pergunta_N → question`.
///
/// Keys are unique and every text has at least one non-whitespace character.
/// Insertion order is preserved and is the order the model produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionSet {
    entries: Vec<Question>,
    /// Key → position in `entries`.
    index: HashMap<String, usize>,
}

impl QuestionSet {
    /// Build from values, numbering keys densely from `pergunta_1`.
    ///
    /// Blank values are skipped without consuming a number.
    pub fn numbered<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for value in values {
            let text: String = value.into();
            if text.trim().is_empty() {
                continue;
            }
            set.insert(question_key(set.len() + 1), text);
        }
        set
    }

    /// Build from key/value pairs, keeping keys verbatim.
    ///
    /// A repeated key keeps its first position and takes the latest value.
    /// Blank values are skipped.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut set = Self::default();
        for (key, value) in pairs {
            let (key, text) = (key.into(), value.into());
            if text.trim().is_empty() {
                continue;
            }
            set.insert(key, text);
        }
        set
    }

    /// Append `key`, or overwrite its text in place if already present.
    fn insert(&mut self, key: String, text: String) {
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].text = text,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push(Question { key, text });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a question by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.index
            .get(key)
            .map(|&pos| self.entries[pos].text.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.entries.iter()
    }

    /// Question texts in order.
    pub fn texts(&self) -> Vec<&str> {
        self.entries.iter().map(|q| q.text.as_str()).collect()
    }
}

impl Serialize for QuestionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for q in &self.entries {
            map.serialize_entry(&q.key, &q.text)?;
        }
        map.end()
    }
}

/// Placeholder questions returned when nothing usable survives in the
/// model's output. Never empty.
pub fn default_questions() -> QuestionSet {
    QuestionSet::numbered([
        "Não foi possível extrair perguntas da resposta do modelo. Deseja tentar novamente?",
        "O documento enviado pode estar vazio, protegido ou com texto ilegível. Pode enviar outro arquivo?",
        "Se o problema persistir, tente um formato diferente (.pdf, .docx ou .md). Qual formato prefere usar?",
    ])
}

/// Which recovery tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tier(pub u8);

impl Tier {
    /// Direct `serde_json` parse of the raw completion.
    pub const STRICT: Tier = Tier(1);
    /// Cleanup rules then parse.
    pub const CLEANUP: Tier = Tier(2);
    /// Regex extraction from the raw text.
    pub const PATTERN: Tier = Tier(3);
    /// Static placeholder questions.
    pub const DEFAULT: Tier = Tier(4);
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.0)
    }
}

/// Result of running a completion through the recovery pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The completion was valid JSON in the expected shape.
    Success(QuestionSet),
    /// Recovered, but only after cleanup or pattern matching.
    Degraded { questions: QuestionSet, tier: Tier },
    /// Nothing usable; `fallback` holds the placeholder questions.
    Unrecoverable {
        original: String,
        diagnostic: String,
        fallback: QuestionSet,
    },
}

impl RecoveryOutcome {
    /// The questions to show the caller — always non-empty.
    pub fn questions(&self) -> &QuestionSet {
        match self {
            RecoveryOutcome::Success(q) => q,
            RecoveryOutcome::Degraded { questions, .. } => questions,
            RecoveryOutcome::Unrecoverable { fallback, .. } => fallback,
        }
    }

    /// Tier that produced the questions.
    pub fn tier(&self) -> Tier {
        match self {
            RecoveryOutcome::Success(_) => Tier::STRICT,
            RecoveryOutcome::Degraded { tier, .. } => *tier,
            RecoveryOutcome::Unrecoverable { .. } => Tier::DEFAULT,
        }
    }

    pub fn status(&self) -> RecoveryStatus {
        match self {
            RecoveryOutcome::Success(_) => RecoveryStatus::Success,
            RecoveryOutcome::Degraded { .. } => RecoveryStatus::Degraded,
            RecoveryOutcome::Unrecoverable { .. } => RecoveryStatus::Unrecoverable,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RecoveryOutcome::Success(_))
    }

    /// Consume the outcome into the JSON body sent to callers.
    pub fn into_answer(self) -> AnswerBody {
        let status = self.status();
        let tier = self.tier();
        match self {
            RecoveryOutcome::Success(perguntas)
            | RecoveryOutcome::Degraded {
                questions: perguntas,
                ..
            } => AnswerBody {
                perguntas,
                recovery: RecoveryReport {
                    status,
                    tier,
                    diagnostic: None,
                },
            },
            RecoveryOutcome::Unrecoverable {
                diagnostic,
                fallback,
                ..
            } => AnswerBody {
                perguntas: fallback,
                recovery: RecoveryReport {
                    status,
                    tier,
                    diagnostic: Some(diagnostic),
                },
            },
        }
    }
}

/// Outcome tag as exposed over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStatus {
    Success,
    Degraded,
    Unrecoverable,
}

/// How the answer was obtained; lets callers tell real answers from placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub status: RecoveryStatus,
    pub tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// JSON body for one answered question: `{"perguntas": {...}, "recovery": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerBody {
    pub perguntas: QuestionSet,
    pub recovery: RecoveryReport,
}
