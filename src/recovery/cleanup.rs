//! Tier 2: rewrite common JSON breakage, then parse again.
//!
//! Each rule is a pure `&str → Result<String, RecoveryError>` function. A
//! rule that returns `Err` is skipped (the text passes through unchanged) and
//! the next rule runs, so one rule that does not apply never blocks the others.
//!
//! ## Rule Order
//!
//! 1. Trim surrounding whitespace
//! 2. Slice from the first `{` to the last `}` (drops prose around the object)
//! 3. Close a string left open at the end of a line
//! 4. Insert the comma missing between two fields on consecutive lines
//! 5. Close braces/brackets a truncated generation never emitted
//! 6. Remove trailing commas before `}` / `]`
//!
//! Quotes are closed (3) before commas are inserted (4) so a truncated line
//! followed by another field gets both repairs. Delimiters are balanced (5)
//! before trailing commas are removed (6) because a generation cut right after
//! a comma leaves `,}` once its braces are restored.

use super::{parse_question_document, RecoveryTier};
use crate::error::RecoveryError;
use crate::output::{QuestionSet, Tier};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// A single named rewrite step.
#[derive(Clone, Copy)]
pub struct CleanupRule {
    pub name: &'static str,
    pub apply: fn(&str) -> Result<String, RecoveryError>,
}

impl std::fmt::Debug for CleanupRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// The six rules, in the order they must run.
pub const DEFAULT_RULES: [CleanupRule; 6] = [
    CleanupRule {
        name: "trim",
        apply: trim,
    },
    CleanupRule {
        name: "slice_object",
        apply: slice_object,
    },
    CleanupRule {
        name: "close_open_strings",
        apply: close_open_strings,
    },
    CleanupRule {
        name: "insert_missing_commas",
        apply: insert_missing_commas,
    },
    CleanupRule {
        name: "close_unbalanced",
        apply: close_unbalanced,
    },
    CleanupRule {
        name: "remove_trailing_commas",
        apply: remove_trailing_commas,
    },
];

/// Cleanup-and-reparse tier.
#[derive(Debug, Clone)]
pub struct CleanupReparse {
    rules: Vec<CleanupRule>,
}

impl Default for CleanupReparse {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.to_vec(),
        }
    }
}

impl CleanupReparse {
    pub fn with_rules(rules: Vec<CleanupRule>) -> Self {
        Self { rules }
    }

    /// Apply every rule in order, skipping the ones that fail.
    pub fn clean(&self, raw: &str) -> String {
        let mut text = raw.to_string();
        for rule in &self.rules {
            match (rule.apply)(&text) {
                Ok(next) => text = next,
                Err(e) => debug!("cleanup: {}", e),
            }
        }
        text
    }
}

impl RecoveryTier for CleanupReparse {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn tier(&self) -> Tier {
        Tier::CLEANUP
    }

    fn attempt(&self, raw: &str) -> Result<QuestionSet, RecoveryError> {
        parse_question_document(&self.clean(raw))
    }
}

// ── Rule 1: Trim ─────────────────────────────────────────────────────────────

fn trim(input: &str) -> Result<String, RecoveryError> {
    Ok(input.trim().to_string())
}

// ── Rule 2: Slice to the outermost object ────────────────────────────────────

fn slice_object(input: &str) -> Result<String, RecoveryError> {
    match (input.find('{'), input.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(input[start..=end].to_string()),
        _ => Err(RecoveryError::RuleSkipped {
            rule: "slice_object",
            reason: "no '{' … '}' span".into(),
        }),
    }
}

// ── Rule 3: Close strings left open at end of line ───────────────────────────
//
// A generation cut mid-value leaves `"pergunta_1": "What is the scope` with
// an odd number of unescaped quotes on the line. The closing quote goes at
// the point of truncation, i.e. after the last visible character.

fn close_open_strings(input: &str) -> Result<String, RecoveryError> {
    let mut out = String::with_capacity(input.len() + 8);
    for (i, line) in input.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if ends_inside_string(line) {
            out.push_str(line.trim_end());
            out.push('"');
        } else {
            out.push_str(line);
        }
    }
    Ok(out)
}

/// True when `line` opens a string literal it never closes.
fn ends_inside_string(line: &str) -> bool {
    let mut in_string = false;
    let mut escaped = false;
    for c in line.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' && in_string {
            escaped = true;
        } else if c == '"' {
            in_string = !in_string;
        }
    }
    in_string
}

// ── Rule 4: Insert missing commas between fields ─────────────────────────────

static RE_ADJACENT_STRINGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[ \t\r]*\n\s*""#).unwrap());

fn insert_missing_commas(input: &str) -> Result<String, RecoveryError> {
    Ok(RE_ADJACENT_STRINGS
        .replace_all(input, "\",\n  \"")
        .into_owned())
}

// ── Rule 5: Close unbalanced delimiters ──────────────────────────────────────
//
// After rule 3 the last string is closed, but the `}}` that should follow it
// were never generated. Walk the text, keep a stack of expected closers, and
// append whatever is still open. A key left without its value at the very end
// (`, "pergunta_3"` or `"pergunta_3":`) is dropped first so the object parses.

static RE_DANGLING_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([,{])\s*"(?:[^"\\]|\\.)*"\s*:?\s*$"#).unwrap()
});

fn close_unbalanced(input: &str) -> Result<String, RecoveryError> {
    let (stack, in_string) = scan_delimiters(input);
    if stack.is_empty() && !in_string {
        return Err(RecoveryError::RuleSkipped {
            rule: "close_unbalanced",
            reason: "delimiters already balanced".into(),
        });
    }

    let mut out = input.trim_end().to_string();
    if in_string {
        out.push('"');
    }

    if stack.last() == Some(&'}') {
        if let Some(caps) = RE_DANGLING_KEY.captures(&out) {
            let whole = caps.get(0).map(|m| m.start()).unwrap_or(out.len());
            // Keep an opening brace, drop a separating comma.
            let cut = if &caps[1] == "{" { whole + 1 } else { whole };
            out.truncate(cut);
        }
    }

    out.extend(stack.iter().rev());
    Ok(out)
}

/// Closers still owed at end of text, innermost last, and whether the text
/// ends inside a string literal.
fn scan_delimiters(input: &str) -> (Vec<char>, bool) {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }
    (stack, in_string)
}

// ── Rule 6: Remove trailing commas ───────────────────────────────────────────

static RE_TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());

fn remove_trailing_commas(input: &str) -> Result<String, RecoveryError> {
    Ok(RE_TRAILING_COMMA.replace_all(input, "$1").into_owned())
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_object() {
        let input = "Claro! {\"a\": 1} Espero ter ajudado.";
        assert_eq!(slice_object(input).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_slice_object_skips_without_braces() {
        assert!(slice_object("no braces here").is_err());
        assert!(slice_object("} backwards {").is_err());
    }

    #[test]
    fn test_close_open_string() {
        let input = "{\"perguntas\": {\"pergunta_1\": \"What is the scope   ";
        assert_eq!(
            close_open_strings(input).unwrap(),
            "{\"perguntas\": {\"pergunta_1\": \"What is the scope\""
        );
    }

    #[test]
    fn test_close_open_string_leaves_complete_lines() {
        let input = "{\n  \"pergunta_1\": \"A?\",\n  \"pergunta_2\": \"B?\"\n}";
        assert_eq!(close_open_strings(input).unwrap(), input);
    }

    #[test]
    fn test_close_open_string_respects_escapes() {
        let input = r#""pergunta_1": "Ele disse \"oi\"","#;
        assert_eq!(close_open_strings(input).unwrap(), input);
    }

    #[test]
    fn test_insert_missing_commas() {
        let input = "{\"pergunta_1\": \"A?\"\n  \"pergunta_2\": \"B?\"}";
        assert_eq!(
            insert_missing_commas(input).unwrap(),
            "{\"pergunta_1\": \"A?\",\n  \"pergunta_2\": \"B?\"}"
        );
    }

    #[test]
    fn test_insert_missing_commas_ignores_separated_fields() {
        let input = "{\"pergunta_1\": \"A?\",\n\"pergunta_2\": \"B?\"}";
        assert_eq!(insert_missing_commas(input).unwrap(), input);
    }

    #[test]
    fn test_close_unbalanced() {
        let input = "{\"perguntas\": {\"pergunta_1\": \"A?\"";
        assert_eq!(
            close_unbalanced(input).unwrap(),
            "{\"perguntas\": {\"pergunta_1\": \"A?\"}}"
        );
    }

    #[test]
    fn test_close_unbalanced_drops_dangling_key() {
        let input = "{\"perguntas\": {\"pergunta_1\": \"A?\", \"pergunta_2\":";
        assert_eq!(
            close_unbalanced(input).unwrap(),
            "{\"perguntas\": {\"pergunta_1\": \"A?\"}}"
        );
    }

    #[test]
    fn test_close_unbalanced_ignores_braces_in_strings() {
        let input = "{\"perguntas\": {\"pergunta_1\": \"Use { or [?\"";
        assert_eq!(
            close_unbalanced(input).unwrap(),
            "{\"perguntas\": {\"pergunta_1\": \"Use { or [?\"}}"
        );
    }

    #[test]
    fn test_close_unbalanced_skips_balanced_text() {
        assert!(close_unbalanced("{\"a\": \"b\"}").is_err());
    }

    #[test]
    fn test_remove_trailing_commas() {
        assert_eq!(
            remove_trailing_commas("{\"a\": \"b\",\n}").unwrap(),
            "{\"a\": \"b\"\n}"
        );
        assert_eq!(remove_trailing_commas("[1, 2, ]").unwrap(), "[1, 2 ]");
    }

    #[test]
    fn test_failed_rule_is_a_noop() {
        let tier = CleanupReparse::with_rules(vec![
            CleanupRule {
                name: "always_fails",
                apply: |_| Err(RecoveryError::NoMatchFound),
            },
            DEFAULT_RULES[0],
        ]);
        assert_eq!(tier.clean("  x  "), "x");
    }

    #[test]
    fn test_full_cleanup_of_chatty_output() {
        let input = "Aqui estão as perguntas:\n```json\n{\n  \"perguntas\": {\n    \"pergunta_1\": \"A?\"\n    \"pergunta_2\": \"B?\",\n  }\n}\n```";
        let set = CleanupReparse::default().attempt(input).unwrap();
        assert_eq!(set.texts(), ["A?", "B?"]);
    }
}
