//! Integration tests for the recovery pipeline.
//!
//! Every raw completion here is a shape small local models actually produce.
//! No model is needed; run with:
//!   cargo test --test recovery

use docqa::{default_questions, recover, RecoveryOutcome, RecoveryStatus, Tier};
use serde_json::json;
use std::time::{Duration, Instant};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Assert the outcome carries a usable, well-formed question set.
fn assert_usable(outcome: &RecoveryOutcome, context: &str) {
    let questions = outcome.questions();
    assert!(!questions.is_empty(), "[{context}] empty question set");
    for q in questions.iter() {
        assert!(
            q.key.starts_with("pergunta_"),
            "[{context}] bad key {:?}",
            q.key
        );
        assert!(
            !q.text.trim().is_empty(),
            "[{context}] blank question under {}",
            q.key
        );
    }
    // The answer body always serialises to an object with a `perguntas` map.
    let body = serde_json::to_value(outcome.clone().into_answer()).unwrap();
    assert!(body["perguntas"].is_object(), "[{context}] body: {body}");
}

// ── Totality ─────────────────────────────────────────────────────────────────

#[test]
fn every_input_yields_an_outcome() {
    let long_braces = "{".repeat(100_000);
    let long_prose = "lorem ipsum ".repeat(50_000);
    let binary = String::from_utf8_lossy(&[0xff, 0x00, 0x7b, 0x22, 0xfe, 0x22, 0x3a]).into_owned();

    let inputs: Vec<(&str, &str)> = vec![
        ("empty", ""),
        ("whitespace", " \n\t  \r\n"),
        ("binary", &binary),
        ("long braces", &long_braces),
        ("long prose", &long_prose),
        ("lone quote", "\""),
        ("closers only", "}}]]"),
        ("array", r#"["pergunta_1", "Why?"]"#),
        ("null field", r#"{"perguntas": null}"#),
    ];

    for (name, raw) in inputs {
        let outcome = recover(raw);
        assert_usable(&outcome, name);
    }
}

#[test]
fn empty_input_degrades_to_defaults() {
    match recover("") {
        RecoveryOutcome::Unrecoverable {
            original, fallback, ..
        } => {
            assert_eq!(original, "");
            assert_eq!(fallback, default_questions());
        }
        other => panic!("expected Unrecoverable, got {other:?}"),
    }
}

#[test]
fn many_questions_recover_in_bounded_time() {
    let n = 50_000;
    let pairs: Vec<String> = (1..=n)
        .map(|i| format!(r#""pergunta_{i}": "Q{i}?""#))
        .collect();
    let strict = format!(r#"{{"perguntas": {{{}}}}}"#, pairs.join(", "));
    let labelled = pairs.join("\n");

    for (name, raw, tier) in [
        ("strict", &strict, Tier::STRICT),
        ("labelled", &labelled, Tier::PATTERN),
    ] {
        let start = Instant::now();
        let outcome = recover(raw);
        let elapsed = start.elapsed();

        assert_eq!(outcome.tier(), tier, "[{name}]");
        assert_eq!(outcome.questions().len(), n, "[{name}]");
        assert!(
            elapsed < Duration::from_secs(15),
            "[{name}] took {elapsed:?} for {n} questions"
        );
    }
}

#[test]
fn foreign_keys_are_renumbered() {
    let outcome = recover(r#"{"perguntas": {"q": "A?", "outra": "B?"}}"#);

    assert!(outcome.is_success());
    let keys: Vec<&str> = outcome.questions().iter().map(|q| q.key.as_str()).collect();
    assert_eq!(keys, ["pergunta_1", "pergunta_2"]);
}

// ── Tier 1: strict ───────────────────────────────────────────────────────────

#[test]
fn well_formed_answer_is_returned_verbatim() {
    let raw = r#"{"perguntas": {"pergunta_1": "Qual é o objeto do contrato?", "pergunta_2": "Qual o prazo de vigência?", "pergunta_3": "Quem são as partes?"}}"#;
    let outcome = recover(raw);

    assert!(outcome.is_success());
    assert_eq!(outcome.tier(), Tier::STRICT);
    let q = outcome.questions();
    assert_eq!(q.len(), 3);
    assert_eq!(q.get("pergunta_1"), Some("Qual é o objeto do contrato?"));
    assert_eq!(q.get("pergunta_2"), Some("Qual o prazo de vigência?"));
    assert_eq!(q.get("pergunta_3"), Some("Quem são as partes?"));
}

#[test]
fn strict_keeps_more_than_nine_in_order() {
    let map: serde_json::Map<String, serde_json::Value> = (1..=12)
        .map(|n| (format!("pergunta_{n}"), json!(format!("Pergunta {n}?"))))
        .collect();
    let raw = json!({ "perguntas": map }).to_string();

    let outcome = recover(&raw);
    assert!(outcome.is_success());
    let keys: Vec<&str> = outcome.questions().iter().map(|q| q.key.as_str()).collect();
    assert_eq!(keys[9], "pergunta_10");
    assert_eq!(keys.len(), 12);
}

// ── Tier 2: cleanup ──────────────────────────────────────────────────────────

#[test]
fn truncated_quote_is_repaired() {
    let outcome = recover(r#"{"perguntas": {"pergunta_1": "What is the scope"#);

    assert_eq!(outcome.status(), RecoveryStatus::Degraded);
    assert_eq!(outcome.tier(), Tier::CLEANUP);
    assert_eq!(outcome.questions().get("pergunta_1"), Some("What is the scope"));
}

#[test]
fn missing_comma_between_lines_is_repaired() {
    let raw = "{\"perguntas\": {\n  \"pergunta_1\": \"Qual é o prazo?\"\n  \"pergunta_2\": \"Quem assina?\"\n}}";
    let outcome = recover(raw);

    assert_eq!(outcome.tier(), Tier::CLEANUP);
    assert_eq!(outcome.questions().get("pergunta_1"), Some("Qual é o prazo?"));
    assert_eq!(outcome.questions().get("pergunta_2"), Some("Quem assina?"));
}

#[test]
fn trailing_comma_gives_same_questions_as_clean_json() {
    let clean = r#"{"perguntas": {"pergunta_1": "A?", "pergunta_2": "B?"}}"#;
    let trailing = r#"{"perguntas": {"pergunta_1": "A?", "pergunta_2": "B?",}}"#;

    let a = recover(clean);
    let b = recover(trailing);
    assert_eq!(a.tier(), Tier::STRICT);
    assert_eq!(b.tier(), Tier::CLEANUP);
    assert_eq!(a.questions(), b.questions());
}

#[test]
fn prose_and_code_fence_around_object() {
    let raw = "Claro! Aqui estão as perguntas:\n```json\n{\"perguntas\": {\"pergunta_1\": \"Qual é o tema central?\"}}\n```\nEspero ter ajudado.";
    let outcome = recover(raw);

    assert_eq!(outcome.tier(), Tier::CLEANUP);
    assert_eq!(
        outcome.questions().get("pergunta_1"),
        Some("Qual é o tema central?")
    );
}

#[test]
fn truncated_after_first_of_three_fields() {
    let raw = "{\n  \"perguntas\": {\n    \"pergunta_1\": \"Qual é o objetivo?\",\n    \"pergunta_2\": \"Quais são os ris";
    let outcome = recover(raw);

    assert_eq!(outcome.tier(), Tier::CLEANUP);
    assert_eq!(outcome.questions().len(), 2);
    assert_eq!(outcome.questions().get("pergunta_2"), Some("Quais são os ris"));
}

// ── Tier 3: pattern ──────────────────────────────────────────────────────────

#[test]
fn labelled_pairs_without_an_object() {
    let outcome = recover(r#"Here you go: "pergunta_1": "Why?""#);

    assert_eq!(outcome.status(), RecoveryStatus::Degraded);
    assert_eq!(outcome.tier(), Tier::PATTERN);
    assert_eq!(outcome.questions().get("pergunta_1"), Some("Why?"));
}

#[test]
fn numeric_values_fall_through_to_pattern() {
    // Tiers 1-2 refuse to coerce the number; tier 3 keeps only the string pair.
    let raw = r#"{"perguntas": {"pergunta_1": 42, "pergunta_2": "Qual o escopo?"}}"#;
    let outcome = recover(raw);

    assert_eq!(outcome.tier(), Tier::PATTERN);
    assert_eq!(outcome.questions().len(), 1);
    assert_eq!(outcome.questions().get("pergunta_2"), Some("Qual o escopo?"));
}

#[test]
fn empty_object_falls_through() {
    let outcome = recover(r#"{"perguntas": {}}"#);
    assert_eq!(outcome.status(), RecoveryStatus::Unrecoverable);
}

// ── Tier 4: default ──────────────────────────────────────────────────────────

#[test]
fn refusal_gets_placeholder_questions() {
    let outcome = recover("I cannot help with that.");

    assert_eq!(outcome.status(), RecoveryStatus::Unrecoverable);
    assert_eq!(outcome.tier(), Tier::DEFAULT);
    assert_eq!(outcome.questions(), &default_questions());

    let answer = outcome.into_answer();
    assert!(answer.recovery.diagnostic.is_some());
    let body = serde_json::to_value(&answer).unwrap();
    assert_eq!(body["recovery"]["status"], "unrecoverable");
    assert_eq!(body["recovery"]["tier"], 4);
}

// ── Idempotence ──────────────────────────────────────────────────────────────

#[test]
fn recovered_output_parses_strictly() {
    let raws = [
        r#"{"perguntas": {"pergunta_1": "What is the scope"#,
        r#"Here you go: "pergunta_1": "Why?""#,
        r#"{"perguntas": {"pergunta_1": "A?", "pergunta_2": "B?",}}"#,
        "nothing useful",
    ];

    for raw in raws {
        let first = recover(raw);
        let reserialised =
            serde_json::to_string(&json!({ "perguntas": first.questions() })).unwrap();
        let second = recover(&reserialised);

        assert!(second.is_success(), "not strict for {raw:?}: {reserialised}");
        assert_eq!(first.questions(), second.questions(), "changed for {raw:?}");
    }
}

#[test]
fn answer_body_shape() {
    let answer = recover(r#"{"perguntas": {"pergunta_1": "A?"}}"#).into_answer();
    let body = serde_json::to_value(&answer).unwrap();
    assert_eq!(
        body,
        json!({
            "perguntas": {"pergunta_1": "A?"},
            "recovery": {"status": "success", "tier": 1}
        })
    );
}
