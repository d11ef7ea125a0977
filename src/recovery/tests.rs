use super::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

struct CannedRepairer {
    replacement: String,
    calls: AtomicUsize,
}

impl CannedRepairer {
    fn new(replacement: &str) -> Self {
        Self {
            replacement: replacement.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl JsonRepairer for CannedRepairer {
    async fn repair(
        &self,
        _candidate: &str,
        _parser_error: &str,
        _schema_hint: Option<&str>,
        _example_hint: Option<&str>,
    ) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replacement.clone()
    }
}

struct PanickingRepairer;

impl JsonRepairer for PanickingRepairer {
    async fn repair(
        &self,
        _candidate: &str,
        _parser_error: &str,
        _schema_hint: Option<&str>,
        _example_hint: Option<&str>,
    ) -> String {
        panic!("repair must not be invoked when max_llm_attempts is 0");
    }
}

#[tokio::test]
async fn recovers_already_valid_json_without_mutation() {
    let text = r#"{"chapters":[{"title":"A","summary":"B"}]}"#;
    let value = recover(text, &RecoverOptions::default(), &NoRepair)
        .await
        .unwrap();
    assert_eq!(value, json!({"chapters": [{"title": "A", "summary": "B"}]}));
}

#[tokio::test]
async fn recovers_fenced_json_with_surrounding_prose() {
    let text = "Sure! ```json\n{\"chapters\":[{\"title\":\"A\",\"summary\":\"B\"}]}\n```\nLet me know if you need more.";
    let value = recover(text, &RecoverOptions::default(), &NoRepair)
        .await
        .unwrap();
    assert_eq!(value, json!({"chapters": [{"title": "A", "summary": "B"}]}));
}

#[tokio::test]
async fn recovers_fenced_json_without_language_tag() {
    let text = "```\n[1, 2, 3]\n```";
    let value = recover(text, &RecoverOptions::default(), &NoRepair)
        .await
        .unwrap();
    assert_eq!(value, json!([1, 2, 3]));
}

#[tokio::test]
async fn recovers_json_embedded_in_prose_via_balanced_extraction() {
    let text = "Here is the result: {\"ok\": true, \"nested\": {\"n\": 1}} - enjoy!";
    let value = recover(text, &RecoverOptions::default(), &NoRepair)
        .await
        .unwrap();
    assert_eq!(value, json!({"ok": true, "nested": {"n": 1}}));
}

#[tokio::test]
async fn recovers_array_when_bracket_comes_first() {
    let text = "mapping: [{\"title\": \"x\"}] done";
    let value = recover(text, &RecoverOptions::default(), &NoRepair)
        .await
        .unwrap();
    assert_eq!(value, json!([{"title": "x"}]));
}

#[tokio::test]
async fn exhausts_without_repairer_invocation_when_budget_is_zero() {
    let result = recover("{chapters: [}", &RecoverOptions::default(), &PanickingRepairer).await;
    assert!(matches!(
        result,
        Err(RecoveryError::JsonRecoveryExhausted { attempts: 0, .. })
    ));
}

#[tokio::test]
async fn repairer_output_reenters_the_phase_pipeline() {
    // The repaired text is itself fenced; fence stripping must re-run on it.
    let repairer = CannedRepairer::new("```json\n{\"fixed\": true}\n```");
    let options = RecoverOptions {
        max_llm_attempts: 1,
        ..Default::default()
    };
    let value = recover("not json at all", &options, &repairer).await.unwrap();
    assert_eq!(value, json!({"fixed": true}));
    assert_eq!(repairer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repair_attempts_are_bounded() {
    let repairer = CannedRepairer::new("still not json");
    let options = RecoverOptions {
        max_llm_attempts: 3,
        ..Default::default()
    };
    let result = recover("garbage", &options, &repairer).await;
    assert!(matches!(
        result,
        Err(RecoveryError::JsonRecoveryExhausted { attempts: 3, .. })
    ));
    assert_eq!(repairer.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn no_repair_exhausts_gracefully() {
    let options = RecoverOptions {
        max_llm_attempts: 2,
        ..Default::default()
    };
    let result = recover("{broken", &options, &NoRepair).await;
    assert!(matches!(
        result,
        Err(RecoveryError::JsonRecoveryExhausted { attempts: 2, .. })
    ));
}

#[test]
fn fence_strip_is_noop_without_fence() {
    assert_eq!(strip_markdown_fence("plain text"), "plain text");
}

#[test]
fn fence_strip_handles_missing_closing_fence() {
    assert_eq!(strip_markdown_fence("```json\n{\"a\": 1}"), "{\"a\": 1}");
}

#[test]
fn fence_strip_takes_first_fenced_block() {
    let text = "```json\n{\"first\": 1}\n```\n```json\n{\"second\": 2}\n```";
    assert_eq!(strip_markdown_fence(text), "{\"first\": 1}");
}

#[test]
fn newline_strip_removes_all_newlines() {
    assert_eq!(strip_newlines("{\"a\":\r\n 1}\n"), "{\"a\": 1}");
}

#[test]
fn balanced_extraction_ignores_unclosed_brackets() {
    assert_eq!(extract_balanced("prefix {\"a\": 1"), "prefix {\"a\": 1");
}

#[test]
fn balanced_extraction_tracks_only_the_opening_bracket_type() {
    assert_eq!(
        extract_balanced("x {\"list\": [1, 2]} y"),
        "{\"list\": [1, 2]}"
    );
}
