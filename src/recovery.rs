use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("unable to recover valid JSON after {attempts} repair attempt(s): {last_error}")]
    JsonRecoveryExhausted { attempts: u32, last_error: String },
}

#[derive(Debug, Clone, Default)]
pub struct RecoverOptions {
    pub max_llm_attempts: u32,
    pub schema_hint: Option<String>,
    pub example_hint: Option<String>,
}

/// External correction step for text the phase pipeline could not parse,
/// typically backed by an LLM call. Implementations must not fail: on any
/// internal error, return the candidate unchanged so the recovery loop can
/// exhaust gracefully.
pub trait JsonRepairer {
    fn repair(
        &self,
        candidate: &str,
        parser_error: &str,
        schema_hint: Option<&str>,
        example_hint: Option<&str>,
    ) -> impl std::future::Future<Output = String> + Send;
}

/// Repairer that leaves the candidate untouched. Using it with a non-zero
/// attempt budget simply exhausts the budget.
pub struct NoRepair;

impl JsonRepairer for NoRepair {
    async fn repair(
        &self,
        candidate: &str,
        _parser_error: &str,
        _schema_hint: Option<&str>,
        _example_hint: Option<&str>,
    ) -> String {
        candidate.to_string()
    }
}

/// Recover a JSON value from a raw text blob (typically an LLM response).
///
/// The candidate is parsed as-is first, then re-parsed after each
/// normalization phase in order: markdown fence stripping, newline stripping,
/// whitespace trimming, balanced bracket extraction. If all phases fail and
/// the attempt budget allows, the repairer is invoked with the current
/// candidate and the last parser error, and its output re-enters the full
/// phase pipeline (repaired text may itself be fenced).
pub async fn recover(
    raw_text: &str,
    options: &RecoverOptions,
    repairer: &impl JsonRepairer,
) -> Result<Value, RecoveryError> {
    let mut candidate = raw_text.to_string();
    let mut attempts = 0u32;

    loop {
        let (final_candidate, last_error) = match run_phases(&candidate) {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        if attempts >= options.max_llm_attempts {
            return Err(RecoveryError::JsonRecoveryExhausted {
                attempts,
                last_error,
            });
        }
        attempts += 1;

        candidate = repairer
            .repair(
                &final_candidate,
                &last_error,
                options.schema_hint.as_deref(),
                options.example_hint.as_deref(),
            )
            .await;
    }
}

/// Run the textual phase pipeline, attempting a parse before any phase and
/// after each one. Returns the final candidate and the last parser error on
/// failure.
fn run_phases(raw: &str) -> Result<Value, (String, String)> {
    let mut candidate = raw.to_string();
    let mut last_error = match serde_json::from_str(&candidate) {
        Ok(value) => return Ok(value),
        Err(e) => e.to_string(),
    };

    let phases: [fn(&str) -> String; 4] = [
        strip_markdown_fence,
        strip_newlines,
        |text| text.trim().to_string(),
        extract_balanced,
    ];

    for phase in phases {
        candidate = phase(&candidate);
        match serde_json::from_str(&candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e.to_string(),
        }
    }

    Err((candidate, last_error))
}

/// Extract the interior of the first fenced block, tolerating an optional
/// language tag after the opening fence. Without a closing fence only the
/// opening token (and tag) is stripped. No fence means no-op.
pub(crate) fn strip_markdown_fence(text: &str) -> String {
    let Some(open) = text.find("```") else {
        return text.to_string();
    };
    let mut inner = &text[open + 3..];
    let tag_len = inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .map(|c| c.len_utf8())
        .sum::<usize>();
    inner = &inner[tag_len..];
    match inner.find("```") {
        Some(close) => inner[..close].trim().to_string(),
        None => inner.trim().to_string(),
    }
}

/// Remove all newline characters. This is a blunt heuristic inherited from
/// the observed correction behavior: it also corrupts valid JSON string
/// values that legitimately contain embedded newlines. Kept as-is because it
/// runs only after a straight parse has already failed.
pub(crate) fn strip_newlines(text: &str) -> String {
    text.chars().filter(|&c| c != '\n' && c != '\r').collect()
}

/// Locate the first `{` or `[` (whichever occurs first) and scan forward,
/// tracking nesting of that bracket type only, to its matching close. When a
/// match is found the enclosed substring (inclusive) becomes the candidate;
/// otherwise the input is returned unchanged.
pub(crate) fn extract_balanced(text: &str) -> String {
    let first_brace = text.find('{');
    let first_bracket = text.find('[');
    let (start, open, close) = match (first_brace, first_bracket) {
        (Some(b), Some(k)) if b < k => (b, '{', '}'),
        (Some(b), None) => (b, '{', '}'),
        (_, Some(k)) => (k, '[', ']'),
        (None, None) => return text.to_string(),
    };

    let mut depth: u32 = 0;
    for (offset, c) in text[start..].char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return text[start..start + offset + c.len_utf8()].to_string();
            }
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests;
