use anyhow::{anyhow, Context, Result};
use colored::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::prompts;
use crate::providers::LLMProvider;
use crate::reconciler::{PathMapping, PathResolver};
use crate::recovery::{self, JsonRepairer, NoRepair, RecoverOptions};

pub const MAX_RETRIES: u32 = 3;
pub const BASE_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const INDIVIDUAL_CALL_DELAY: Duration = Duration::from_secs(6);

const SINGLE_CALL_TIMEOUT: Duration = Duration::from_secs(60);
const BULK_CALL_TIMEOUT: Duration = Duration::from_secs(180);

/// LLM-backed helper behind the recovery and reconciliation seams. Wraps
/// every provider call in a timeout and an exponential-backoff retry loop;
/// callers above these seams only ever see clean fallbacks (unchanged
/// candidate, empty mapping list) rather than transport errors.
pub struct LlmAssist<'a> {
    provider: &'a LLMProvider,
    max_retries: u32,
    base_retry_delay: Duration,
}

impl<'a> LlmAssist<'a> {
    pub fn new(provider: &'a LLMProvider) -> Self {
        Self {
            provider,
            max_retries: MAX_RETRIES,
            base_retry_delay: BASE_RETRY_DELAY,
        }
    }

    pub async fn generate_with_retry(
        &self,
        prompt: &str,
        call_timeout: Duration,
        what: &str,
    ) -> Result<String> {
        let mut last_error = anyhow!("no attempts made");

        for attempt in 1..=self.max_retries {
            match tokio::time::timeout(call_timeout, self.provider.generate_text(prompt)).await {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) => last_error = e,
                Err(_) => last_error = anyhow!("timed out after {}s", call_timeout.as_secs()),
            }

            if attempt < self.max_retries {
                let delay = self.base_retry_delay * 2u32.pow(attempt - 1);
                eprintln!(
                    "{}: {} attempt {}/{} failed ({}), retrying in {}s",
                    "Warning".yellow(),
                    what,
                    attempt,
                    self.max_retries,
                    last_error,
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error).with_context(|| format!("{what} failed after {} attempts", self.max_retries))
    }
}

impl JsonRepairer for LlmAssist<'_> {
    async fn repair(
        &self,
        candidate: &str,
        parser_error: &str,
        schema_hint: Option<&str>,
        example_hint: Option<&str>,
    ) -> String {
        let prompt =
            prompts::json_correction_prompt(candidate, parser_error, schema_hint, example_hint);
        match self
            .generate_with_retry(&prompt, SINGLE_CALL_TIMEOUT, "JSON correction")
            .await
        {
            Ok(corrected) => corrected,
            Err(_) => candidate.to_string(),
        }
    }
}

#[derive(Serialize)]
struct WireChapterTitle<'a> {
    chapter_title: &'a str,
}

#[derive(Deserialize)]
struct WirePathMapping {
    original_chapter_title: String,
    determined_full_path: String,
}

impl PathResolver for LlmAssist<'_> {
    async fn resolve_batch(&self, titles: &[String], tree_text: &str) -> Vec<PathMapping> {
        let wire_titles: Vec<WireChapterTitle> = titles
            .iter()
            .map(|t| WireChapterTitle { chapter_title: t })
            .collect();
        let titles_json = match serde_json::to_string_pretty(&wire_titles) {
            Ok(json) => json,
            Err(_) => return Vec::new(),
        };

        let prompt = prompts::bulk_path_prompt(tree_text, &titles_json);
        let Ok(response) = self
            .generate_with_retry(&prompt, BULK_CALL_TIMEOUT, "bulk path resolution")
            .await
        else {
            return Vec::new();
        };

        let Ok(value) = recovery::recover(&response, &RecoverOptions::default(), &NoRepair).await
        else {
            eprintln!(
                "{}: bulk path resolution returned unparseable JSON",
                "Warning".yellow()
            );
            return Vec::new();
        };

        match serde_json::from_value::<Vec<WirePathMapping>>(value) {
            Ok(mappings) => mappings
                .into_iter()
                .map(|m| PathMapping {
                    original_title: m.original_chapter_title,
                    determined_path: m.determined_full_path,
                })
                .collect(),
            Err(_) => {
                eprintln!(
                    "{}: bulk path resolution response had an unexpected shape",
                    "Warning".yellow()
                );
                Vec::new()
            }
        }
    }

    async fn resolve_single(&self, title: &str, tree_text: &str) -> Option<String> {
        let prompt = prompts::single_path_prompt(tree_text, title);
        let response = self
            .generate_with_retry(&prompt, SINGLE_CALL_TIMEOUT, "individual path resolution")
            .await
            .ok()?;

        let path = crate::recovery::strip_markdown_fence(&response);
        let path = path.trim().trim_matches('`').trim();
        if path.is_empty() || path.contains('\n') {
            return None;
        }
        Some(path.to_string())
    }
}
