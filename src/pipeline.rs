use anyhow::{anyhow, Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::exporter::SKIP_TITLE_KEYWORDS;
use crate::prompts;
use crate::providers::LLMProvider;
use crate::recovery::{self, RecoverOptions};
use crate::resolver::LlmAssist;
use crate::store::{Document, DocumentStore};
use crate::tree::{parse_tree, ParsedTree};

const OUTLINE_REPAIR_ATTEMPTS: u32 = 2;
const GENERATION_TIMEOUT: Duration = Duration::from_secs(180);

/// Title of the synthetic chapter holding the ASCII project tree. It is
/// always the first chapter of the code document; the exporter depends on
/// that position.
pub const STRUCTURE_CHAPTER_TITLE: &str = "Project Structure";

/// First-chapter title of a combined code-plus-tests document.
pub const QA_STRUCTURE_CHAPTER_TITLE: &str = "Project Structure (with Tests)";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct ChapterOutline {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct OutlineResponse {
    pub chapters: Vec<ChapterOutline>,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub idea: String,
    pub title: String,
    pub language: String,
    pub chapter_count: usize,
}

#[derive(Debug, Clone)]
pub struct QaRequest {
    /// Title of the code document to generate tests for.
    pub code_title: String,
    /// Kind of tests to write (unit, integration, ...).
    pub test_type: String,
    pub language: String,
    pub framework: Option<String>,
}

/// Drives the three generation phases end to end: outline, per-chapter
/// specifications, per-chapter code plus the authoritative project tree.
/// Each phase persists one document; re-running a phase replaces its
/// document.
pub struct PipelineOrchestrator<'a> {
    provider: &'a LLMProvider,
    store: &'a DocumentStore,
}

impl<'a> PipelineOrchestrator<'a> {
    pub fn new(provider: &'a LLMProvider, store: &'a DocumentStore) -> Self {
        Self { provider, store }
    }

    /// Returns the title of the code document the exporter should consume.
    pub async fn run(&self, request: &GenerationRequest) -> Result<String> {
        let outline = self.generate_outline(request).await?;
        println!(
            "{} outline with {} chapters",
            "Generated".green(),
            outline.chapters.len()
        );

        let specifications = self.generate_specifications(request, &outline).await?;
        let code_title = self.generate_code(request, &specifications).await?;

        println!("{} code document '{}'", "Saved".green(), code_title);
        Ok(code_title)
    }

    async fn generate_outline(&self, request: &GenerationRequest) -> Result<OutlineResponse> {
        let assist = LlmAssist::new(self.provider);
        let prompt =
            prompts::outline_prompt(&request.idea, &request.language, request.chapter_count);
        let response = assist
            .generate_with_retry(&prompt, GENERATION_TIMEOUT, "outline generation")
            .await?;

        let schema = schema_for!(OutlineResponse);
        let options = RecoverOptions {
            max_llm_attempts: OUTLINE_REPAIR_ATTEMPTS,
            schema_hint: Some(serde_json::to_string(&schema)?),
            example_hint: Some(
                r#"{"chapters": [{"title": "app.js", "summary": "Application entry point."}]}"#
                    .to_string(),
            ),
        };
        let value = recovery::recover(&response, &options, &assist)
            .await
            .context("Outline response never became valid JSON")?;
        let outline: OutlineResponse =
            serde_json::from_value(value).context("Outline JSON has an unexpected shape")?;

        if outline.chapters.is_empty() {
            return Err(anyhow!("Outline contained no chapters"));
        }

        let chapters: Vec<(String, String)> = outline
            .chapters
            .iter()
            .map(|c| (c.title.clone(), c.summary.clone()))
            .collect();
        self.store.save_phase_document(
            &format!("{}_Phase 1", request.title),
            "outline",
            &request.idea,
            &chapters,
        )?;

        Ok(outline)
    }

    async fn generate_specifications(
        &self,
        request: &GenerationRequest,
        outline: &OutlineResponse,
    ) -> Result<Vec<(String, String)>> {
        let assist = LlmAssist::new(self.provider);
        let document_context = outline
            .chapters
            .iter()
            .map(|c| format!("## {}\n{}", c.title, c.summary))
            .collect::<Vec<_>>()
            .join("\n\n");

        let progress_bar = ProgressBar::new(outline.chapters.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        let mut specifications = Vec::with_capacity(outline.chapters.len());
        for chapter in &outline.chapters {
            progress_bar.set_message(format!("Specifying: {}", chapter.title));
            let prompt = prompts::specification_prompt(
                &document_context,
                &chapter.title,
                &chapter.summary,
            );
            // A failed expansion falls back to the outline summary rather
            // than aborting the whole phase.
            let body = match assist
                .generate_with_retry(&prompt, GENERATION_TIMEOUT, "specification generation")
                .await
            {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    eprintln!(
                        "{}: specification for '{}' failed ({}), keeping outline summary",
                        "Warning".yellow(),
                        chapter.title,
                        e
                    );
                    chapter.summary.clone()
                }
            };
            specifications.push((chapter.title.clone(), body));
            progress_bar.inc(1);
        }
        progress_bar.finish_with_message("✓ Specifications complete");

        self.store.save_phase_document(
            &format!("{}_Phase 2", request.title),
            "specification",
            &request.idea,
            &specifications,
        )?;

        Ok(specifications)
    }

    async fn generate_code(
        &self,
        request: &GenerationRequest,
        specifications: &[(String, String)],
    ) -> Result<String> {
        let assist = LlmAssist::new(self.provider);
        let document_context = specifications
            .iter()
            .map(|(title, _)| title.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let progress_bar = ProgressBar::new(specifications.len() as u64 + 1);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        let mut chapters: Vec<(String, String)> = Vec::with_capacity(specifications.len() + 1);
        for (title, specification) in specifications {
            progress_bar.set_message(format!("Coding: {title}"));
            let prompt = prompts::module_code_prompt(
                &request.language,
                &document_context,
                title,
                specification,
            );
            let body = match assist
                .generate_with_retry(&prompt, GENERATION_TIMEOUT, "code generation")
                .await
            {
                Ok(text) => recovery::strip_markdown_fence(text.trim()),
                Err(e) => {
                    eprintln!(
                        "{}: code for '{}' failed ({}), writing placeholder",
                        "Warning".yellow(),
                        title,
                        e
                    );
                    format!("// Code generation failed for '{title}'.\n// Re-run the pipeline to fill this file in.\n")
                }
            };
            chapters.push((title.clone(), body));
            progress_bar.inc(1);
        }

        progress_bar.set_message("Deriving project structure");
        let titles: Vec<String> = specifications.iter().map(|(t, _)| t.clone()).collect();
        let tree_prompt = prompts::structure_tree_prompt(&request.language, &titles);
        let tree_text = assist
            .generate_with_retry(&tree_prompt, GENERATION_TIMEOUT, "structure generation")
            .await?;
        let tree_text = recovery::strip_markdown_fence(tree_text.trim());
        progress_bar.inc(1);
        progress_bar.finish_with_message("✓ Code generation complete");

        chapters.insert(0, (STRUCTURE_CHAPTER_TITLE.to_string(), tree_text));

        let code_title = format!("{} Code", request.title);
        self.store
            .save_phase_document(&code_title, "code", &request.idea, &chapters)?;

        Ok(code_title)
    }

    /// Generate a test suite for an existing code document and save the
    /// combined result (updated tree, application code, test files) as a new
    /// document, exportable like any other code document. Returns its title.
    pub async fn run_qa(&self, request: &QaRequest) -> Result<String> {
        let document = self
            .store
            .get_document(&request.code_title)?
            .ok_or_else(|| anyhow!("No document titled '{}'", request.code_title))?;

        let (structure_text, app_chapters) = qa_source_chapters(&document);
        if app_chapters.is_empty() {
            return Err(anyhow!(
                "Document '{}' has no code chapters to test",
                request.code_title
            ));
        }

        let assist = LlmAssist::new(self.provider);
        let structure_prompt = prompts::qa_structure_prompt(
            &request.language,
            &request.test_type,
            request.framework.as_deref(),
            &structure_text,
        );
        let updated_tree_text = assist
            .generate_with_retry(&structure_prompt, GENERATION_TIMEOUT, "test structure update")
            .await?;
        let updated_tree_text = recovery::strip_markdown_fence(updated_tree_text.trim());

        let updated = parse_tree(&updated_tree_text);
        if updated.is_empty() {
            return Err(anyhow!(
                "Updated project structure did not parse to a usable tree"
            ));
        }
        let test_paths = new_test_paths(&parse_tree(&structure_text), &updated);

        let app_context = app_chapters
            .iter()
            .map(|(title, code)| format!("/* Code for {title} */\n{code}"))
            .collect::<Vec<_>>()
            .join("\n\n");

        let progress_bar = ProgressBar::new(test_paths.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        let mut test_chapters: Vec<(String, String)> = Vec::with_capacity(test_paths.len());
        for path in &test_paths {
            progress_bar.set_message(format!("Testing: {path}"));
            let prompt = prompts::qa_test_file_prompt(
                &request.language,
                &request.test_type,
                request.framework.as_deref(),
                &app_context,
                &updated_tree_text,
                path,
            );
            let body = match assist
                .generate_with_retry(&prompt, GENERATION_TIMEOUT, "test generation")
                .await
            {
                Ok(text) => recovery::strip_markdown_fence(text.trim()),
                Err(e) => {
                    eprintln!(
                        "{}: tests for '{}' failed ({}), writing placeholder",
                        "Warning".yellow(),
                        path,
                        e
                    );
                    format!("// Test generation failed for '{path}'.\n// Re-run the qa command to fill this file in.\n")
                }
            };
            test_chapters.push((basename(path).to_string(), body));
            progress_bar.inc(1);
        }
        progress_bar.finish_with_message("✓ Test generation complete");

        if test_chapters.is_empty() {
            eprintln!(
                "{}: the updated structure added no recognizable test files",
                "Warning".yellow()
            );
            test_chapters.push((
                "Test Generation Summary".to_string(),
                "No test files were identified in the updated project structure.".to_string(),
            ));
        }

        let mut chapters = Vec::with_capacity(app_chapters.len() + test_chapters.len() + 1);
        chapters.push((QA_STRUCTURE_CHAPTER_TITLE.to_string(), updated_tree_text));
        chapters.extend(app_chapters);
        chapters.extend(test_chapters);

        let qa_title = qa_document_title(&request.code_title);
        self.store.save_phase_document(
            &qa_title,
            "code_with_tests",
            &document.synopsis,
            &chapters,
        )?;

        Ok(qa_title)
    }
}

/// Split a code document into its structure text and the chapters holding
/// application code. Filler chapters and chapters that already hold tests are
/// left out, so re-running QA against a combined document does not test the
/// tests.
pub(crate) fn qa_source_chapters(document: &Document) -> (String, Vec<(String, String)>) {
    let mut chapters = document.chapters.iter();
    let structure_text = chapters
        .next()
        .map(|c| c.paragraphs.join("\n\n"))
        .unwrap_or_default();

    let code = chapters
        .filter(|c| {
            !SKIP_TITLE_KEYWORDS
                .iter()
                .any(|keyword| c.title.contains(keyword))
                && !is_test_path(&c.title)
        })
        .map(|c| (c.title.clone(), c.paragraphs.join("\n\n")))
        .collect();

    (structure_text, code)
}

/// Paths that read as test files: under a test directory, or named with the
/// usual test/spec markers.
pub(crate) fn is_test_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    if lower.starts_with("tests/")
        || lower.starts_with("test/")
        || lower.contains("/tests/")
        || lower.contains("/test/")
    {
        return true;
    }
    let name = basename(&lower);
    name.starts_with("test_")
        || name.contains(".test.")
        || name.contains("_test.")
        || name.contains(".spec.")
        || name.contains("_spec.")
}

/// Files present in the updated tree but not the original, filtered to those
/// that read as test files and sorted for a stable generation order.
pub(crate) fn new_test_paths(original: &ParsedTree, updated: &ParsedTree) -> Vec<String> {
    let existing: HashSet<&String> = original.file_map.values().collect();
    let mut paths: Vec<String> = updated
        .file_map
        .values()
        .filter(|path| !existing.contains(path) && is_test_path(path))
        .cloned()
        .collect();
    paths.sort();
    paths
}

pub(crate) fn qa_document_title(code_title: &str) -> String {
    let base = code_title.strip_suffix(" Code").unwrap_or(code_title);
    format!("{base} + QA")
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests;
