use anyhow::{anyhow, Context, Result};
use colored::*;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::reconciler::{
    build_code_map, reconcile_paths, ContentBlock, NoResolution, PathResolver, ProjectCodeMap,
    ProjectEntry, ReconcileError,
};
use crate::store::Document;
use crate::tree::parse_tree;

/// Chapters whose titles contain one of these words are narrative filler
/// around the generated code, not files to place.
pub(crate) const SKIP_TITLE_KEYWORDS: [&str; 4] = ["Summary", "Fallback", "Overview", "Introduction"];

const STRUCTURE_FILE_NAME: &str = "PROJECT_STRUCTURE.txt";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Treat every unplaceable chapter as an error instead of degrading.
    pub strict: bool,
    /// Pause between serialized individual resolver calls.
    pub call_delay: Duration,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            strict: false,
            call_delay: crate::resolver::INDIVIDUAL_CALL_DELAY,
        }
    }
}

/// Everything needed to materialize a document, computed without touching
/// the filesystem so the preview command can share it.
#[derive(Debug)]
pub struct ExportPlan {
    pub tree_text: String,
    pub code_map: ProjectCodeMap,
    pub unresolved: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ExportSummary {
    pub files_written: usize,
    pub folders_created: usize,
}

/// Split a code document into its structure text (the first chapter) and the
/// placeable content blocks.
pub fn extract_project_blocks(document: &Document) -> (Option<String>, Vec<ContentBlock>) {
    let mut chapters = document.chapters.iter();

    let structure_text = chapters.next().map(|c| c.paragraphs.join("\n\n"));

    let blocks = chapters
        .filter(|c| {
            !SKIP_TITLE_KEYWORDS
                .iter()
                .any(|keyword| c.title.contains(keyword))
        })
        .map(|c| ContentBlock {
            title: c.title.clone(),
            content: c.paragraphs.join("\n\n"),
        })
        .collect();

    (structure_text, blocks)
}

/// Decide the on-disk path of every chapter for materialization. A document
/// without a usable tree cannot be exported safely and is always an error
/// here; unresolved chapters are dropped with a warning unless `strict` turns
/// them into errors too.
pub async fn plan_export(
    document: &Document,
    resolver: &impl PathResolver,
    options: &ExportOptions,
) -> Result<ExportPlan> {
    let (tree_text, tree, blocks) = split_document(document)?;

    if tree.is_empty() {
        return Err(ReconcileError::TreeParseEmpty)
            .context(format!("Document '{}' has no usable tree", document.title));
    }

    let report = reconcile_paths(&tree, &tree_text, &blocks, resolver, options.call_delay).await?;
    let (mappings, unresolved) = if options.strict {
        (report.require_complete()?, Vec::new())
    } else {
        (report.mappings, report.unresolved)
    };

    let code_map = build_code_map(&mappings, &blocks, &tree)?;
    Ok(ExportPlan {
        tree_text,
        code_map,
        unresolved,
    })
}

/// Display-only planning: no external calls, and a missing tree degrades to
/// a flat layout keyed by chapter title instead of failing.
pub async fn plan_preview(document: &Document) -> Result<ExportPlan> {
    let (tree_text, tree, blocks) = split_document(document)?;

    if tree.is_empty() {
        eprintln!(
            "{}: no usable project structure in '{}', showing a flat layout",
            "Warning".yellow(),
            document.title
        );
        return Ok(ExportPlan {
            tree_text,
            code_map: flat_code_map(&blocks),
            unresolved: Vec::new(),
        });
    }

    let report =
        reconcile_paths(&tree, &tree_text, &blocks, &NoResolution, Duration::ZERO).await?;
    let code_map = build_code_map(&report.mappings, &blocks, &tree)?;
    Ok(ExportPlan {
        tree_text,
        code_map,
        unresolved: report.unresolved,
    })
}

fn split_document(
    document: &Document,
) -> Result<(String, crate::tree::ParsedTree, Vec<ContentBlock>)> {
    let (structure_text, blocks) = extract_project_blocks(document);
    if blocks.is_empty() {
        return Err(anyhow!(
            "Document '{}' has no placeable chapters",
            document.title
        ));
    }
    let tree_text = structure_text.unwrap_or_default();
    let tree = parse_tree(&tree_text);
    Ok((tree_text, tree, blocks))
}

pub async fn export_document(
    document: &Document,
    output_dir: &Path,
    resolver: &impl PathResolver,
    options: &ExportOptions,
) -> Result<ExportSummary> {
    let plan = plan_export(document, resolver, options).await?;
    materialize(&plan, output_dir)
}

/// Write the planned files and folders under `output_dir`. The structure
/// text lands next to them unless a chapter already claimed its filename.
pub fn materialize(plan: &ExportPlan, output_dir: &Path) -> Result<ExportSummary> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut summary = ExportSummary::default();
    for (path, entry) in &plan.code_map {
        let target = output_dir.join(path);
        match entry {
            ProjectEntry::File(content) => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
                fs::write(&target, content)
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                summary.files_written += 1;
            }
            ProjectEntry::Folder => {
                fs::create_dir_all(&target)
                    .with_context(|| format!("Failed to create {}", target.display()))?;
                summary.folders_created += 1;
            }
        }
    }

    if !plan.tree_text.trim().is_empty() && !plan.code_map.contains_key(STRUCTURE_FILE_NAME) {
        fs::write(output_dir.join(STRUCTURE_FILE_NAME), &plan.tree_text)?;
        summary.files_written += 1;
    }

    Ok(summary)
}

fn flat_code_map(blocks: &[ContentBlock]) -> ProjectCodeMap {
    let mut map = ProjectCodeMap::new();
    for block in blocks {
        let name: String = block
            .title
            .trim()
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        if name.is_empty() {
            continue;
        }
        map.entry(name)
            .or_insert_with(|| ProjectEntry::File(block.content.clone()));
    }
    map
}
