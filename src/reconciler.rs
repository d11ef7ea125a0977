use colored::*;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use thiserror::Error;

use crate::tree::{collapse_src_duplicates, ParsedTree};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("project structure tree parsed to zero nodes")]
    TreeParseEmpty,
    #[error("no file path could be determined for chapter '{0}'")]
    PathResolutionFailed(String),
    #[error("path for chapter '{0}' sanitized to an empty string")]
    PathSanitizationEmpty(String),
}

/// A named unit of generated content (a document chapter) awaiting placement
/// into the project tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    pub original_title: String,
    pub determined_path: String,
}

/// External resolution of chapter titles to file paths when tree matching
/// fails, typically backed by an LLM with the tree text as the authoritative
/// structure. Implementations must not fail: return an empty vec / `None` on
/// any internal error.
pub trait PathResolver {
    fn resolve_batch(
        &self,
        titles: &[String],
        tree_text: &str,
    ) -> impl std::future::Future<Output = Vec<PathMapping>> + Send;

    fn resolve_single(
        &self,
        title: &str,
        tree_text: &str,
    ) -> impl std::future::Future<Output = Option<String>> + Send;
}

/// Resolver that never answers. Reconciling with it keeps the cheap tree
/// matching but leaves everything else unresolved, which is what offline
/// previews want.
pub struct NoResolution;

impl PathResolver for NoResolution {
    async fn resolve_batch(&self, _titles: &[String], _tree_text: &str) -> Vec<PathMapping> {
        Vec::new()
    }

    async fn resolve_single(&self, _title: &str, _tree_text: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub mappings: Vec<PathMapping>,
    pub unresolved: Vec<String>,
}

impl ReconcileReport {
    /// Strict policy for filesystem materialization: any unresolved chapter
    /// is an error rather than a dropped file.
    pub fn require_complete(self) -> Result<Vec<PathMapping>, ReconcileError> {
        match self.unresolved.into_iter().next() {
            None => Ok(self.mappings),
            Some(title) => Err(ReconcileError::PathResolutionFailed(title)),
        }
    }
}

/// Determine a tree path for every content block.
///
/// Matching runs cheapest-first: exact basename lookup, then
/// basename-without-extension equality against the tree's file map. All
/// blocks that remain are resolved through one batched external call; only
/// the leftovers of that batch fall back to individual calls, serialized with
/// an inter-call delay to respect provider rate limits. Blocks unresolved
/// after both rounds are reported in `unresolved`, never silently mapped.
pub async fn reconcile_paths(
    tree: &ParsedTree,
    tree_text: &str,
    blocks: &[ContentBlock],
    resolver: &impl PathResolver,
    call_delay: Duration,
) -> Result<ReconcileReport, ReconcileError> {
    if tree.is_empty() {
        return Err(ReconcileError::TreeParseEmpty);
    }

    let mut report = ReconcileReport::default();
    let mut unmatched: Vec<&ContentBlock> = Vec::new();

    for block in blocks {
        match match_in_tree(tree, &block.title) {
            Some(path) => report.mappings.push(PathMapping {
                original_title: block.title.clone(),
                determined_path: path,
            }),
            None => unmatched.push(block),
        }
    }
    if unmatched.is_empty() {
        return Ok(report);
    }

    let titles: Vec<String> = unmatched.iter().map(|b| b.title.clone()).collect();
    let mut batch_resolved: HashMap<String, String> = resolver
        .resolve_batch(&titles, tree_text)
        .await
        .into_iter()
        .map(|m| (m.original_title, m.determined_path))
        .collect();

    let mut still_unmatched: Vec<&ContentBlock> = Vec::new();
    for block in unmatched {
        match batch_resolved.remove(&block.title) {
            Some(path) if !path.trim().is_empty() => report.mappings.push(PathMapping {
                original_title: block.title.clone(),
                determined_path: path,
            }),
            _ => still_unmatched.push(block),
        }
    }

    for (i, block) in still_unmatched.into_iter().enumerate() {
        if i > 0 && !call_delay.is_zero() {
            tokio::time::sleep(call_delay).await;
        }
        match resolver.resolve_single(&block.title, tree_text).await {
            Some(path) if !path.trim().is_empty() => report.mappings.push(PathMapping {
                original_title: block.title.clone(),
                determined_path: path,
            }),
            _ => {
                eprintln!(
                    "{}: no path could be determined for chapter '{}'",
                    "Warning".yellow(),
                    block.title
                );
                report.unresolved.push(block.title.clone());
            }
        }
    }

    Ok(report)
}

fn match_in_tree(tree: &ParsedTree, title: &str) -> Option<String> {
    let title = title.trim();
    if let Some(path) = tree.file_map.get(title) {
        return Some(path.clone());
    }

    let stem = file_stem(title);
    if stem.is_empty() {
        return None;
    }
    // Basename-without-extension equality; smallest basename wins so the
    // outcome does not depend on hash map iteration order.
    tree.file_map
        .iter()
        .filter(|(basename, _)| file_stem(basename).eq_ignore_ascii_case(stem))
        .min_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, path)| path.clone())
}

// Only a dot in the final path segment marks an extension; dots in directory
// names (v1.0/) must not.
fn file_stem(name: &str) -> &str {
    let base = name.rfind('/').map_or(0, |i| i + 1);
    match name[base..].rfind('.') {
        Some(i) if i > 0 => &name[..base + i],
        _ => name,
    }
}

/// Entry in the final project map: file content, or a marker for a declared
/// directory with no files beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectEntry {
    File(String),
    Folder,
}

pub type ProjectCodeMap = BTreeMap<String, ProjectEntry>;

/// Assemble the final, collision-free path map ready for materialization.
///
/// Every determined path is sanitized before placement; a path colliding with
/// an already-placed one is renamed by inserting `_N` before the extension.
/// Blocks sharing a title are consumed in document order, one per mapping, so
/// each keeps its own content through the renaming. Declared directories not
/// implied by any placed file get a folder marker so empty directories still
/// materialize.
pub fn build_code_map(
    mappings: &[PathMapping],
    blocks: &[ContentBlock],
    tree: &ParsedTree,
) -> Result<ProjectCodeMap, ReconcileError> {
    let mut contents: HashMap<&str, VecDeque<&str>> = HashMap::new();
    for block in blocks {
        contents
            .entry(block.title.as_str())
            .or_default()
            .push_back(block.content.as_str());
    }

    let mut map = ProjectCodeMap::new();
    for mapping in mappings {
        let path = sanitize_path(&mapping.determined_path, &tree.root_folder);
        if path.is_empty() {
            return Err(ReconcileError::PathSanitizationEmpty(
                mapping.original_title.clone(),
            ));
        }
        let content = contents
            .get_mut(mapping.original_title.as_str())
            .and_then(|queue| queue.pop_front())
            .unwrap_or("")
            .to_string();

        if map.contains_key(&path) {
            let renamed = dedupe_path(&map, &path);
            eprintln!(
                "{}: path collision for '{}' (chapter '{}'), saved as '{}'",
                "Warning".yellow(),
                path,
                mapping.original_title,
                renamed
            );
            map.insert(renamed, ProjectEntry::File(content));
        } else {
            map.insert(path, ProjectEntry::File(content));
        }
    }

    for dir in &tree.directory_paths {
        let dir = sanitize_path(dir, &tree.root_folder);
        if dir.is_empty() || map.contains_key(&dir) {
            continue;
        }
        let implied_by_file = map.iter().any(|(path, entry)| {
            matches!(entry, ProjectEntry::File(_))
                && (path.starts_with(&format!("{dir}/")) || dir.starts_with(&format!("{path}/")))
        });
        if !implied_by_file {
            map.insert(dir, ProjectEntry::Folder);
        }
    }

    Ok(map)
}

/// Sanitize a resolved path: collapse duplicated root/src segments, strip
/// parent-directory escapes, and trim surrounding slashes and whitespace.
pub(crate) fn sanitize_path(path: &str, root_folder: &str) -> String {
    let mut p = collapse_src_duplicates(path.trim());
    if !root_folder.is_empty() {
        let doubled = format!("{0}/{0}/", root_folder);
        while p.starts_with(&doubled) {
            p = p[root_folder.len() + 1..].to_string();
        }
    }
    p = p.replace("../", "");
    p.trim_matches('/').trim().to_string()
}

fn dedupe_path(map: &ProjectCodeMap, path: &str) -> String {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    let (base, ext) = match path[name_start..].rfind('.') {
        Some(i) if i > 0 => path.split_at(name_start + i),
        _ => (path, ""),
    };
    let mut n = 1;
    loop {
        let candidate = format!("{base}_{n}{ext}");
        if !map.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
