use std::collections::{BTreeSet, HashMap};

/// One parsed line of an ASCII project tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub depth: usize,
    pub is_directory: bool,
}

/// Result of walking a full tree listing: files keyed by basename, declared
/// directory paths (trailing slash), and the project root folder if one was
/// identifiable.
#[derive(Debug, Clone, Default)]
pub struct ParsedTree {
    pub file_map: HashMap<String, String>,
    pub directory_paths: BTreeSet<String>,
    pub root_folder: String,
}

impl ParsedTree {
    pub fn is_empty(&self) -> bool {
        self.file_map.is_empty() && self.directory_paths.is_empty()
    }
}

const BOX_PREFIXES: [&str; 3] = ["├── ", "└── ", "│   "];

/// Parse a single tree line into a node.
///
/// Depth is inferred from the column width of everything preceding the entry
/// name (leading whitespace plus box-drawing prefixes, both 4 columns per
/// level) divided by the 4-column indent unit. This assumption, and the glyph
/// set below, match the trees LLMs actually emit; both are fragile enough
/// that all glyph variants are pinned down by tests here rather than spread
/// around callers. Lines that reduce to an empty name, or stray fence markers
/// left in the tree text, yield `None`.
pub fn line_to_node(line: &str) -> Option<TreeNode> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    let mut prefix_width = line.chars().count() - trimmed.chars().count();

    let mut rest = trimmed;
    loop {
        let mut stripped = false;
        for prefix in BOX_PREFIXES {
            if let Some(after) = rest.strip_prefix(prefix) {
                rest = after;
                prefix_width += prefix.chars().count();
                stripped = true;
            }
        }
        if !stripped {
            break;
        }
    }
    let glyph_count = rest.chars().count();
    let rest = rest
        .trim_start_matches(|c: char| matches!(c, '│' | '├' | '└' | '─') || c.is_whitespace());
    prefix_width += glyph_count - rest.chars().count();
    let name = rest.trim();

    if name.is_empty() || name.starts_with("```") {
        return None;
    }

    let is_directory = name.ends_with('/');
    let name = name.trim_end_matches('/');
    if name.is_empty() {
        return None;
    }

    let depth = ((prefix_width as f64) / 4.0).round() as usize;
    Some(TreeNode {
        name: name.to_string(),
        depth,
        is_directory,
    })
}

/// Walk a multi-line tree listing into a [`ParsedTree`].
///
/// A stack of ancestor directories keyed by depth drives path construction:
/// before each node, entries at a depth greater than or equal to the node's
/// are popped, which handles both siblings and dedents. Known artifacts of
/// LLM-generated trees (a duplicated `root/root/` prefix and `src/src/`
/// segments) are collapsed during construction.
pub fn parse_tree(structure_text: &str) -> ParsedTree {
    let lines: Vec<&str> = structure_text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .collect();

    let mut tree = ParsedTree::default();
    let mut path_stack: Vec<String> = Vec::new();
    let mut depth_stack: Vec<i64> = vec![-1];

    for line in &lines {
        let Some(node) = line_to_node(line) else {
            continue;
        };
        let depth = node.depth as i64;

        while depth <= *depth_stack.last().expect("sentinel depth") {
            if path_stack.is_empty() || depth_stack.len() <= 1 {
                break;
            }
            path_stack.pop();
            depth_stack.pop();
        }

        let parent = path_stack.join("/");
        let mut full_path = if parent.is_empty() {
            node.name.clone()
        } else {
            format!("{}/{}", parent, node.name)
        };

        if tree.root_folder.is_empty() && depth == 0 && node.is_directory {
            tree.root_folder = node.name.clone();
        }

        if !tree.root_folder.is_empty() {
            let doubled = format!("{0}/{0}/", tree.root_folder);
            while full_path.starts_with(&doubled) {
                full_path = full_path[tree.root_folder.len() + 1..].to_string();
            }
        }
        full_path = collapse_src_duplicates(&full_path);

        if node.is_directory {
            tree.directory_paths.insert(format!("{full_path}/"));
            path_stack.push(node.name);
            depth_stack.push(depth);
        } else {
            tree.file_map.insert(node.name, full_path);
        }
    }

    if tree.root_folder.is_empty() && !tree.is_empty() {
        let top_level: Vec<TreeNode> = lines
            .iter()
            .filter_map(|l| line_to_node(l))
            .filter(|n| n.depth == 0)
            .collect();
        if top_level.len() == 1 && top_level[0].is_directory {
            tree.root_folder = top_level[0].name.clone();
        }
    }

    tree
}

/// Collapse repeated `src/src/` segments until the path stops changing.
pub(crate) fn collapse_src_duplicates(path: &str) -> String {
    let mut current = path.to_string();
    loop {
        let next = current.replace("src/src/", "src/");
        if next == current {
            return current;
        }
        current = next;
    }
}
