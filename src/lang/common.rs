//! Parsed-unit abstraction over tree-sitter.
//!
//! A [`ParsedUnit`] exclusively owns its syntax tree and source bytes; node
//! handles borrow from it and cannot outlive it. Workers release each unit
//! before parsing the next file to bound memory.

use std::path::Path;

use tree_sitter::{Node, Tree};

use crate::core::errors::{ReadinessError, Result};
use crate::lang::profile::LanguageProfile;
use crate::lang::registry;

/// A line/column span within one file, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    /// First line of the span
    pub start_line: usize,
    /// Last line of the span
    pub end_line: usize,
}

impl SourceSpan {
    /// Span of a node, converted from tree-sitter's 0-based rows.
    pub fn of(node: &Node) -> Self {
        Self {
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
        }
    }

    /// Number of source lines covered, inclusive.
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// One parsed source file: tree, bytes, and profile.
pub struct ParsedUnit {
    source: String,
    tree: Tree,
    profile: &'static LanguageProfile,
    rel_path: String,
}

impl ParsedUnit {
    /// Parse source text under a language key.
    pub fn parse(key: &str, source: String, rel_path: &str) -> Result<Self> {
        let profile = LanguageProfile::for_key(key).ok_or_else(|| {
            ReadinessError::parse("profile", format!("no syntax profile for '{key}'"))
        })?;
        let mut parser = registry::parser_for(key)?;
        let tree = parser.parse(&source, None).ok_or_else(|| {
            ReadinessError::parse_in_file(key, "tree-sitter returned no tree", rel_path)
        })?;

        Ok(Self {
            source,
            tree,
            profile,
            rel_path: rel_path.to_string(),
        })
    }

    /// Read and parse a file from disk.
    pub fn parse_file(key: &str, path: &Path, rel_path: &str) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| ReadinessError::io(format!("failed to read {}", path.display()), e))?;
        let source = String::from_utf8_lossy(&bytes).into_owned();
        Self::parse(key, source, rel_path)
    }

    /// The root syntax node.
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// The raw source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Repository-relative path of the parsed file.
    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    /// The language's syntax profile.
    pub fn profile(&self) -> &'static LanguageProfile {
        self.profile
    }

    /// UTF-8 text slice of a node.
    pub fn text_of(&self, node: &Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or_default()
    }

    /// Total number of source lines.
    pub fn line_count(&self) -> usize {
        self.source.lines().count()
    }

    /// Pre-order walk of every node in the tree.
    pub fn for_each_node<F>(&self, mut callback: F)
    where
        F: FnMut(Node<'_>),
    {
        walk(self.root(), &mut callback);
    }

    /// Number of comment lines, counting block comments by row span.
    pub fn comment_lines(&self) -> usize {
        let mut total = 0;
        self.for_each_node(|node| {
            if self.profile.comment_kinds.contains(&node.kind()) {
                total += SourceSpan::of(&node).line_count();
            }
        });
        total
    }
}

/// Recursive pre-order traversal.
pub fn walk<'a, F>(node: Node<'a>, callback: &mut F)
where
    F: FnMut(Node<'a>),
{
    callback(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, callback);
    }
}

/// Collect the named children of a node.
pub fn named_children<'a>(node: &Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Whether `node` lies inside a node of one of the given kinds, not counting
/// itself.
pub fn has_ancestor_of_kind(node: &Node, kinds: &[&str]) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if kinds.contains(&parent.kind()) {
            return true;
        }
        current = parent.parent();
    }
    false
}

/// The nearest enclosing node of one of the given kinds.
pub fn nearest_ancestor<'a>(node: &Node<'a>, kinds: &[&str]) -> Option<Node<'a>> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if kinds.contains(&parent.kind()) {
            return Some(parent);
        }
        current = parent.parent();
    }
    None
}
