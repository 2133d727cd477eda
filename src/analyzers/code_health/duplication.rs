//! Structural duplicate detection.
//!
//! Statement windows are hashed by a structural walk that records node
//! kinds, child counts, and operator/literal tokens while eliding
//! identifier text, so renamed copies collide. Windows need at least 3
//! statements spanning at least 6 source lines to qualify.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tree_sitter::Node;
use xxhash_rust::xxh3::Xxh3;

use crate::lang::common::{walk, ParsedUnit, SourceSpan};

/// Minimum statements per duplicate window.
pub const MIN_STATEMENTS: usize = 3;

/// Minimum source lines per duplicate window.
pub const MIN_LINES: usize = 6;

/// Upper bound on window size, to keep module-level blocks tractable.
const MAX_WINDOW: usize = 40;

/// Identifier-bearing kinds whose text is elided from hashes.
const IDENTIFIER_KINDS: &[&str] = &[
    "identifier",
    "field_identifier",
    "type_identifier",
    "property_identifier",
    "shorthand_property_identifier",
    "shorthand_property_identifier_pattern",
    "package_identifier",
    "statement_identifier",
];

/// One code span participating in a duplicate pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSpan {
    /// Repository-relative file path
    pub file: String,
    /// 1-based first line
    pub start_line: usize,
    /// 1-based last line
    pub end_line: usize,
}

impl CodeSpan {
    fn contains(&self, other: &CodeSpan) -> bool {
        self.file == other.file
            && self.start_line <= other.start_line
            && other.end_line <= self.end_line
    }

    fn overlaps(&self, other: &CodeSpan) -> bool {
        self.file == other.file
            && self.start_line <= other.end_line
            && other.start_line <= self.end_line
    }
}

/// An unordered pair of structurally identical code spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateBlock {
    /// First span (lexicographically smaller location)
    pub first: CodeSpan,
    /// Second span
    pub second: CodeSpan,
    /// Number of statements in each span
    pub statement_count: usize,
    /// Source lines covered by the first span
    pub line_count: usize,
    /// Shared structural hash
    pub hash: u64,
}

#[derive(Debug, Clone)]
struct WindowCandidate {
    span: CodeSpan,
    statement_count: usize,
    hash: u64,
}

/// Detector accumulating statement windows across files.
#[derive(Debug, Default)]
pub struct DuplicateDetector {
    candidates: Vec<WindowCandidate>,
}

impl DuplicateDetector {
    /// Create an empty detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one parsed file's statement blocks into the detector.
    pub fn add_unit<'u>(&mut self, unit: &'u ParsedUnit) {
        let profile = unit.profile();
        let mut blocks: Vec<Vec<Node<'u>>> = Vec::new();

        let mut visit = |node: Node<'u>| {
            if !profile.block_kinds.contains(&node.kind()) {
                return;
            }
            let mut cursor = node.walk();
            let statements: Vec<Node<'_>> = node
                .named_children(&mut cursor)
                .filter(|child| !profile.comment_kinds.contains(&child.kind()))
                .collect();
            if statements.len() >= MIN_STATEMENTS {
                blocks.push(statements);
            }
        };
        walk(unit.root(), &mut visit);

        for statements in &blocks {
            self.add_block(unit, statements);
        }
    }

    fn add_block(&mut self, unit: &ParsedUnit, statements: &[Node<'_>]) {
        let statement_hashes: Vec<u64> = statements
            .iter()
            .map(|s| statement_hash(unit, s))
            .collect();

        let n = statements.len();
        for width in MIN_STATEMENTS..=n.min(MAX_WINDOW) {
            for start in 0..=(n - width) {
                let span = CodeSpan {
                    file: unit.rel_path().to_string(),
                    start_line: SourceSpan::of(&statements[start]).start_line,
                    end_line: SourceSpan::of(&statements[start + width - 1]).end_line,
                };
                if span.end_line - span.start_line + 1 < MIN_LINES {
                    continue;
                }

                let mut hasher = Xxh3::new();
                hasher.update(&(width as u64).to_le_bytes());
                for hash in &statement_hashes[start..start + width] {
                    hasher.update(&hash.to_le_bytes());
                }

                self.candidates.push(WindowCandidate {
                    span,
                    statement_count: width,
                    hash: hasher.digest(),
                });
            }
        }
    }

    /// Absorb candidates scanned by another detector (parallel workers).
    pub fn merge(&mut self, other: DuplicateDetector) {
        self.candidates.extend(other.candidates);
    }

    /// Emit one block per duplicated pair, widest windows first, skipping
    /// pairs subsumed by an already-emitted wider pair and same-file pairs
    /// whose spans overlap.
    pub fn finish(self) -> Vec<DuplicateBlock> {
        let mut groups: IndexMap<u64, Vec<WindowCandidate>> = IndexMap::new();
        for candidate in self.candidates {
            groups.entry(candidate.hash).or_default().push(candidate);
        }

        let mut groups: Vec<Vec<WindowCandidate>> = groups
            .into_values()
            .filter(|group| group.len() >= 2)
            .collect();
        for group in &mut groups {
            group.sort_by(|a, b| {
                a.span
                    .file
                    .cmp(&b.span.file)
                    .then_with(|| a.span.start_line.cmp(&b.span.start_line))
            });
        }
        // Widest windows first; deterministic tie-break by location.
        groups.sort_by(|a, b| {
            b[0].statement_count
                .cmp(&a[0].statement_count)
                .then_with(|| a[0].span.file.cmp(&b[0].span.file))
                .then_with(|| a[0].span.start_line.cmp(&b[0].span.start_line))
        });

        let mut blocks: Vec<DuplicateBlock> = Vec::new();
        for group in groups {
            for i in 0..group.len() {
                for j in (i + 1)..group.len() {
                    let (a, b) = (&group[i], &group[j]);
                    if a.span.overlaps(&b.span) {
                        continue;
                    }
                    let subsumed = blocks.iter().any(|existing| {
                        (existing.first.contains(&a.span) && existing.second.contains(&b.span))
                            || (existing.first.contains(&b.span)
                                && existing.second.contains(&a.span))
                    });
                    if subsumed {
                        continue;
                    }

                    blocks.push(DuplicateBlock {
                        first: a.span.clone(),
                        second: b.span.clone(),
                        statement_count: a.statement_count,
                        line_count: a.span.end_line - a.span.start_line + 1,
                        hash: a.hash,
                    });
                }
            }
        }

        blocks
    }
}

/// Duplicated-line union across all reported blocks, per file.
pub fn duplicated_line_count(blocks: &[DuplicateBlock]) -> usize {
    let mut lines: BTreeSet<(String, usize)> = BTreeSet::new();
    for block in blocks {
        for span in [&block.first, &block.second] {
            for line in span.start_line..=span.end_line {
                lines.insert((span.file.clone(), line));
            }
        }
    }
    lines.len()
}

fn statement_hash(unit: &ParsedUnit, statement: &Node<'_>) -> u64 {
    let mut hasher = Xxh3::new();
    hash_node(unit, statement, &mut hasher);
    hasher.digest()
}

fn hash_node(unit: &ParsedUnit, node: &Node<'_>, hasher: &mut Xxh3) {
    let kind = node.kind();
    if IDENTIFIER_KINDS.contains(&kind) {
        hasher.update(b"<id>");
        return;
    }

    hasher.update(kind.as_bytes());

    if node.child_count() == 0 {
        let profile = unit.profile();
        let literal = profile.number_kinds.contains(&kind)
            || profile.string_kinds.contains(&kind)
            || kind == "string_content"
            || kind == "escape_sequence";
        if literal {
            hasher.update(unit.text_of(node).as_bytes());
        }
        return;
    }

    hasher.update(&(node.named_child_count() as u32).to_le_bytes());
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        hash_node(unit, &child, hasher);
    }
}
