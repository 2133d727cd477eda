//! C4: documentation analysis.
//!
//! Artifact presence, README size, comment density, public-API doc
//! coverage, and optional LLM rubric scores when an adjudicator is
//! attached.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::core::config::CategoryId;
use crate::core::errors::{ReadinessError, Result};
use crate::core::pipeline::{AnalysisContext, AnalysisResult, Analyzer};
use crate::judge::Adjudicator;
use crate::lang::common::{named_children, walk, ParsedUnit};

/// Diagram file extensions.
const DIAGRAM_EXTENSIONS: &[&str] = &["png", "svg", "mermaid", "drawio", "puml"];

/// Base-name keywords marking a file as a diagram.
const DIAGRAM_KEYWORDS: &[&str] = &["diagram", "architecture", "arch", "flow", "design", "overview"];

/// README excerpt length sent to rubric prompts.
const RUBRIC_CONTENT_LIMIT: usize = 12_000;

/// One LLM rubric outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricScore {
    /// Rubric identifier
    pub name: String,
    /// Score in 1..=10
    pub score: u8,
    /// Adjudicator reasoning
    pub reasoning: String,
}

/// C4 analyzer output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentationMetrics {
    /// Whether the repository could be inspected
    pub available: bool,
    /// README detected at the root
    pub readme_present: bool,
    /// Unicode-aware README word count
    pub readme_word_count: usize,
    /// CHANGELOG detected
    pub changelog_present: bool,
    /// CONTRIBUTING detected (root or .github/)
    pub contributing_present: bool,
    /// Examples directory or >= 2 fenced code blocks in README
    pub examples_present: bool,
    /// Architecture diagrams detected
    pub diagrams_present: bool,
    /// Comment lines / source lines, percent
    pub comment_density_pct: f64,
    /// Documented public declarations, percent
    pub api_doc_coverage_pct: f64,
    /// Rubric scores, present only when an adjudicator ran
    pub rubric_scores: Vec<RubricScore>,
    /// Undocumented public declarations (module, symbol, line)
    pub undocumented: Vec<(String, String, usize)>,
}

impl DocumentationMetrics {
    /// Placeholder for a failed or skipped run.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Fraction of the five artifacts present, as a percentage.
    pub fn artifact_presence_pct(&self) -> f64 {
        let present = [
            self.readme_present,
            self.changelog_present,
            self.contributing_present,
            self.examples_present,
            self.diagrams_present,
        ]
        .iter()
        .filter(|&&p| p)
        .count();
        present as f64 * 100.0 / 5.0
    }
}

/// The four documentation rubrics.
const RUBRICS: &[(&str, &str)] = &[
    (
        "readme_clarity",
        "Rate the clarity of this README for a newcomer: purpose, setup, and usage should be discoverable without reading code.",
    ),
    (
        "example_quality",
        "Rate the quality of usage examples in this documentation: runnable, current, and covering the main entry points.",
    ),
    (
        "completeness",
        "Rate the overall completeness of this documentation relative to what the project appears to do.",
    ),
    (
        "cross_reference_coherence",
        "Rate how coherently this documentation cross-references its own sections, files, and external resources.",
    ),
];

/// C4: documentation analyzer.
#[derive(Default)]
pub struct DocumentationAnalyzer {
    adjudicator: Option<Arc<dyn Adjudicator>>,
}

impl DocumentationAnalyzer {
    /// Create the analyzer without LLM rubrics.
    pub fn new() -> Self {
        Self { adjudicator: None }
    }

    /// Attach an adjudicator for the four rubric scores.
    pub fn with_adjudicator(adjudicator: Arc<dyn Adjudicator>) -> Self {
        Self {
            adjudicator: Some(adjudicator),
        }
    }
}

#[async_trait]
impl Analyzer for DocumentationAnalyzer {
    fn category(&self) -> CategoryId {
        CategoryId::Documentation
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        if !ctx.root.is_dir() {
            return Err(ReadinessError::input(format!(
                "unreadable root: {}",
                ctx.root.display()
            )));
        }

        let readme_path = find_root_file(&ctx.root, "readme");
        let readme_text = readme_path
            .as_ref()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .unwrap_or_default();

        let mut metrics = DocumentationMetrics {
            available: true,
            readme_present: readme_path.is_some(),
            readme_word_count: readme_text.unicode_words().count(),
            changelog_present: find_root_file(&ctx.root, "changelog").is_some(),
            contributing_present: find_root_file(&ctx.root, "contributing").is_some()
                || find_root_file(&ctx.root.join(".github"), "contributing").is_some(),
            examples_present: ctx.root.join("examples").is_dir()
                || fenced_block_count(&readme_text) >= 2,
            diagrams_present: diagrams_present(&ctx.root),
            ..DocumentationMetrics::default()
        };

        let (comment_lines, source_lines, documented, public_total, mut undocumented) =
            scan_sources(ctx);
        metrics.comment_density_pct = if source_lines == 0 {
            0.0
        } else {
            comment_lines as f64 * 100.0 / source_lines as f64
        };
        metrics.api_doc_coverage_pct = if public_total == 0 {
            100.0
        } else {
            documented as f64 * 100.0 / public_total as f64
        };
        undocumented.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.2.cmp(&b.2)));
        metrics.undocumented = undocumented;

        if let Some(adjudicator) = &self.adjudicator {
            let excerpt: String = readme_text.chars().take(RUBRIC_CONTENT_LIMIT).collect();
            for (name, rubric) in RUBRICS {
                // Each rubric is independently failure-tolerant.
                match adjudicator.judge(rubric, &excerpt).await {
                    Ok(verdict) => metrics.rubric_scores.push(RubricScore {
                        name: (*name).to_string(),
                        score: verdict.score,
                        reasoning: verdict.reasoning,
                    }),
                    Err(err) => {
                        debug!(rubric = name, error = %err, "rubric skipped");
                    }
                }
            }
        }

        Ok(AnalysisResult::Documentation(metrics))
    }
}

/// Find a root-level file whose stem matches `stem` case-insensitively.
fn find_root_file(dir: &Path, stem: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut matches: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.eq_ignore_ascii_case(stem))
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Count fenced code blocks in markdown text.
fn fenced_block_count(text: &str) -> usize {
    text.lines()
        .filter(|line| line.trim_start().starts_with("```"))
        .count()
        / 2
}

/// Diagram files anywhere under the root, or mermaid fences in markdown.
fn diagrams_present(root: &Path) -> bool {
    for entry in walkdir::WalkDir::new(root)
        .max_depth(4)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();

        if DIAGRAM_EXTENSIONS.contains(&ext.as_str()) {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_ascii_lowercase();
            if DIAGRAM_KEYWORDS.iter().any(|k| stem.contains(k)) {
                return true;
            }
        }

        if (ext == "md" || ext == "markdown")
            && std::fs::read_to_string(path).is_ok_and(|text| text.contains("```mermaid"))
        {
            return true;
        }
    }
    false
}

/// Parse every source file, returning comment/source line counts and
/// public-API documentation tallies.
fn scan_sources(
    ctx: &AnalysisContext,
) -> (usize, usize, usize, usize, Vec<(String, String, usize)>) {
    #[derive(Default)]
    struct FileTally {
        comment_lines: usize,
        source_lines: usize,
        documented: usize,
        public_total: usize,
        undocumented: Vec<(String, String, usize)>,
    }

    let mut totals = FileTally::default();
    for target in ctx.targets.iter() {
        let tallies: Vec<FileTally> = target
            .source_files()
            .collect::<Vec<_>>()
            .par_iter()
            .filter_map(|file| {
                let unit =
                    match ParsedUnit::parse_file(&target.language, &file.path, &file.rel_path) {
                        Ok(unit) => unit,
                        Err(err) => {
                            debug!(file = %file.rel_path, error = %err, "skipping file");
                            return None;
                        }
                    };

                let mut tally = FileTally {
                    comment_lines: unit.comment_lines(),
                    source_lines: unit.line_count(),
                    ..FileTally::default()
                };
                for (symbol, line, documented) in documented_exports(&unit) {
                    tally.public_total += 1;
                    if documented {
                        tally.documented += 1;
                    } else {
                        tally
                            .undocumented
                            .push((file.rel_path.clone(), symbol, line));
                    }
                }
                Some(tally)
            })
            .collect();

        for tally in tallies {
            totals.comment_lines += tally.comment_lines;
            totals.source_lines += tally.source_lines;
            totals.documented += tally.documented;
            totals.public_total += tally.public_total;
            totals.undocumented.extend(tally.undocumented);
        }
    }

    (
        totals.comment_lines,
        totals.source_lines,
        totals.documented,
        totals.public_total,
        totals.undocumented,
    )
}

/// For each exported symbol: (name, line, has a doc comment or docstring).
fn documented_exports(unit: &ParsedUnit) -> Vec<(String, usize, bool)> {
    let profile = unit.profile();
    let exports = profile.exports(unit);
    if exports.is_empty() {
        return Vec::new();
    }

    let mut results = Vec::new();
    let mut visit = |node: tree_sitter::Node<'_>| {
        let line = node.start_position().row + 1;
        let Some(export) = exports.iter().find(|e| e.line == line) else {
            return;
        };
        let matches_decl = node
            .child_by_field_name("name")
            .map(|n| unit.text_of(&n) == export.name)
            .unwrap_or(false);
        if !matches_decl {
            return;
        }

        let documented = if profile.uses_docstrings {
            has_docstring(unit, &node)
        } else {
            has_preceding_doc_comment(unit, &node)
        };
        results.push((export.name.clone(), line, documented));
    };
    walk(unit.root(), &mut visit);

    results.sort_by(|a, b| a.1.cmp(&b.1));
    results.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1);
    results
}

/// Python-style: the body's first statement is a string expression.
fn has_docstring(unit: &ParsedUnit, node: &tree_sitter::Node<'_>) -> bool {
    let Some(body) = node.child_by_field_name("body") else {
        return false;
    };
    named_children(&body)
        .first()
        .map(|first| {
            first.kind() == "expression_statement"
                && named_children(first)
                    .first()
                    .is_some_and(|inner| unit.profile().string_kinds.contains(&inner.kind()))
        })
        .unwrap_or(false)
}

/// Comment-prefix style: an adjacent preceding comment with a doc prefix.
fn has_preceding_doc_comment(unit: &ParsedUnit, node: &tree_sitter::Node<'_>) -> bool {
    let profile = unit.profile();
    let decl_row = node.start_position().row;

    // Exported declarations may be wrapped (export_statement); look at the
    // wrapper's neighbour when the direct one is absent.
    let mut candidate = node.prev_sibling();
    if candidate.is_none() {
        candidate = node.parent().and_then(|p| p.prev_sibling());
    }

    while let Some(prev) = candidate {
        if profile.comment_kinds.contains(&prev.kind()) {
            if prev.end_position().row + 1 >= decl_row {
                let text = unit.text_of(&prev);
                return profile
                    .doc_comment_prefixes
                    .iter()
                    .any(|prefix| text.starts_with(prefix));
            }
            return false;
        }
        // Attributes and modifiers sit between doc comments and the item.
        if matches!(prev.kind(), "attribute_item" | "decorator") {
            candidate = prev.prev_sibling();
            continue;
        }
        return false;
    }
    false
}
