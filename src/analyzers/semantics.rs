//! C2: semantic explicitness analysis.
//!
//! Measures how much of the code carries explicit semantic cues: type
//! annotations, conventional naming, named constants instead of magic
//! numbers, type-checker configuration, and null-safety discipline.
//! Language results are combined by LOC-weighted mean.

use std::path::Path;

use async_trait::async_trait;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tree_sitter::Node;

use crate::core::classify::AnalysisTarget;
use crate::core::config::CategoryId;
use crate::core::errors::{ReadinessError, Result};
use crate::core::pipeline::{AnalysisContext, AnalysisResult, Analyzer};
use crate::lang::common::{has_ancestor_of_kind, named_children, walk, ParsedUnit};
use crate::lang::profile::NamingStyle;
use crate::lang::registry;

/// Values never counted as magic numbers.
const BENIGN_LITERALS: &[f64] = &[0.0, 1.0, -1.0, 2.0];

/// Per-language evidence cap; the extractor keeps far fewer.
const SITE_LIMIT: usize = 200;

/// A flagged literal or identifier location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedSite {
    /// Repository-relative file path
    pub file: String,
    /// 1-based line
    pub line: usize,
    /// The offending token text
    pub token: String,
}

/// C2 analyzer output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticsMetrics {
    /// Whether any source file parsed
    pub available: bool,
    /// Annotated positions / annotatable positions, percent
    pub type_annotation_pct: f64,
    /// Identifiers conforming to the language convention, percent
    pub naming_consistency_pct: f64,
    /// Magic literals per 1000 source lines
    pub magic_numbers_per_kloc: f64,
    /// 1.0 when a type-checker configuration was detected
    pub type_strictness: f64,
    /// Guarded nullable accesses, percent
    pub null_safety_pct: f64,
    /// Magic-number locations
    pub magic_sites: Vec<FlaggedSite>,
    /// Non-conforming identifier locations
    pub misnamed_sites: Vec<FlaggedSite>,
}

impl SemanticsMetrics {
    /// Placeholder for a failed or skipped run.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default)]
struct LanguageTally {
    loc: usize,
    annotated: usize,
    annotatable: usize,
    conforming: usize,
    named: usize,
    magic_count: usize,
    nullable_guarded: usize,
    nullable_total: usize,
    magic_sites: Vec<FlaggedSite>,
    misnamed_sites: Vec<FlaggedSite>,
}

impl LanguageTally {
    fn merge(&mut self, other: LanguageTally) {
        self.loc += other.loc;
        self.annotated += other.annotated;
        self.annotatable += other.annotatable;
        self.conforming += other.conforming;
        self.named += other.named;
        self.magic_count += other.magic_count;
        self.nullable_guarded += other.nullable_guarded;
        self.nullable_total += other.nullable_total;
        self.magic_sites.extend(other.magic_sites);
        self.misnamed_sites.extend(other.misnamed_sites);
    }
}

/// C2: semantic explicitness analyzer.
#[derive(Debug, Default)]
pub struct SemanticsAnalyzer;

impl SemanticsAnalyzer {
    /// Create the analyzer.
    pub fn new() -> Self {
        Self
    }

    fn tally_unit(unit: &ParsedUnit) -> LanguageTally {
        let mut tally = LanguageTally {
            loc: unit.line_count(),
            ..LanguageTally::default()
        };

        tally_annotations(unit, &mut tally);
        tally_naming(unit, &mut tally);
        tally_magic_numbers(unit, &mut tally);
        tally_null_safety(unit, &mut tally);

        tally
    }
}

#[async_trait]
impl Analyzer for SemanticsAnalyzer {
    fn category(&self) -> CategoryId {
        CategoryId::SemanticExplicitness
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        if ctx.targets.is_empty() {
            return Err(ReadinessError::input("no analysis targets"));
        }

        let mut tallies: Vec<(String, LanguageTally)> = Vec::new();
        for target in ctx.targets.iter() {
            let mut merged = LanguageTally::default();
            let per_file: Vec<LanguageTally> = target
                .source_files()
                .collect::<Vec<_>>()
                .par_iter()
                .filter_map(|file| {
                    match ParsedUnit::parse_file(&target.language, &file.path, &file.rel_path) {
                        Ok(unit) => Some(Self::tally_unit(&unit)),
                        Err(err) => {
                            debug!(file = %file.rel_path, error = %err, "skipping file");
                            None
                        }
                    }
                })
                .collect();
            for tally in per_file {
                merged.merge(tally);
            }
            if merged.loc > 0 {
                tallies.push((target.language.clone(), merged));
            }
        }

        if tallies.is_empty() {
            return Ok(AnalysisResult::SemanticExplicitness(
                SemanticsMetrics::unavailable(),
            ));
        }

        let total_loc: usize = tallies.iter().map(|(_, t)| t.loc).sum();
        let weight = |t: &LanguageTally| t.loc as f64 / total_loc as f64;

        let mut annotation_pct = 0.0;
        let mut naming_pct = 0.0;
        let mut magic_per_kloc = 0.0;
        let mut strictness = 0.0;
        let mut null_safety = 0.0;
        let mut magic_sites = Vec::new();
        let mut misnamed_sites = Vec::new();

        for (language, tally) in &tallies {
            let w = weight(tally);
            let info = registry::language_by_key(language);
            let statically_typed = info.is_some_and(|i| i.statically_typed);

            let annotated_ratio = if statically_typed {
                100.0
            } else if tally.annotatable == 0 {
                0.0
            } else {
                tally.annotated as f64 * 100.0 / tally.annotatable as f64
            };
            annotation_pct += w * annotated_ratio;

            let conforming_ratio = if tally.named == 0 {
                100.0
            } else {
                tally.conforming as f64 * 100.0 / tally.named as f64
            };
            naming_pct += w * conforming_ratio;

            magic_per_kloc += w * (tally.magic_count as f64 * 1000.0 / tally.loc as f64);

            strictness += w * if statically_typed || strictness_config_present(&ctx.root, language)
            {
                1.0
            } else {
                0.0
            };

            let guarded_ratio = if tally.nullable_total == 0 {
                100.0
            } else {
                tally.nullable_guarded as f64 * 100.0 / tally.nullable_total as f64
            };
            null_safety += w * guarded_ratio;

            magic_sites.extend(tally.magic_sites.iter().cloned());
            misnamed_sites.extend(tally.misnamed_sites.iter().cloned());
        }

        let sort_sites = |sites: &mut Vec<FlaggedSite>| {
            sites.sort_by(|a, b| a.file.cmp(&b.file).then_with(|| a.line.cmp(&b.line)));
            sites.truncate(SITE_LIMIT);
        };
        sort_sites(&mut magic_sites);
        sort_sites(&mut misnamed_sites);

        Ok(AnalysisResult::SemanticExplicitness(SemanticsMetrics {
            available: true,
            type_annotation_pct: annotation_pct,
            naming_consistency_pct: naming_pct,
            magic_numbers_per_kloc: magic_per_kloc,
            type_strictness: strictness.round(),
            null_safety_pct: null_safety,
            magic_sites,
            misnamed_sites,
        }))
    }
}

/// Detect a static type-checker configuration for a dynamic language.
fn strictness_config_present(root: &Path, language: &str) -> bool {
    match language {
        "py" => {
            if root.join("mypy.ini").is_file() || root.join(".mypy.ini").is_file() {
                return true;
            }
            file_contains(root.join("setup.cfg"), "[mypy]")
                || file_contains(root.join("pyproject.toml"), "[tool.mypy]")
                || file_contains(root.join("pyproject.toml"), "[tool.pyright]")
        }
        "ts" | "js" => file_contains(root.join("tsconfig.json"), "\"strict\": true"),
        _ => false,
    }
}

fn file_contains(path: std::path::PathBuf, needle: &str) -> bool {
    std::fs::read_to_string(path).is_ok_and(|content| content.contains(needle))
}

fn tally_annotations(unit: &ParsedUnit, tally: &mut LanguageTally) {
    let profile = unit.profile();
    if registry::language_by_key(profile.key).is_some_and(|i| i.statically_typed) {
        return;
    }

    let mut visit = |node: Node<'_>| {
        if !profile.is_function(node.kind()) {
            return;
        }
        let Some(params) = node.child_by_field_name("parameters") else {
            return;
        };

        let in_class = has_ancestor_of_kind(&node, profile.class_kinds);
        let mut first = true;
        for param in named_children(&params) {
            let kind = param.kind();
            // Variadic capture patterns are not annotatable positions.
            if matches!(kind, "list_splat_pattern" | "dictionary_splat_pattern" | "rest_pattern") {
                first = false;
                continue;
            }
            // Receiver parameters of methods are excluded.
            if first && in_class && profile.key == "py" {
                let text = unit.text_of(&param);
                if text == "self" || text == "cls" {
                    first = false;
                    continue;
                }
            }
            first = false;

            tally.annotatable += 1;
            let annotated = match profile.key {
                "py" => matches!(kind, "typed_parameter" | "typed_default_parameter"),
                "ts" => param.child_by_field_name("type").is_some(),
                _ => false,
            };
            if annotated {
                tally.annotated += 1;
            }
        }

        // The return position counts once per function.
        tally.annotatable += 1;
        if node.child_by_field_name("return_type").is_some() {
            tally.annotated += 1;
        }
    };
    walk(unit.root(), &mut visit);
}

fn tally_naming(unit: &ParsedUnit, tally: &mut LanguageTally) {
    let profile = unit.profile();

    let mut record = |name: &str, style: NamingStyle, line: usize, tally: &mut LanguageTally| {
        // Dunder and single-character names carry no convention signal.
        if name.len() <= 1 || (name.starts_with("__") && name.ends_with("__")) {
            return;
        }
        let trimmed = name.trim_start_matches('_');
        if trimmed.is_empty() {
            return;
        }
        tally.named += 1;
        if style.matches(trimmed) {
            tally.conforming += 1;
        } else if tally.misnamed_sites.len() < SITE_LIMIT {
            tally.misnamed_sites.push(FlaggedSite {
                file: unit.rel_path().to_string(),
                line,
                token: name.to_string(),
            });
        }
    };

    let mut visit = |node: Node<'_>| {
        let line = node.start_position().row + 1;
        if profile.is_function(node.kind()) {
            if let Some(name) = node.child_by_field_name("name") {
                record(unit.text_of(&name), profile.function_style, line, tally);
            }
        } else if profile.class_kinds.contains(&node.kind())
            || matches!(node.kind(), "type_spec" | "type_alias_declaration")
        {
            if let Some(name) = node.child_by_field_name("name") {
                record(unit.text_of(&name), profile.type_style, line, tally);
            }
        }
    };
    walk(unit.root(), &mut visit);
}

fn tally_magic_numbers(unit: &ParsedUnit, tally: &mut LanguageTally) {
    let profile = unit.profile();

    let mut visit = |node: Node<'_>| {
        if !profile.number_kinds.contains(&node.kind()) {
            return;
        }
        let raw = unit.text_of(&node);
        let negated = node
            .parent()
            .is_some_and(|p| matches!(p.kind(), "unary_operator" | "unary_expression"));
        let Ok(parsed) = raw.replace('_', "").parse::<f64>() else {
            return;
        };
        let value = if negated { -parsed } else { parsed };
        if BENIGN_LITERALS.contains(&value) {
            return;
        }

        if has_ancestor_of_kind(&node, profile.const_kinds)
            || has_ancestor_of_kind(&node, profile.index_kinds)
            || assigned_to_screaming_name(unit, &node)
        {
            return;
        }

        tally.magic_count += 1;
        if tally.magic_sites.len() < SITE_LIMIT {
            tally.magic_sites.push(FlaggedSite {
                file: unit.rel_path().to_string(),
                line: node.start_position().row + 1,
                token: raw.to_string(),
            });
        }
    };
    walk(unit.root(), &mut visit);
}

/// Whether a literal is the right-hand side of an ALL_CAPS assignment.
fn assigned_to_screaming_name(unit: &ParsedUnit, node: &Node<'_>) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if matches!(parent.kind(), "assignment" | "variable_declarator" | "const_spec") {
            let name = parent
                .child_by_field_name("left")
                .or_else(|| parent.child_by_field_name("name"));
            if let Some(name) = name {
                let text = unit.text_of(&name);
                return !text.is_empty()
                    && text
                        .chars()
                        .all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit());
            }
        }
        // Stop at statement boundaries.
        if unit.profile().block_kinds.contains(&parent.kind()) {
            return false;
        }
        current = parent.parent();
    }
    false
}

fn tally_null_safety(unit: &ParsedUnit, tally: &mut LanguageTally) {
    let profile = unit.profile();

    let mut visit = |node: Node<'_>| {
        if !profile.is_function(node.kind()) {
            return;
        }
        let Some(params) = node.child_by_field_name("parameters") else {
            return;
        };
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let body_text = unit.text_of(&body);

        for param in named_children(&params) {
            let param_text = unit.text_of(&param);
            let (nullable, name) = match profile.key {
                "py" => (
                    param_text.contains("Optional[") || param_text.contains("| None"),
                    param_text.split(':').next().unwrap_or("").trim().to_string(),
                ),
                "ts" => (
                    param.kind() == "optional_parameter"
                        || param_text.contains("| null")
                        || param_text.contains("| undefined"),
                    param_text
                        .trim_end_matches('?')
                        .split([':', '?'])
                        .next()
                        .unwrap_or("")
                        .trim()
                        .to_string(),
                ),
                "go" => (
                    param_text.contains('*'),
                    param_text
                        .split_whitespace()
                        .next()
                        .unwrap_or("")
                        .to_string(),
                ),
                _ => (false, String::new()),
            };

            if !nullable || name.is_empty() {
                continue;
            }
            tally.nullable_total += 1;

            let guarded = match profile.key {
                "py" => {
                    body_text.contains(&format!("{name} is None"))
                        || body_text.contains(&format!("{name} is not None"))
                        || body_text.contains(&format!("if {name}"))
                }
                "ts" => {
                    body_text.contains(&format!("{name} =="))
                        || body_text.contains(&format!("{name} !="))
                        || body_text.contains(&format!("{name}?."))
                        || body_text.contains(&format!("if ({name}"))
                }
                "go" => {
                    body_text.contains(&format!("{name} != nil"))
                        || body_text.contains(&format!("{name} == nil"))
                }
                _ => false,
            };
            if guarded {
                tally.nullable_guarded += 1;
            }
        }
    };
    walk(unit.root(), &mut visit);
}
