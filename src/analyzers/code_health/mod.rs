//! C1: code health analysis.
//!
//! Complexity, function length, file size, coupling counts, and structural
//! duplicate detection, computed per language and merged by averaging the
//! per-language subtotals.

pub mod complexity;
pub mod coupling;
pub mod duplication;

use std::collections::BTreeMap;

use async_trait::async_trait;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::bundle::MetricSummary;
use crate::core::classify::AnalysisTarget;
use crate::core::config::CategoryId;
use crate::core::errors::{ReadinessError, Result};
use crate::core::pipeline::{AnalysisContext, AnalysisResult, Analyzer};
use crate::lang::common::ParsedUnit;

pub use complexity::FunctionRecord;
pub use duplication::{CodeSpan, DuplicateBlock};

/// C1 analyzer output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeHealthMetrics {
    /// Whether any source file parsed
    pub available: bool,
    /// Cyclomatic complexity distribution (bearer: qualified function name)
    pub complexity: MetricSummary,
    /// Function line-count distribution
    pub function_length: MetricSummary,
    /// File line-count distribution (bearer: file path)
    pub file_size: MetricSummary,
    /// Duplicated-line percentage over all source lines
    pub duplication_pct: f64,
    /// Every extracted function record
    pub functions: Vec<FunctionRecord>,
    /// Every reported duplicate pair
    pub duplicates: Vec<DuplicateBlock>,
    /// Module -> inbound intra-repo reference count
    pub afferent: BTreeMap<String, usize>,
    /// Module -> outbound intra-repo reference count
    pub efferent: BTreeMap<String, usize>,
    /// Total source lines across all parsed files
    pub total_source_lines: usize,
}

impl CodeHealthMetrics {
    /// Placeholder for a failed or skipped run.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Largest coupling count in either direction, with its module.
    pub fn max_coupling(&self) -> (f64, String) {
        self.afferent
            .iter()
            .chain(self.efferent.iter())
            .map(|(module, &count)| (count as f64, module.clone()))
            .fold((0.0, String::new()), |best, candidate| {
                if candidate.0 > best.0 || (candidate.0 == best.0 && candidate.1 < best.1) {
                    candidate
                } else {
                    best
                }
            })
    }
}

struct FileOutcome {
    functions: Vec<FunctionRecord>,
    line_count: usize,
    rel_path: String,
    duplication: duplication::DuplicateDetector,
}

struct LanguageSubtotal {
    avg_complexity: f64,
    avg_file_size: f64,
}

/// C1: code health analyzer.
#[derive(Debug, Default)]
pub struct CodeHealthAnalyzer;

impl CodeHealthAnalyzer {
    /// Create the analyzer.
    pub fn new() -> Self {
        Self
    }

    fn analyze_target(
        target: &AnalysisTarget,
    ) -> (Vec<FileOutcome>, Option<LanguageSubtotal>) {
        // Each worker parses one file at a time; the unit is dropped before
        // the worker takes the next file.
        let outcomes: Vec<FileOutcome> = target
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

                let mut duplication = duplication::DuplicateDetector::new();
                duplication.add_unit(&unit);

                Some(FileOutcome {
                    functions: complexity::extract_functions(&unit),
                    line_count: unit.line_count(),
                    rel_path: file.rel_path.to_string(),
                    duplication,
                })
            })
            .collect();

        if outcomes.is_empty() {
            return (outcomes, None);
        }

        let functions: Vec<&FunctionRecord> =
            outcomes.iter().flat_map(|o| o.functions.iter()).collect();
        let avg_complexity = if functions.is_empty() {
            0.0
        } else {
            functions.iter().map(|f| f.complexity as f64).sum::<f64>() / functions.len() as f64
        };
        let avg_file_size =
            outcomes.iter().map(|o| o.line_count as f64).sum::<f64>() / outcomes.len() as f64;

        (
            outcomes,
            Some(LanguageSubtotal {
                avg_complexity,
                avg_file_size,
            }),
        )
    }
}

#[async_trait]
impl Analyzer for CodeHealthAnalyzer {
    fn category(&self) -> CategoryId {
        CategoryId::CodeHealth
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        if ctx.targets.is_empty() {
            return Err(ReadinessError::input("no analysis targets"));
        }

        let mut all_outcomes: Vec<FileOutcome> = Vec::new();
        let mut subtotals: Vec<LanguageSubtotal> = Vec::new();
        for target in ctx.targets.iter() {
            let (outcomes, subtotal) = Self::analyze_target(target);
            all_outcomes.extend(outcomes);
            subtotals.extend(subtotal);
        }

        if all_outcomes.is_empty() {
            return Ok(AnalysisResult::CodeHealth(CodeHealthMetrics::unavailable()));
        }
        all_outcomes.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

        let mut functions: Vec<FunctionRecord> = Vec::new();
        let mut detector = duplication::DuplicateDetector::new();
        let mut total_source_lines = 0usize;
        for outcome in all_outcomes.iter_mut() {
            functions.append(&mut outcome.functions);
            total_source_lines += outcome.line_count;
            detector.merge(std::mem::take(&mut outcome.duplication));
        }

        let duplicates = detector.finish();
        let duplicated_lines = duplication::duplicated_line_count(&duplicates);
        let duplication_pct = if total_source_lines == 0 {
            0.0
        } else {
            duplicated_lines as f64 * 100.0 / total_source_lines as f64
        };

        let complexity_summary = MetricSummary::from_pairs(
            functions
                .iter()
                .map(|f| (f.complexity as f64, f.qualified_name.as_str())),
        );
        let length_summary = MetricSummary::from_pairs(
            functions
                .iter()
                .map(|f| (f.line_count as f64, f.qualified_name.as_str())),
        );
        let file_summary = MetricSummary::from_pairs(
            all_outcomes
                .iter()
                .map(|o| (o.line_count as f64, o.rel_path.as_str())),
        );

        // Averages are merged across languages by averaging the subtotals,
        // so one large language does not swamp a smaller one.
        let merged_complexity =
            subtotals.iter().map(|s| s.avg_complexity).sum::<f64>() / subtotals.len() as f64;
        let merged_file_size =
            subtotals.iter().map(|s| s.avg_file_size).sum::<f64>() / subtotals.len() as f64;

        let graph = coupling::build_import_graph(&ctx.targets)?;

        Ok(AnalysisResult::CodeHealth(CodeHealthMetrics {
            available: true,
            complexity: MetricSummary {
                average: merged_complexity,
                ..complexity_summary
            },
            function_length: length_summary,
            file_size: MetricSummary {
                average: merged_file_size,
                ..file_summary
            },
            duplication_pct,
            functions,
            duplicates,
            afferent: graph.afferent(),
            efferent: graph.efferent(),
            total_source_lines,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::classify_repository;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    async fn run(dir: &TempDir) -> CodeHealthMetrics {
        let targets = classify_repository(dir.path()).unwrap();
        let ctx = AnalysisContext::new(dir.path(), targets);
        match CodeHealthAnalyzer::new().analyze(&ctx).await.unwrap() {
            AnalysisResult::CodeHealth(metrics) => metrics,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn measures_functions_and_files() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "calc.py",
            "def add(a, b):\n    return a + b\n\ndef branchy(x):\n    if x:\n        return 1\n    return 0\n",
        );

        let metrics = run(&dir).await;
        assert!(metrics.available);
        assert_eq!(metrics.functions.len(), 2);
        assert_eq!(metrics.complexity.max, 2.0);
        assert_eq!(metrics.complexity.max_bearer, "branchy");
        assert_eq!(metrics.file_size.max_bearer, "calc.py");
    }

    #[tokio::test]
    async fn empty_targets_fail_with_input_error() {
        let ctx = AnalysisContext::new("/nowhere", Vec::new());
        let err = CodeHealthAnalyzer::new().analyze(&ctx).await.unwrap_err();
        assert!(matches!(err, ReadinessError::Input { .. }));
    }

    #[tokio::test]
    async fn unparseable_tree_yields_unavailable() {
        let dir = TempDir::new().unwrap();
        // A directory with a single unreadable target list (no source files).
        write(dir.path(), "data/readme.md", "# not code\n");

        let targets = classify_repository(dir.path()).unwrap();
        assert!(targets.is_empty());
    }

    #[tokio::test]
    async fn duplication_rate_reflects_copies() {
        let dir = TempDir::new().unwrap();
        let body = "    a = load(x)\n    b = parse(a)\n    c = validate(b)\n    d = normalize(c)\n    e = index(d)\n    f = cache(e)\n    return f\n";
        write(dir.path(), "one.py", &format!("def first(x):\n{body}"));
        write(dir.path(), "two.py", &format!("def second(x):\n{body}"));

        let metrics = run(&dir).await;
        assert_eq!(metrics.duplicates.len(), 1);
        assert!(metrics.duplication_pct > 0.0);
    }

    #[tokio::test]
    async fn coupling_maps_are_populated() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.py", "import util\n");
        write(dir.path(), "util.py", "x = 1\n");

        let metrics = run(&dir).await;
        assert_eq!(metrics.efferent["main.py"], 1);
        assert_eq!(metrics.afferent["util.py"], 1);
        assert_eq!(metrics.max_coupling().0, 1.0);
    }
}
