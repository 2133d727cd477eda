//! C6: testing analysis.
//!
//! Test-to-code ratios, coverage artifact parsing, test isolation, and
//! assertion density. Coverage distinguishes "no artifact" (metric
//! unavailable) from zero percent.

pub mod coverage;

use async_trait::async_trait;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tree_sitter::Node;

use crate::core::bundle::MetricSummary;
use crate::core::config::CategoryId;
use crate::core::errors::{ReadinessError, Result};
use crate::core::pipeline::{AnalysisContext, AnalysisResult, Analyzer};
use crate::lang::common::{walk, ParsedUnit};

pub use coverage::{CoverageReport, CoverageSource};

/// One test function flagged as non-isolated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationBreach {
    /// Test file
    pub file: String,
    /// Test function name
    pub function: String,
    /// The external import that breaks isolation
    pub import: String,
}

/// One test function and its assertion count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFunctionRecord {
    /// `file::function` qualified name
    pub name: String,
    /// Matched assertion calls in the body
    pub assertions: usize,
}

/// C6 analyzer output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestingMetrics {
    /// Whether the repository could be inspected
    pub available: bool,
    /// Test LOC / source LOC
    pub test_to_code_ratio: f64,
    /// Test file count / source file count
    pub test_file_ratio: f64,
    /// Parsed coverage, absent when no artifact exists
    pub coverage: Option<CoverageReport>,
    /// Isolated tests, percent; vacuously 100 with zero tests
    pub test_isolation_pct: f64,
    /// Assertions per test function (bearer: qualified test name)
    pub assertion_density: MetricSummary,
    /// Number of test functions found
    pub test_function_count: usize,
    /// Non-isolated test functions
    pub breaches: Vec<IsolationBreach>,
    /// Test functions sorted by assertion count ascending (sparse first)
    pub test_functions: Vec<TestFunctionRecord>,
}

impl TestingMetrics {
    /// Placeholder for a failed or skipped run.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default)]
struct TestFileScan {
    rel_path: String,
    functions: Vec<(String, usize)>,
    external_import: Option<String>,
}

/// C6: testing analyzer.
#[derive(Debug, Default)]
pub struct TestingAnalyzer;

impl TestingAnalyzer {
    /// Create the analyzer.
    pub fn new() -> Self {
        Self
    }

    fn scan_test_file(unit: &ParsedUnit) -> TestFileScan {
        let profile = unit.profile();

        let external_import = profile.imports(unit).into_iter().find_map(|import| {
            profile
                .external_dep_markers
                .iter()
                .find(|marker| {
                    import.specifier == **marker
                        || import.specifier.starts_with(&format!("{marker}/"))
                        || import.specifier.starts_with(&format!("{marker}."))
                        || import.specifier.starts_with(&format!("{marker}::"))
                })
                .map(|_| import.specifier)
        });

        let mut functions = Vec::new();
        let mut visit = |node: Node<'_>| {
            if !profile.is_function(node.kind()) {
                return;
            }
            let Some(name_node) = node.child_by_field_name("name") else {
                return;
            };
            let name = unit.text_of(&name_node).to_string();
            let body_text = node
                .child_by_field_name("body")
                .map(|b| unit.text_of(&b).to_string())
                .unwrap_or_default();

            let assertions = profile
                .assertion_markers
                .iter()
                .map(|marker| body_text.matches(marker).count())
                .sum::<usize>();
            functions.push((name, assertions));
        };
        walk(unit.root(), &mut visit);

        TestFileScan {
            rel_path: unit.rel_path().to_string(),
            functions,
            external_import,
        }
    }
}

#[async_trait]
impl Analyzer for TestingAnalyzer {
    fn category(&self) -> CategoryId {
        CategoryId::Testing
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        if ctx.targets.is_empty() {
            return Err(ReadinessError::input("no analysis targets"));
        }

        let mut source_loc = 0usize;
        let mut test_loc = 0usize;
        let mut source_file_count = 0usize;
        let mut test_file_count = 0usize;
        let mut scans: Vec<TestFileScan> = Vec::new();

        for target in ctx.targets.iter() {
            for file in target.source_files() {
                source_file_count += 1;
                source_loc += count_lines(&file.path);
            }

            let per_file: Vec<(usize, Option<TestFileScan>)> = target
                .test_files()
                .collect::<Vec<_>>()
                .par_iter()
                .map(|file| {
                    let loc = count_lines(&file.path);
                    let scan = match ParsedUnit::parse_file(
                        &target.language,
                        &file.path,
                        &file.rel_path,
                    ) {
                        Ok(unit) => Some(Self::scan_test_file(&unit)),
                        Err(err) => {
                            debug!(file = %file.rel_path, error = %err, "skipping test file");
                            None
                        }
                    };
                    (loc, scan)
                })
                .collect();

            for (loc, scan) in per_file {
                test_file_count += 1;
                test_loc += loc;
                scans.extend(scan);
            }
        }

        if source_file_count == 0 && test_file_count == 0 {
            return Ok(AnalysisResult::Testing(TestingMetrics::unavailable()));
        }
        scans.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

        let coverage = match coverage::detect_coverage(&ctx.root) {
            Ok(report) => report,
            Err(err) => {
                // Malformed artifact: the metric is unavailable, the rest of
                // the category proceeds.
                debug!(error = %err, "coverage artifact unreadable");
                None
            }
        };

        let mut total_tests = 0usize;
        let mut isolated_tests = 0usize;
        let mut breaches = Vec::new();
        let mut density_pairs: Vec<(f64, String)> = Vec::new();

        for scan in &scans {
            for (function, assertions) in &scan.functions {
                total_tests += 1;
                density_pairs.push((
                    *assertions as f64,
                    format!("{}::{}", scan.rel_path, function),
                ));
                match &scan.external_import {
                    Some(import) => breaches.push(IsolationBreach {
                        file: scan.rel_path.clone(),
                        function: function.clone(),
                        import: import.clone(),
                    }),
                    None => isolated_tests += 1,
                }
            }
        }

        let test_isolation_pct = if total_tests == 0 {
            100.0
        } else {
            isolated_tests as f64 * 100.0 / total_tests as f64
        };

        let mut test_functions: Vec<TestFunctionRecord> = density_pairs
            .iter()
            .map(|(assertions, name)| TestFunctionRecord {
                name: name.clone(),
                assertions: *assertions as usize,
            })
            .collect();
        test_functions.sort_by(|a, b| {
            a.assertions
                .cmp(&b.assertions)
                .then_with(|| a.name.cmp(&b.name))
        });
        test_functions.truncate(200);

        Ok(AnalysisResult::Testing(TestingMetrics {
            available: true,
            test_to_code_ratio: if source_loc == 0 {
                0.0
            } else {
                test_loc as f64 / source_loc as f64
            },
            test_file_ratio: if source_file_count == 0 {
                0.0
            } else {
                test_file_count as f64 / source_file_count as f64
            },
            coverage,
            test_isolation_pct,
            assertion_density: MetricSummary::from_pairs(
                density_pairs.iter().map(|(v, name)| (*v, name.as_str())),
            ),
            test_function_count: total_tests,
            breaches,
            test_functions,
        }))
    }
}

fn count_lines(path: &std::path::Path) -> usize {
    std::fs::read_to_string(path)
        .map(|text| text.lines().count())
        .unwrap_or(0)
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

    async fn run(dir: &TempDir) -> TestingMetrics {
        let targets = classify_repository(dir.path()).unwrap();
        let ctx = AnalysisContext::new(dir.path(), targets);
        match TestingAnalyzer::new().analyze(&ctx).await.unwrap() {
            AnalysisResult::Testing(metrics) => metrics,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn ratios_compare_test_and_source() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.py", "a = 1\nb = 2\nc = 3\nd = 4\n");
        write(dir.path(), "test_app.py", "def test_a():\n    assert True\n");

        let metrics = run(&dir).await;
        assert!((metrics.test_to_code_ratio - 0.5).abs() < 1e-9);
        assert!((metrics.test_file_ratio - 1.0).abs() < 1e-9);
        assert_eq!(metrics.test_function_count, 1);
    }

    #[tokio::test]
    async fn lcov_fallback_is_detected_and_tagged() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.py", "a = 1\n");
        write(dir.path(), "lcov.info", "DA:1,3\nDA:2,0\nDA:3,1\n");

        let metrics = run(&dir).await;
        let report = metrics.coverage.expect("coverage parsed");
        assert_eq!(report.source.tag(), "lcov");
        assert!((report.percent - 66.666).abs() < 0.01);
    }

    #[tokio::test]
    async fn missing_artifact_is_distinct_from_zero() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.py", "a = 1\n");

        let metrics = run(&dir).await;
        assert!(metrics.coverage.is_none());
    }

    #[tokio::test]
    async fn external_imports_break_isolation() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.py", "a = 1\n");
        write(
            dir.path(),
            "test_net.py",
            "import requests\n\ndef test_fetch():\n    assert requests.get\n",
        );
        write(
            dir.path(),
            "test_pure.py",
            "def test_math():\n    assert 1 + 1 == 2\n",
        );

        let metrics = run(&dir).await;
        assert_eq!(metrics.test_function_count, 2);
        assert!((metrics.test_isolation_pct - 50.0).abs() < 1e-9);
        assert_eq!(metrics.breaches.len(), 1);
        assert_eq!(metrics.breaches[0].import, "requests");
    }

    #[tokio::test]
    async fn zero_tests_is_vacuously_isolated() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.py", "a = 1\n");

        let metrics = run(&dir).await;
        assert_eq!(metrics.test_isolation_pct, 100.0);
    }

    #[tokio::test]
    async fn assertion_density_tracks_worst_and_mean() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.py", "a = 1\n");
        write(
            dir.path(),
            "test_app.py",
            "def test_rich():\n    assert 1\n    assert 2\n    assert 3\n\ndef test_bare():\n    pass\n",
        );

        let metrics = run(&dir).await;
        assert!((metrics.assertion_density.average - 1.5).abs() < 1e-9);
        assert_eq!(metrics.assertion_density.max, 3.0);
        assert!(metrics.assertion_density.max_bearer.ends_with("test_rich"));
    }

    #[tokio::test]
    async fn go_assertions_are_recognized() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "m.go", "package m\n\nfunc F() {}\n");
        write(
            dir.path(),
            "m_test.go",
            "package m\n\nimport \"testing\"\n\nfunc TestF(t *testing.T) {\n\tif F != nil {\n\t\tt.Error(\"nope\")\n\t}\n\tt.Fatalf(\"%v\", 1)\n}\n",
        );

        let metrics = run(&dir).await;
        assert_eq!(metrics.assertion_density.max, 2.0);
    }
}
