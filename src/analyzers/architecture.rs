//! C3: architecture analysis.
//!
//! Treats the repository as an import graph over modules: directory depth,
//! module fan-out, strongly-connected-component cycles, import-path
//! complexity, and dead exports.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzers::code_health::coupling::{build_import_graph, module_of};
use crate::core::bundle::MetricSummary;
use crate::core::config::CategoryId;
use crate::core::errors::{ReadinessError, Result};
use crate::core::pipeline::{AnalysisContext, AnalysisResult, Analyzer};
use crate::lang::common::{walk, ParsedUnit};

/// Entry-point symbols never reported as dead exports.
const ENTRY_POINT_NAMES: &[&str] = &["main", "Main", "run", "app"];

/// An exported symbol no other intra-repo module references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadExport {
    /// Module (file) declaring the symbol
    pub module: String,
    /// Symbol name
    pub symbol: String,
    /// 1-based declaration line
    pub line: usize,
}

/// C3 analyzer output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchitectureMetrics {
    /// Whether any source file was seen
    pub available: bool,
    /// Deepest directory nesting of a source file
    pub max_directory_depth: usize,
    /// Mean directory nesting over source files
    pub mean_directory_depth: f64,
    /// Distinct intra-repo imports per module (bearer: module)
    pub fan_out: MetricSummary,
    /// Import cycles: each SCC of size >= 2, members sorted
    pub cycles: Vec<Vec<String>>,
    /// Path segments per import specifier (bearer: specifier)
    pub import_complexity: MetricSummary,
    /// Conservatively determined dead exports
    pub dead_exports: Vec<DeadExport>,
}

impl ArchitectureMetrics {
    /// Placeholder for a failed or skipped run.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default)]
struct FileScan {
    rel_path: String,
    language: String,
    import_segments: Vec<(usize, String)>,
    exports: Vec<(String, usize)>,
    identifiers: BTreeSet<String>,
}

/// C3: architecture analyzer.
#[derive(Debug, Default)]
pub struct ArchitectureAnalyzer;

impl ArchitectureAnalyzer {
    /// Create the analyzer.
    pub fn new() -> Self {
        Self
    }

    fn scan_unit(unit: &ParsedUnit, language: &str) -> FileScan {
        let profile = unit.profile();

        let import_segments = profile
            .imports(unit)
            .into_iter()
            .map(|import| {
                (
                    specifier_segments(language, &import.specifier),
                    import.specifier,
                )
            })
            .collect();

        let exports = profile
            .exports(unit)
            .into_iter()
            .map(|symbol| (symbol.name, symbol.line))
            .collect();

        let mut identifiers = BTreeSet::new();
        let mut visit = |node: tree_sitter::Node<'_>| {
            if node.kind().ends_with("identifier") {
                identifiers.insert(unit.text_of(&node).to_string());
            }
        };
        walk(unit.root(), &mut visit);

        FileScan {
            rel_path: unit.rel_path().to_string(),
            language: language.to_string(),
            import_segments,
            exports,
            identifiers,
        }
    }
}

#[async_trait]
impl Analyzer for ArchitectureAnalyzer {
    fn category(&self) -> CategoryId {
        CategoryId::Architecture
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        if ctx.targets.is_empty() {
            return Err(ReadinessError::input("no analysis targets"));
        }

        let mut scans: Vec<FileScan> = Vec::new();
        for target in ctx.targets.iter() {
            let per_file: Vec<FileScan> = target
                .source_files()
                .collect::<Vec<_>>()
                .par_iter()
                .filter_map(|file| {
                    match ParsedUnit::parse_file(&target.language, &file.path, &file.rel_path) {
                        Ok(unit) => Some(Self::scan_unit(&unit, &target.language)),
                        Err(err) => {
                            debug!(file = %file.rel_path, error = %err, "skipping file");
                            None
                        }
                    }
                })
                .collect();
            scans.extend(per_file);
        }

        if scans.is_empty() {
            return Ok(AnalysisResult::Architecture(
                ArchitectureMetrics::unavailable(),
            ));
        }
        scans.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

        // Directory depth relative to the root.
        let depths: Vec<usize> = scans
            .iter()
            .map(|s| s.rel_path.matches('/').count())
            .collect();
        let max_depth = depths.iter().copied().max().unwrap_or(0);
        let mean_depth = depths.iter().sum::<usize>() as f64 / depths.len() as f64;

        // Fan-out and cycles come from the intra-repo import graph.
        let graph = build_import_graph(&ctx.targets)?;
        let fan_out = MetricSummary::from_pairs(
            graph
                .efferent()
                .iter()
                .map(|(module, &count)| (count as f64, module.as_str())),
        );
        let cycles = find_cycles(&graph.modules, &graph.edges);

        let import_complexity = MetricSummary::from_pairs(
            scans
                .iter()
                .flat_map(|s| s.import_segments.iter())
                .map(|(segments, specifier)| (*segments as f64, specifier.as_str())),
        );

        let dead_exports = find_dead_exports(&scans);

        Ok(AnalysisResult::Architecture(ArchitectureMetrics {
            available: true,
            max_directory_depth: max_depth,
            mean_directory_depth: mean_depth,
            fan_out,
            cycles,
            import_complexity,
            dead_exports,
        }))
    }
}

/// Number of path segments in an import specifier.
fn specifier_segments(language: &str, specifier: &str) -> usize {
    let cleaned = specifier.trim_start_matches("./").trim_start_matches('.');
    let separator = match language {
        "py" => '.',
        "rs" => ':',
        _ => '/',
    };
    if language == "rs" {
        return cleaned.split("::").filter(|s| !s.is_empty()).count().max(1);
    }
    cleaned
        .split(separator)
        .filter(|s| !s.is_empty())
        .count()
        .max(1)
}

/// Strongly connected components of size >= 2, members sorted, components
/// ordered by their smallest member.
fn find_cycles(
    modules: &BTreeSet<String>,
    edges: &BTreeMap<String, BTreeSet<String>>,
) -> Vec<Vec<String>> {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut indices: BTreeMap<&str, NodeIndex> = BTreeMap::new();
    for module in modules {
        indices.insert(module, graph.add_node(module.clone()));
    }
    for (from, targets) in edges {
        let Some(&from_idx) = indices.get(from.as_str()) else {
            continue;
        };
        for to in targets {
            if let Some(&to_idx) = indices.get(to.as_str()) {
                graph.add_edge(from_idx, to_idx, ());
            }
        }
    }

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| component.len() >= 2)
        .map(|component| {
            let mut members: Vec<String> =
                component.iter().map(|&idx| graph[idx].clone()).collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort();
    cycles
}

/// Exports whose names appear in no other module's identifier set.
fn find_dead_exports(scans: &[FileScan]) -> Vec<DeadExport> {
    let mut dead = Vec::new();
    for scan in scans {
        let module = module_of(&scan.language, &scan.rel_path);
        for (symbol, line) in &scan.exports {
            if ENTRY_POINT_NAMES.contains(&symbol.as_str()) {
                continue;
            }
            let referenced = scans.iter().any(|other| {
                module_of(&other.language, &other.rel_path) != module
                    && other.identifiers.contains(symbol)
            });
            if !referenced {
                dead.push(DeadExport {
                    module: module.clone(),
                    symbol: symbol.clone(),
                    line: *line,
                });
            }
        }
    }
    dead.sort_by(|a, b| a.module.cmp(&b.module).then_with(|| a.line.cmp(&b.line)));
    dead
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

    async fn run(dir: &TempDir) -> ArchitectureMetrics {
        let targets = classify_repository(dir.path()).unwrap();
        let ctx = AnalysisContext::new(dir.path(), targets);
        match ArchitectureAnalyzer::new().analyze(&ctx).await.unwrap() {
            AnalysisResult::Architecture(metrics) => metrics,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn two_module_cycle_is_reported() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.py", "import b\n");
        write(dir.path(), "b.py", "import a\n");

        let metrics = run(&dir).await;
        assert_eq!(metrics.cycles.len(), 1);
        assert_eq!(metrics.cycles[0], vec!["a.py".to_string(), "b.py".to_string()]);
    }

    #[tokio::test]
    async fn acyclic_graph_has_no_cycles() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.py", "import b\n");
        write(dir.path(), "b.py", "import c\n");
        write(dir.path(), "c.py", "x = 1\n");

        let metrics = run(&dir).await;
        assert!(metrics.cycles.is_empty());
        assert_eq!(metrics.fan_out.max, 1.0);
    }

    #[tokio::test]
    async fn directory_depth_is_measured() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "top.py", "x = 1\n");
        write(dir.path(), "a/b/c/deep.py", "y = 2\n");

        let metrics = run(&dir).await;
        assert_eq!(metrics.max_directory_depth, 3);
        assert!((metrics.mean_directory_depth - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn import_complexity_counts_segments() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "m.py", "import os\nimport pkg.sub.mod\n");

        let metrics = run(&dir).await;
        assert_eq!(metrics.import_complexity.max, 3.0);
        assert_eq!(metrics.import_complexity.max_bearer, "pkg.sub.mod");
        assert!((metrics.import_complexity.average - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unreferenced_exports_are_dead() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "lib.py",
            "def used():\n    pass\n\ndef orphan():\n    pass\n",
        );
        write(dir.path(), "app.py", "from lib import used\n\nused()\n");

        let metrics = run(&dir).await;
        let symbols: Vec<&str> = metrics.dead_exports.iter().map(|d| d.symbol.as_str()).collect();
        assert!(symbols.contains(&"orphan"));
        assert!(!symbols.contains(&"used"));
    }

    #[tokio::test]
    async fn entry_points_are_not_dead() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "cli.py", "def main():\n    pass\n");

        let metrics = run(&dir).await;
        assert!(metrics.dead_exports.is_empty());
    }
}
