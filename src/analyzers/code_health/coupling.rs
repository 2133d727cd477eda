//! Intra-repository import graph and coupling counts.
//!
//! Modules are repository-relative file paths (directories for Go, where
//! the package is the unit). Import specifiers are resolved conservatively:
//! anything that does not match a repository module is treated as external
//! and excluded.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::core::classify::AnalysisTarget;
use crate::core::errors::Result;
use crate::lang::common::ParsedUnit;
use crate::lang::profile::LanguageProfile;

/// Directed intra-repo import graph keyed by module identifier.
#[derive(Debug, Clone, Default)]
pub struct ImportGraph {
    /// All module identifiers, sorted
    pub modules: BTreeSet<String>,
    /// Importer -> set of imported intra-repo modules
    pub edges: BTreeMap<String, BTreeSet<String>>,
}

impl ImportGraph {
    /// Efferent coupling: modules each module imports.
    pub fn efferent(&self) -> BTreeMap<String, usize> {
        self.modules
            .iter()
            .map(|module| {
                let count = self.edges.get(module).map_or(0, BTreeSet::len);
                (module.clone(), count)
            })
            .collect()
    }

    /// Afferent coupling: modules importing each module.
    pub fn afferent(&self) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> =
            self.modules.iter().map(|m| (m.clone(), 0)).collect();
        for targets in self.edges.values() {
            for target in targets {
                if let Some(count) = counts.get_mut(target) {
                    *count += 1;
                }
            }
        }
        counts
    }
}

/// The module identifier a file belongs to.
pub fn module_of(language: &str, rel_path: &str) -> String {
    if language == "go" {
        Path::new(rel_path)
            .parent()
            .map(|p| crate::core::classify::to_forward_slash(p))
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string())
    } else {
        rel_path.to_string()
    }
}

/// Build the intra-repo import graph over all targets.
///
/// Source and test files both contribute nodes; only resolvable intra-repo
/// specifiers contribute edges.
pub fn build_import_graph(targets: &[AnalysisTarget]) -> Result<ImportGraph> {
    let mut graph = ImportGraph::default();
    let mut file_index: BTreeSet<String> = BTreeSet::new();

    for target in targets {
        for file in target.source_files() {
            file_index.insert(file.rel_path.clone());
            graph
                .modules
                .insert(module_of(&target.language, &file.rel_path));
        }
    }

    for target in targets {
        let Some(profile) = LanguageProfile::for_key(&target.language) else {
            continue;
        };
        for file in target.source_files() {
            let unit = match ParsedUnit::parse_file(&target.language, &file.path, &file.rel_path) {
                Ok(unit) => unit,
                Err(err) => {
                    tracing::debug!(file = %file.rel_path, error = %err, "skipping unparseable file");
                    continue;
                }
            };

            let importer = module_of(&target.language, &file.rel_path);
            for import in profile.imports(&unit) {
                let Some(imported_file) =
                    resolve_import(&target.language, &file.rel_path, &import.specifier, &file_index)
                else {
                    continue;
                };
                let imported = module_of(&target.language, &imported_file);
                if imported != importer {
                    graph
                        .edges
                        .entry(importer.clone())
                        .or_default()
                        .insert(imported);
                }
            }
        }
    }

    Ok(graph)
}

/// Resolve one import specifier against the repository's file set.
pub fn resolve_import(
    language: &str,
    importer_rel_path: &str,
    specifier: &str,
    files: &BTreeSet<String>,
) -> Option<String> {
    match language {
        "py" => resolve_python(specifier, importer_rel_path, files),
        "go" => resolve_go(specifier, files),
        "js" | "ts" => resolve_ecma(specifier, importer_rel_path, files),
        "rs" => resolve_rust(specifier, files),
        _ => None,
    }
}

fn resolve_python(
    specifier: &str,
    importer_rel_path: &str,
    files: &BTreeSet<String>,
) -> Option<String> {
    let relative_depth = specifier.chars().take_while(|&c| c == '.').count();
    let stem = specifier.trim_start_matches('.').replace('.', "/");

    let mut prefixes: Vec<String> = Vec::new();
    if relative_depth > 0 {
        let mut dir = Path::new(importer_rel_path).parent()?.to_path_buf();
        for _ in 1..relative_depth {
            dir = dir.parent()?.to_path_buf();
        }
        prefixes.push(crate::core::classify::to_forward_slash(&dir));
    } else {
        prefixes.push(String::new());
        // Absolute imports may be rooted below a src/ layout directory.
        if let Some(first) = importer_rel_path.split('/').next() {
            prefixes.push(first.to_string());
        }
    }

    for prefix in prefixes {
        let base = if prefix.is_empty() {
            stem.clone()
        } else if stem.is_empty() {
            prefix.clone()
        } else {
            format!("{prefix}/{stem}")
        };
        for candidate in [format!("{base}.py"), format!("{base}/__init__.py")] {
            if files.contains(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

fn resolve_go(specifier: &str, files: &BTreeSet<String>) -> Option<String> {
    // Import paths end with the package directory path.
    let mut best: Option<&String> = None;
    for file in files {
        if !file.ends_with(".go") {
            continue;
        }
        let dir = Path::new(file).parent()?.to_string_lossy().replace('\\', "/");
        if dir.is_empty() {
            continue;
        }
        if specifier == dir || specifier.ends_with(&format!("/{dir}")) {
            best = Some(file);
            break;
        }
    }
    best.cloned()
}

fn resolve_ecma(
    specifier: &str,
    importer_rel_path: &str,
    files: &BTreeSet<String>,
) -> Option<String> {
    if !specifier.starts_with('.') {
        return None;
    }
    let dir = Path::new(importer_rel_path).parent()?;
    let joined = normalize_path(&dir.join(specifier));

    const SUFFIXES: &[&str] = &[
        "", ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", "/index.ts", "/index.js",
    ];
    for suffix in SUFFIXES {
        let candidate = format!("{joined}{suffix}");
        if files.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn resolve_rust(specifier: &str, files: &BTreeSet<String>) -> Option<String> {
    let path = specifier
        .strip_prefix("crate::")
        .or_else(|| specifier.strip_prefix("self::"))?;
    let first_segment = path.split("::").next()?.trim();
    if first_segment.is_empty() {
        return None;
    }

    for candidate in [
        format!("src/{first_segment}.rs"),
        format!("src/{first_segment}/mod.rs"),
    ] {
        if files.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Normalize `.` and `..` segments in a forward-slash path.
fn normalize_path(path: &Path) -> String {
    let mut segments: Vec<String> = Vec::new();
    for component in crate::core::classify::to_forward_slash(path).split('/') {
        match component {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other.to_string()),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::classify_repository;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn python_imports_resolve_to_repo_files() {
        let files: BTreeSet<String> = ["app/util.py", "app/__init__.py", "main.py"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(
            resolve_python("app.util", "main.py", &files),
            Some("app/util.py".to_string())
        );
        assert_eq!(
            resolve_python("app", "main.py", &files),
            Some("app/__init__.py".to_string())
        );
        assert_eq!(resolve_python("requests", "main.py", &files), None);
    }

    #[test]
    fn relative_python_imports_resolve_from_importer() {
        let files: BTreeSet<String> = ["pkg/a.py", "pkg/b.py"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            resolve_python(".b", "pkg/a.py", &files),
            Some("pkg/b.py".to_string())
        );
    }

    #[test]
    fn ecma_relative_imports_try_extensions() {
        let files: BTreeSet<String> = ["src/util/paths.ts", "src/app.ts", "src/lib/index.ts"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(
            resolve_ecma("./util/paths", "src/app.ts", &files),
            Some("src/util/paths.ts".to_string())
        );
        assert_eq!(
            resolve_ecma("./lib", "src/app.ts", &files),
            Some("src/lib/index.ts".to_string())
        );
        assert_eq!(resolve_ecma("axios", "src/app.ts", &files), None);
    }

    #[test]
    fn go_imports_match_directory_suffix() {
        let files: BTreeSet<String> = ["server/handler.go", "main.go"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert!(resolve_go("example.com/mod/server", &files).is_some());
        assert!(resolve_go("net/http", &files).is_none());
    }

    #[test]
    fn graph_counts_afferent_and_efferent() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.py", "import app.util\nimport app.model\n");
        write(dir.path(), "app/__init__.py", "");
        write(dir.path(), "app/util.py", "x = 1\n");
        write(dir.path(), "app/model.py", "from app import util\n");

        let targets = classify_repository(dir.path()).unwrap();
        let graph = build_import_graph(&targets).unwrap();

        let efferent = graph.efferent();
        let afferent = graph.afferent();
        assert_eq!(efferent["main.py"], 2);
        assert_eq!(afferent["app/util.py"], 2);
        assert_eq!(afferent["main.py"], 0);
    }

    #[test]
    fn self_imports_are_not_edges() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pkg/a.go", "package pkg\n\nimport \"example.com/m/pkg\"\n");
        write(dir.path(), "pkg/b.go", "package pkg\n");

        let targets = classify_repository(dir.path()).unwrap();
        let graph = build_import_graph(&targets).unwrap();
        assert!(graph.edges.get("pkg").map_or(true, |e| e.is_empty()));
    }
}
