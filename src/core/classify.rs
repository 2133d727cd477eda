//! Repository walking and file classification.
//!
//! Partitions a repository tree into per-language analysis targets,
//! classifying each file as source or test. The walk never follows the
//! version-control, dependency, or build-artifact directories.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::core::errors::{ReadinessError, Result};
use crate::lang::registry::{self, LanguageInfo};

/// Directory names never descended into.
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "vendor",
    "target",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
    ".idea",
    ".vscode",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
];

/// File glob patterns excluded from analysis.
static EXCLUDED_FILES: Lazy<GlobSet> = Lazy::new(|| {
    let mut builder = GlobSetBuilder::new();
    for pattern in ["**/*.min.js", "*.min.js", "**/*.min.css", "*.min.css"] {
        builder.add(Glob::new(pattern).expect("static glob pattern"));
    }
    builder.build().expect("static glob set")
});

/// Path fragments that mark machine-generated sources.
const GENERATED_MARKERS: &[&str] = &[".pb.", "_pb2.", ".generated.", "/generated/"];

/// Classification of a repository file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileClass {
    /// Production source code
    Source,
    /// Test code
    Test,
    /// Machine-generated code, excluded from source metrics
    Generated,
    /// Recognized but unanalyzed (docs, data, config)
    Other,
}

/// One classified repository file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path on the host
    pub path: PathBuf,
    /// Repository-relative path in forward-slash form
    pub rel_path: String,
    /// Language key (see [`crate::lang::registry`])
    pub language: String,
    /// Source/test classification
    pub class: FileClass,
}

/// All files of one language under one root. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTarget {
    /// Repository root
    pub root: PathBuf,
    /// Language key shared by every file in this target
    pub language: String,
    /// Classified files, sorted by relative path
    pub files: Vec<FileRecord>,
}

impl AnalysisTarget {
    /// Files classified as production source.
    pub fn source_files(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.iter().filter(|f| f.class == FileClass::Source)
    }

    /// Files classified as tests.
    pub fn test_files(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.iter().filter(|f| f.class == FileClass::Test)
    }
}

/// Convert a repository-relative path to forward-slash form.
pub fn to_forward_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Decide whether a file is test code from its name and ancestry.
pub fn is_test_path(rel_path: &str) -> bool {
    let base = rel_path.rsplit('/').next().unwrap_or(rel_path);

    if base == "conftest.py" || base.starts_with("test_") {
        return true;
    }
    if rel_path.split('/').any(|segment| segment == "__tests__") {
        return true;
    }

    if let Some((stem, _ext)) = base.rsplit_once('.') {
        if stem.ends_with("_test") || stem.ends_with(".test") || stem.ends_with(".spec") {
            return true;
        }
    }

    false
}

fn is_generated(rel_path: &str) -> bool {
    GENERATED_MARKERS
        .iter()
        .any(|marker| rel_path.contains(marker))
}

fn classify_file(rel_path: &str, info: &LanguageInfo) -> FileRecord {
    let class = if is_generated(rel_path) {
        FileClass::Generated
    } else if is_test_path(rel_path) {
        FileClass::Test
    } else {
        FileClass::Source
    };

    FileRecord {
        path: PathBuf::new(),
        rel_path: rel_path.to_string(),
        language: info.key.to_string(),
        class,
    }
}

/// Walk a repository root and produce one [`AnalysisTarget`] per detected
/// language. An empty tree yields zero targets; an unreadable root fails.
pub fn classify_repository(root: &Path) -> Result<Vec<AnalysisTarget>> {
    if !root.is_dir() {
        return Err(ReadinessError::io(
            format!("analysis root is not a readable directory: {}", root.display()),
            std::io::Error::new(std::io::ErrorKind::NotFound, "root not found"),
        ));
    }

    let mut by_language: std::collections::BTreeMap<String, Vec<FileRecord>> =
        std::collections::BTreeMap::new();

    let walker = WalkDir::new(root).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| {
        !(e.file_type().is_dir()
            && e.file_name()
                .to_str()
                .is_some_and(|name| EXCLUDED_DIRS.contains(&name)))
    }) {
        let entry = match entry {
            Ok(entry) => entry,
            // A single unreadable subtree does not abort the walk.
            Err(err) => {
                tracing::debug!("skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        if EXCLUDED_FILES.is_match(&rel) {
            continue;
        }

        let Some(info) = registry::language_for_path(entry.path()) else {
            continue;
        };

        let rel_path = to_forward_slash(&rel);
        let mut record = classify_file(&rel_path, info);
        record.path = entry.path().to_path_buf();
        by_language
            .entry(info.key.to_string())
            .or_default()
            .push(record);
    }

    let targets = by_language
        .into_iter()
        .map(|(language, mut files)| {
            files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
            AnalysisTarget {
                root: root.to_path_buf(),
                language,
                files,
            }
        })
        .collect();

    Ok(targets)
}
