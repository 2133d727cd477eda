//! C5: temporal dynamics analysis.
//!
//! Reads git history within a lookback window and derives churn, temporal
//! coupling, author fragmentation, commit stability, and hotspot
//! concentration. The whole category is unavailable when there is no git
//! repository or no commits in the window.

pub mod git_log;

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::config::CategoryId;
use crate::core::errors::Result;
use crate::core::pipeline::{AnalysisContext, AnalysisResult, Analyzer};

pub use git_log::{Commit, FileChange};

/// Default history lookback in months.
pub const DEFAULT_LOOKBACK_MONTHS: u32 = 6;

/// Sub-window for churn and author metrics, in days.
const SUB_WINDOW_DAYS: i64 = 90;

/// Commits touching more than this many files are mass refactors and are
/// ignored for coupling.
const MASS_CHANGE_FILE_LIMIT: usize = 50;

/// Minimum per-file commit count for a coupling pair to qualify.
const COUPLING_MIN_COMMITS: usize = 5;

/// Coupling strength above which a pair counts toward the headline metric.
const COUPLING_STRONG_PCT: f64 = 70.0;

/// Stability assigned to files with a single commit in the window, in days.
const SINGLE_COMMIT_STABILITY_DAYS: f64 = 30.0;

/// Files kept in the hotspot evidence list.
const HOTSPOT_LIMIT: usize = 10;

/// Two files that tend to change in the same commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoupledPair {
    /// First file (lexicographically smaller)
    pub file_a: String,
    /// Second file
    pub file_b: String,
    /// Coupling strength in [0, 100]
    pub strength_pct: f64,
    /// Commits touching both files
    pub shared_commits: usize,
}

/// Per-file churn aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChurn {
    /// Repository-relative path
    pub path: String,
    /// Total lines added plus deleted
    pub lines_changed: u64,
    /// Commits touching the file
    pub commit_count: usize,
    /// Distinct author identities
    pub author_count: usize,
}

/// C5 analyzer output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemporalMetrics {
    /// Whether git history was readable and non-empty
    pub available: bool,
    /// Mean lines changed per commit over the 90-day sub-window
    pub churn_rate: f64,
    /// Share of qualifying pairs with strength above 70%, in [0, 100]
    pub temporal_coupling_pct: f64,
    /// Strongest coupled pairs, for evidence
    pub coupled_pairs: Vec<CoupledPair>,
    /// Mean distinct authors per file over the 90-day sub-window
    pub author_fragmentation: f64,
    /// Mean of per-file median days between consecutive changes
    pub commit_stability_days: f64,
    /// Changes concentrated in the top decile of files, in [0, 100]
    pub hotspot_concentration_pct: f64,
    /// Highest-churn files
    pub hotspots: Vec<FileChurn>,
    /// Commits parsed in the window
    pub commit_count: usize,
}

impl TemporalMetrics {
    /// Placeholder for a failed or skipped run.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// C5: temporal dynamics analyzer.
#[derive(Debug)]
pub struct TemporalAnalyzer {
    lookback_months: u32,
}

impl Default for TemporalAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKBACK_MONTHS)
    }
}

impl TemporalAnalyzer {
    /// Create the analyzer with a lookback window in months.
    pub fn new(lookback_months: u32) -> Self {
        Self { lookback_months }
    }
}

#[async_trait]
impl Analyzer for TemporalAnalyzer {
    fn category(&self) -> CategoryId {
        CategoryId::TemporalDynamics
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        if !ctx.root.join(".git").exists() {
            info!("no .git directory, temporal metrics unavailable");
            return Ok(AnalysisResult::TemporalDynamics(
                TemporalMetrics::unavailable(),
            ));
        }

        let commits = match git_log::read_git_log(&ctx.root, self.lookback_months).await {
            Ok(commits) => commits,
            Err(err) if err.is_degradable() => {
                info!(error = %err, "git history unreadable, temporal metrics unavailable");
                return Ok(AnalysisResult::TemporalDynamics(
                    TemporalMetrics::unavailable(),
                ));
            }
            Err(err) => return Err(err),
        };

        if commits.is_empty() {
            return Ok(AnalysisResult::TemporalDynamics(
                TemporalMetrics::unavailable(),
            ));
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Ok(AnalysisResult::TemporalDynamics(compute_metrics(
            &commits, now,
        )))
    }
}

/// Derive all temporal metrics from a commit stream.
///
/// `now` anchors the 90-day sub-window; passing it explicitly keeps the
/// computation deterministic under test.
pub fn compute_metrics(commits: &[Commit], now: i64) -> TemporalMetrics {
    let sub_window_start = now - SUB_WINDOW_DAYS * 86_400;

    // Churn rate: mean lines changed per commit in the sub-window.
    let recent: Vec<&Commit> = commits
        .iter()
        .filter(|c| c.timestamp >= sub_window_start)
        .collect();
    let churn_rate = if recent.is_empty() {
        0.0
    } else {
        recent
            .iter()
            .map(|c| {
                c.changes
                    .iter()
                    .map(|f| f.added + f.deleted)
                    .sum::<u64>() as f64
            })
            .sum::<f64>()
            / recent.len() as f64
    };

    // Per-file aggregates over the full window.
    let mut per_file: BTreeMap<&str, FileStats> = BTreeMap::new();
    for commit in commits {
        for change in &commit.changes {
            let stats = per_file.entry(change.path.as_str()).or_default();
            stats.commit_count += 1;
            stats.lines_changed += change.added + change.deleted;
            stats.timestamps.push(commit.timestamp);
        }
    }

    // Distinct authors per file, restricted to the sub-window.
    let mut recent_authors: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for commit in &recent {
        for change in &commit.changes {
            recent_authors
                .entry(change.path.as_str())
                .or_default()
                .insert(commit.author.as_str());
        }
    }
    let author_fragmentation = if recent_authors.is_empty() {
        0.0
    } else {
        recent_authors.values().map(|a| a.len() as f64).sum::<f64>()
            / recent_authors.len() as f64
    };

    // Full-window author counts feed the hotspot list.
    let mut all_authors: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for commit in commits {
        for change in &commit.changes {
            all_authors
                .entry(change.path.as_str())
                .or_default()
                .insert(commit.author.as_str());
        }
    }

    let (temporal_coupling_pct, coupled_pairs) = coupling_metrics(commits);

    // Stability: per-file median gap between consecutive changes.
    let stabilities: Vec<f64> = per_file
        .values()
        .map(|stats| {
            if stats.timestamps.len() < 2 {
                return SINGLE_COMMIT_STABILITY_DAYS;
            }
            let mut sorted = stats.timestamps.clone();
            sorted.sort_unstable();
            let mut gaps: Vec<f64> = sorted
                .windows(2)
                .map(|w| (w[1] - w[0]) as f64 / 86_400.0)
                .collect();
            gaps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            gaps[gaps.len() / 2]
        })
        .collect();
    let commit_stability_days = if stabilities.is_empty() {
        0.0
    } else {
        stabilities.iter().sum::<f64>() / stabilities.len() as f64
    };

    // Hotspots: changes concentrated in the top decile of files.
    let mut by_churn: Vec<(&str, &FileStats)> =
        per_file.iter().map(|(path, stats)| (*path, stats)).collect();
    by_churn.sort_by(|a, b| {
        b.1.lines_changed
            .cmp(&a.1.lines_changed)
            .then_with(|| a.0.cmp(b.0))
    });
    let total_changes: u64 = by_churn.iter().map(|(_, s)| s.lines_changed).sum();
    let decile = (by_churn.len() as f64 * 0.10).ceil() as usize;
    let top_changes: u64 = by_churn
        .iter()
        .take(decile.max(1))
        .map(|(_, s)| s.lines_changed)
        .sum();
    let hotspot_concentration_pct = if total_changes == 0 {
        0.0
    } else {
        top_changes as f64 * 100.0 / total_changes as f64
    };

    let hotspots: Vec<FileChurn> = by_churn
        .iter()
        .take(HOTSPOT_LIMIT)
        .map(|(path, stats)| FileChurn {
            path: (*path).to_string(),
            lines_changed: stats.lines_changed,
            commit_count: stats.commit_count,
            author_count: all_authors.get(path).map_or(0, BTreeSet::len),
        })
        .collect();

    TemporalMetrics {
        available: true,
        churn_rate,
        temporal_coupling_pct,
        coupled_pairs,
        author_fragmentation,
        commit_stability_days,
        hotspot_concentration_pct,
        hotspots,
        commit_count: commits.len(),
    }
}

#[derive(Debug, Default, Clone)]
struct FileStats {
    commit_count: usize,
    lines_changed: u64,
    timestamps: Vec<i64>,
}

/// Temporal coupling over qualifying file pairs.
fn coupling_metrics(commits: &[Commit]) -> (f64, Vec<CoupledPair>) {
    let mut file_commits: BTreeMap<&str, usize> = BTreeMap::new();
    let mut pair_commits: BTreeMap<(&str, &str), usize> = BTreeMap::new();

    for commit in commits {
        if commit.changes.len() > MASS_CHANGE_FILE_LIMIT {
            continue;
        }
        let mut paths: Vec<&str> = commit.changes.iter().map(|c| c.path.as_str()).collect();
        paths.sort_unstable();
        paths.dedup();

        for path in &paths {
            *file_commits.entry(path).or_default() += 1;
        }
        for i in 0..paths.len() {
            for j in (i + 1)..paths.len() {
                *pair_commits.entry((paths[i], paths[j])).or_default() += 1;
            }
        }
    }

    let mut qualifying = 0usize;
    let mut strong = 0usize;
    let mut pairs: Vec<CoupledPair> = Vec::new();

    for (&(a, b), &shared) in &pair_commits {
        let (count_a, count_b) = (file_commits[a], file_commits[b]);
        if count_a < COUPLING_MIN_COMMITS || count_b < COUPLING_MIN_COMMITS {
            continue;
        }
        qualifying += 1;
        let strength = shared as f64 / count_a.min(count_b) as f64 * 100.0;
        if strength > COUPLING_STRONG_PCT {
            strong += 1;
        }
        pairs.push(CoupledPair {
            file_a: a.to_string(),
            file_b: b.to_string(),
            strength_pct: strength,
            shared_commits: shared,
        });
    }

    pairs.sort_by(|a, b| {
        b.strength_pct
            .partial_cmp(&a.strength_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.file_a.cmp(&b.file_a))
            .then_with(|| a.file_b.cmp(&b.file_b))
    });
    pairs.truncate(HOTSPOT_LIMIT);

    let pct = if qualifying == 0 {
        0.0
    } else {
        strong as f64 * 100.0 / qualifying as f64
    };
    (pct, pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(hash_seed: u8, author: &str, timestamp: i64, paths: &[&str]) -> Commit {
        Commit {
            hash: format!("{:040x}", hash_seed as u128),
            author: author.to_string(),
            timestamp,
            changes: paths
                .iter()
                .map(|p| FileChange {
                    path: (*p).to_string(),
                    added: 5,
                    deleted: 5,
                })
                .collect(),
        }
    }

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn coupling_strength_follows_co_commit_ratio() {
        let mut commits = Vec::new();
        // a.go and b.go co-change in 8 commits, separately in 2 each.
        for i in 0..8u8 {
            commits.push(commit(i, "ann", NOW - i as i64 * 86_400, &["a.go", "b.go"]));
        }
        for i in 8..10u8 {
            commits.push(commit(i, "ann", NOW - i as i64 * 86_400, &["a.go"]));
            commits.push(commit(i + 10, "ann", NOW - i as i64 * 86_400, &["b.go"]));
        }
        // c.go shows up only twice with a.go: below the qualifying floor.
        for i in 20..22u8 {
            commits.push(commit(i, "bob", NOW - i as i64 * 86_400, &["c.go", "a.go"]));
        }

        let metrics = compute_metrics(&commits, NOW);
        let pair = metrics
            .coupled_pairs
            .iter()
            .find(|p| p.file_a == "a.go" && p.file_b == "b.go")
            .expect("a.go/b.go pair");
        assert_eq!(pair.shared_commits, 8);
        assert!((pair.strength_pct - 80.0).abs() < 1.0);
        assert!(!metrics
            .coupled_pairs
            .iter()
            .any(|p| p.file_a == "a.go" && p.file_b == "c.go"));
    }

    #[test]
    fn churn_rate_is_mean_lines_per_recent_commit() {
        let commits = vec![
            commit(1, "ann", NOW - 86_400, &["a.go"]),
            commit(2, "ann", NOW - 2 * 86_400, &["a.go", "b.go"]),
            // Outside the 90-day sub-window.
            commit(3, "ann", NOW - 200 * 86_400, &["a.go"]),
        ];

        let metrics = compute_metrics(&commits, NOW);
        // (10 + 20) / 2 commits in window.
        assert!((metrics.churn_rate - 15.0).abs() < 1e-9);
    }

    #[test]
    fn mass_refactor_commits_are_ignored_for_coupling() {
        let many: Vec<String> = (0..60).map(|i| format!("f{i}.go")).collect();
        let many_refs: Vec<&str> = many.iter().map(String::as_str).collect();

        let mut commits = vec![commit(0, "ann", NOW, &many_refs)];
        for i in 1..=6u8 {
            commits.push(commit(i, "ann", NOW - i as i64 * 86_400, &["x.go", "y.go"]));
        }

        let metrics = compute_metrics(&commits, NOW);
        // Only x/y qualify; every pair from the mass commit is ignored.
        assert_eq!(metrics.coupled_pairs.len(), 1);
        assert_eq!(metrics.temporal_coupling_pct, 100.0);
    }

    #[test]
    fn single_commit_files_default_stability() {
        let commits = vec![commit(1, "ann", NOW, &["solo.go"])];
        let metrics = compute_metrics(&commits, NOW);
        assert!((metrics.commit_stability_days - 30.0).abs() < 1e-9);
    }

    #[test]
    fn author_fragmentation_counts_distinct_identities() {
        let commits = vec![
            commit(1, "ann", NOW - 86_400, &["a.go"]),
            commit(2, "bob", NOW - 2 * 86_400, &["a.go"]),
            commit(3, "ann", NOW - 3 * 86_400, &["b.go"]),
        ];

        let metrics = compute_metrics(&commits, NOW);
        // a.go: 2 authors, b.go: 1 author.
        assert!((metrics.author_fragmentation - 1.5).abs() < 1e-9);
    }

    #[test]
    fn hotspot_concentration_bounds() {
        let mut commits = Vec::new();
        for i in 0..10u8 {
            commits.push(commit(i, "ann", NOW - i as i64 * 86_400, &["hot.go"]));
        }
        commits.push(commit(50, "ann", NOW, &["cold.go"]));

        let metrics = compute_metrics(&commits, NOW);
        assert!(metrics.hotspot_concentration_pct > 50.0);
        assert!(metrics.hotspot_concentration_pct <= 100.0);
        assert_eq!(metrics.hotspots[0].path, "hot.go");
        assert_eq!(metrics.hotspots[0].commit_count, 10);
    }

    #[test]
    fn empty_history_is_unavailable_shape() {
        let metrics = TemporalMetrics::unavailable();
        assert!(!metrics.available);
        assert_eq!(metrics.commit_count, 0);
    }
}
