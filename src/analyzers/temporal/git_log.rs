//! Streaming git-log reader.
//!
//! Spawns `git log --pretty=format:%H|%ae|%at --numstat --no-merges
//! --since=<N> months ago` with the repository root as working directory and
//! parses stdout line by line. The subprocess runs under a hard deadline;
//! when it fires, the commits parsed so far are returned rather than
//! discarded.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::core::errors::{ReadinessError, Result};

/// Hard deadline for the git subprocess.
pub const GIT_LOG_DEADLINE: Duration = Duration::from_secs(25);

/// One changed file within a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Post-rename path
    pub path: String,
    /// Lines added
    pub added: u64,
    /// Lines deleted
    pub deleted: u64,
}

/// One parsed commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Full commit hash
    pub hash: String,
    /// Author identity (email)
    pub author: String,
    /// Unix timestamp
    pub timestamp: i64,
    /// Per-file numstat entries
    pub changes: Vec<FileChange>,
}

/// Incremental parser over git-log output lines.
#[derive(Debug, Default)]
pub struct LogParser {
    commits: Vec<Commit>,
    current: Option<Commit>,
}

impl LogParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line of subprocess output.
    pub fn push_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        if let Some(commit) = parse_header(line) {
            if let Some(done) = self.current.replace(commit) {
                self.commits.push(done);
            }
            return;
        }

        if let Some(change) = parse_numstat(line) {
            if let Some(current) = &mut self.current {
                current.changes.push(change);
            }
        }
    }

    /// Consume the parser, returning all parsed commits.
    pub fn finish(mut self) -> Vec<Commit> {
        if let Some(done) = self.current.take() {
            self.commits.push(done);
        }
        self.commits
    }
}

/// A header line carries `hash|email|timestamp` with a >= 40-hex-char hash.
fn parse_header(line: &str) -> Option<Commit> {
    let mut parts = line.splitn(3, '|');
    let hash = parts.next()?;
    if hash.len() < 40 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let author = parts.next()?.to_string();
    let timestamp: i64 = parts.next()?.trim().parse().ok()?;

    Some(Commit {
        hash: hash.to_string(),
        author,
        timestamp,
        changes: Vec::new(),
    })
}

/// A numstat line is `added\tdeleted\tpath`; binary entries use `-` and are
/// skipped.
fn parse_numstat(line: &str) -> Option<FileChange> {
    let mut parts = line.splitn(3, '\t');
    let added = parts.next()?.trim();
    let deleted = parts.next()?.trim();
    let path = parts.next()?.trim();

    if added == "-" || deleted == "-" || path.is_empty() {
        return None;
    }

    Some(FileChange {
        path: resolve_renamed_path(path),
        added: added.parse().ok()?,
        deleted: deleted.parse().ok()?,
    })
}

/// Resolve git rename notation to the post-rename path.
///
/// Handles both `dir/{old => new}/file.go` and bare `old.go => new.go`.
pub fn resolve_renamed_path(path: &str) -> String {
    if let (Some(open), Some(close)) = (path.find('{'), path.find('}')) {
        if open < close {
            let inside = &path[open + 1..close];
            if let Some((_, new)) = inside.split_once(" => ") {
                let mut resolved = String::new();
                resolved.push_str(&path[..open]);
                resolved.push_str(new);
                resolved.push_str(&path[close + 1..]);
                return resolved.replace("//", "/");
            }
        }
    }

    if let Some((_, new)) = path.split_once(" => ") {
        return new.to_string();
    }

    path.to_string()
}

/// Stream commit history for the lookback window.
///
/// Returns [`ReadinessError::EnvironmentMissing`] when git is not on the
/// host, and partial results when the deadline fires mid-stream.
pub async fn read_git_log(root: &Path, lookback_months: u32) -> Result<Vec<Commit>> {
    read_git_log_with_deadline(root, lookback_months, GIT_LOG_DEADLINE).await
}

/// As [`read_git_log`], with an explicit deadline.
pub async fn read_git_log_with_deadline(
    root: &Path,
    lookback_months: u32,
    deadline: Duration,
) -> Result<Vec<Commit>> {
    let mut command = Command::new("git");
    command
        .arg("log")
        .arg("--pretty=format:%H|%ae|%at")
        .arg("--numstat")
        .arg("--no-merges")
        .arg(format!("--since={lookback_months} months ago"))
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ReadinessError::environment_missing("git", "binary not found on PATH")
        } else {
            ReadinessError::io("failed to spawn git log", e)
        }
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ReadinessError::internal("git stdout pipe not available"))?;
    let mut lines = BufReader::new(stdout).lines();

    let started = Instant::now();
    let mut parser = LogParser::new();
    let timed_out = loop {
        let remaining = deadline.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            break true;
        }
        match tokio::time::timeout(remaining, lines.next_line()).await {
            Ok(Ok(Some(line))) => parser.push_line(&line),
            Ok(Ok(None)) => break false,
            Ok(Err(err)) => {
                warn!(error = %err, "git log stream error");
                break false;
            }
            Err(_) => break true,
        }
    };

    if timed_out {
        // Keep what we have; temporal metrics degrade gracefully.
        debug!(elapsed = ?started.elapsed(), "git log deadline fired, keeping partial commits");
        let _ = child.start_kill();
        let _ = child.wait().await;
        return Ok(parser.finish());
    }

    let status = child
        .wait()
        .await
        .map_err(|e| ReadinessError::io("failed to await git log", e))?;
    let commits = parser.finish();

    if !status.success() && commits.is_empty() {
        return Err(ReadinessError::subprocess_failure(
            "git log",
            status.code(),
            "no parsable output",
        ));
    }

    Ok(commits)
}
