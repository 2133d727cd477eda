//! Isolated workspaces for agent probes.
//!
//! The preferred strategy is one detached git worktree per probe, anchored
//! at HEAD, under a private temporary directory. Repositories without
//! version control fall back to a read-only view of the original tree
//! (probe tool sets are restricted to read-only operations either way).
//! Cleanup is guaranteed on every exit path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::core::errors::{ReadinessError, Result};

/// How the workspace was materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceKind {
    /// Detached worktrees anchored at HEAD
    Worktree,
    /// Read-only view of the original directory
    ReadOnlyView,
}

/// The isolated file-system view handed to probes.
#[derive(Debug)]
pub struct Workspace {
    kind: WorkspaceKind,
    repo_root: PathBuf,
    probe_dirs: BTreeMap<String, PathBuf>,
    // Held for its Drop; removing it deletes every worktree directory.
    _holder: Option<TempDir>,
}

impl Workspace {
    /// Create a workspace with one isolated directory per probe id.
    pub async fn create(repo_root: &Path, probe_ids: &[&str]) -> Result<Self> {
        if repo_root.join(".git").exists() {
            match Self::create_worktrees(repo_root, probe_ids).await {
                Ok(workspace) => return Ok(workspace),
                Err(err) => {
                    warn!(error = %err, "worktree creation failed, falling back to read-only view");
                }
            }
        }

        let probe_dirs = probe_ids
            .iter()
            .map(|id| ((*id).to_string(), repo_root.to_path_buf()))
            .collect();
        Ok(Self {
            kind: WorkspaceKind::ReadOnlyView,
            repo_root: repo_root.to_path_buf(),
            probe_dirs,
            _holder: None,
        })
    }

    async fn create_worktrees(repo_root: &Path, probe_ids: &[&str]) -> Result<Self> {
        let holder = TempDir::new()
            .map_err(|e| ReadinessError::io("failed to create workspace directory", e))?;

        let mut probe_dirs = BTreeMap::new();
        for id in probe_ids {
            let dir = holder.path().join(format!("probe-{id}"));
            let output = Command::new("git")
                .arg("-C")
                .arg(repo_root)
                .arg("worktree")
                .arg("add")
                .arg("--detach")
                .arg(&dir)
                .arg("HEAD")
                .output()
                .await
                .map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        ReadinessError::environment_missing("git", "binary not found on PATH")
                    } else {
                        ReadinessError::io("failed to spawn git worktree", e)
                    }
                })?;

            if !output.status.success() {
                // Remove whatever was created before bailing out.
                let partial = Self {
                    kind: WorkspaceKind::Worktree,
                    repo_root: repo_root.to_path_buf(),
                    probe_dirs,
                    _holder: Some(holder),
                };
                partial.cleanup().await;
                return Err(ReadinessError::subprocess_failure(
                    "git worktree add",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr),
                ));
            }
            probe_dirs.insert((*id).to_string(), dir);
        }

        Ok(Self {
            kind: WorkspaceKind::Worktree,
            repo_root: repo_root.to_path_buf(),
            probe_dirs,
            _holder: Some(holder),
        })
    }

    /// How this workspace was materialized.
    pub fn kind(&self) -> WorkspaceKind {
        self.kind
    }

    /// The directory a probe should run in.
    pub fn probe_dir(&self, probe_id: &str) -> Option<&Path> {
        self.probe_dirs.get(probe_id).map(PathBuf::as_path)
    }

    /// Tear the workspace down. Never fails; problems are logged.
    pub async fn cleanup(self) {
        if self.kind == WorkspaceKind::Worktree {
            for (id, dir) in &self.probe_dirs {
                let result = Command::new("git")
                    .arg("-C")
                    .arg(&self.repo_root)
                    .arg("worktree")
                    .arg("remove")
                    .arg("--force")
                    .arg(dir)
                    .output()
                    .await;
                match result {
                    Ok(output) if output.status.success() => {}
                    Ok(output) => debug!(
                        probe = %id,
                        stderr = %String::from_utf8_lossy(&output.stderr),
                        "git worktree remove failed"
                    ),
                    Err(err) => debug!(probe = %id, error = %err, "git worktree remove failed"),
                }
            }
            // Detached administrative entries, if any remove failed.
            let _ = Command::new("git")
                .arg("-C")
                .arg(&self.repo_root)
                .arg("worktree")
                .arg("prune")
                .output()
                .await;
        }
        // The TempDir holder drops here and deletes any leftover files.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;
    use tempfile::TempDir;

    fn git_available() -> bool {
        StdCommand::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn init_repo(dir: &Path) {
        for args in [
            vec!["init", "-q"],
            vec!["config", "user.email", "t@example.com"],
            vec!["config", "user.name", "t"],
        ] {
            assert!(StdCommand::new("git")
                .arg("-C")
                .arg(dir)
                .args(&args)
                .status()
                .unwrap()
                .success());
        }
        std::fs::write(dir.join("f.txt"), "x\n").unwrap();
        for args in [vec!["add", "."], vec!["commit", "-q", "-m", "init"]] {
            assert!(StdCommand::new("git")
                .arg("-C")
                .arg(dir)
                .args(&args)
                .status()
                .unwrap()
                .success());
        }
    }

    #[tokio::test]
    async fn non_repo_falls_back_to_read_only_view() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::create(dir.path(), &["a", "b"]).await.unwrap();
        assert_eq!(workspace.kind(), WorkspaceKind::ReadOnlyView);
        assert_eq!(workspace.probe_dir("a").unwrap(), dir.path());
        workspace.cleanup().await;
    }

    #[tokio::test]
    async fn worktrees_are_isolated_per_probe() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());

        let workspace = Workspace::create(dir.path(), &["x", "y"]).await.unwrap();
        assert_eq!(workspace.kind(), WorkspaceKind::Worktree);

        let x = workspace.probe_dir("x").unwrap().to_path_buf();
        let y = workspace.probe_dir("y").unwrap().to_path_buf();
        assert_ne!(x, y);
        assert!(x.join("f.txt").is_file());
        assert!(y.join("f.txt").is_file());

        workspace.cleanup().await;
        assert!(!x.exists());
        assert!(!y.exists());
    }

    #[tokio::test]
    async fn unknown_probe_has_no_dir() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::create(dir.path(), &["a"]).await.unwrap();
        assert!(workspace.probe_dir("zz").is_none());
        workspace.cleanup().await;
    }
}
