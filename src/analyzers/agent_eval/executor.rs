//! Agent CLI subprocess lifecycle.
//!
//! Launches the external agent with a probe task, collects its structured
//! output, and terminates it gracefully on deadline or cancellation: a soft
//! interrupt to the child's process group first, then a hard kill after a
//! grace window. The child runs in its own process group so shell wrappers
//! die with it.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::errors::{ReadinessError, Result};

/// Grace period between the soft interrupt and the hard kill.
pub const KILL_GRACE: Duration = Duration::from_secs(10);

/// Exit code shells use for a missing binary.
const EXIT_MISSING_BINARY: i32 = 127;

/// Configuration for invoking the external agent CLI.
#[derive(Debug, Clone)]
pub struct AgentCliConfig {
    /// Binary name or path
    pub binary: String,
    /// Additional arguments appended to every invocation
    pub extra_args: Vec<String>,
}

impl Default for AgentCliConfig {
    fn default() -> Self {
        Self {
            binary: "claude".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Terminal status of one agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    /// Envelope parsed, response text available
    Completed,
    /// Deadline or cancellation fired
    Timeout,
    /// Nonzero exit with no usable envelope
    Error,
}

/// Outcome of one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentInvocation {
    /// Terminal status
    pub status: InvocationStatus,
    /// The agent's response text (empty unless completed)
    pub response: String,
    /// Session identifier, when the envelope carried one
    pub session_id: Option<String>,
    /// Wall-clock duration
    pub duration: Duration,
    /// Exit code, when the process exited on its own
    pub exit_code: Option<i32>,
    /// Combined raw output, for diagnostics and token accounting
    pub raw_output: String,
}

/// The structured-output envelope the agent CLI emits.
///
/// The publisher only partly specifies this schema; unknown fields are
/// tolerated and ignored.
#[derive(Debug, Deserialize)]
struct AgentEnvelope {
    result: Option<String>,
    session_id: Option<String>,
}

/// Check whether the agent binary is reachable on PATH.
pub fn agent_cli_available(binary: &str) -> bool {
    let candidate = Path::new(binary);
    if candidate.components().count() > 1 {
        return candidate.is_file();
    }

    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let full = dir.join(binary);
        is_executable(&full)
    })
}

#[cfg(unix)]
fn is_executable(path: &PathBuf) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &PathBuf) -> bool {
    path.is_file()
}

/// Run the agent once against a workspace directory.
///
/// `deadline` bounds the invocation; `cancel` propagates a root
/// cancellation. Both trigger the soft-then-hard termination sequence and
/// report [`InvocationStatus::Timeout`].
pub async fn run_agent(
    config: &AgentCliConfig,
    workspace_dir: &Path,
    task: &str,
    allowed_tools: &[&str],
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<AgentInvocation> {
    let started = Instant::now();

    let mut command = Command::new(&config.binary);
    command
        .args(&config.extra_args)
        .arg("-p")
        .arg(task)
        .arg("--output-format")
        .arg("json")
        .arg("--allowedTools")
        .arg(allowed_tools.join(","))
        .current_dir(workspace_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so the soft/hard signals reach wrapper children.
    #[cfg(unix)]
    unsafe {
        command.pre_exec(|| {
            if libc::setpgid(0, 0) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ReadinessError::environment_missing(&config.binary, "agent CLI not found on PATH")
        } else {
            ReadinessError::io("failed to spawn agent CLI", e)
        }
    })?;

    // Drain both pipes concurrently so a chatty child cannot deadlock.
    let stdout_handle = drain_pipe(child.stdout.take());
    let stderr_handle = drain_pipe(child.stderr.take());

    let exit = tokio::select! {
        status = child.wait() => Some(status.map_err(|e| ReadinessError::io("failed to await agent CLI", e))?),
        () = tokio::time::sleep(deadline) => None,
        () = cancel.cancelled() => None,
    };

    let timed_out = exit.is_none();
    if timed_out {
        terminate_gracefully(&mut child).await;
    }

    let stdout = stdout_handle.await.unwrap_or_default();
    let stderr = stderr_handle.await.unwrap_or_default();
    let duration = started.elapsed();
    let raw_output = format!("{stdout}{stderr}");

    if timed_out {
        debug!(elapsed = ?duration, "agent invocation hit its deadline");
        return Ok(AgentInvocation {
            status: InvocationStatus::Timeout,
            response: String::new(),
            session_id: None,
            duration,
            exit_code: None,
            raw_output,
        });
    }

    let exit = exit.expect("checked above");
    let exit_code = exit.code();

    if exit_code == Some(EXIT_MISSING_BINARY) {
        return Err(ReadinessError::environment_missing(
            &config.binary,
            "agent CLI exited 127 (missing binary)",
        ));
    }

    // stderr may carry non-JSON noise; the envelope lives on stdout.
    match parse_envelope(&stdout) {
        Some(envelope) if envelope.result.is_some() => Ok(AgentInvocation {
            status: InvocationStatus::Completed,
            response: envelope.result.unwrap_or_default(),
            session_id: envelope.session_id,
            duration,
            exit_code,
            raw_output,
        }),
        _ => {
            warn!(exit_code = ?exit_code, "agent produced no usable envelope");
            Ok(AgentInvocation {
                status: InvocationStatus::Error,
                response: String::new(),
                session_id: None,
                duration,
                exit_code,
                raw_output,
            })
        }
    }
}

/// Parse the JSON envelope, tolerating surrounding noise on stdout.
fn parse_envelope(stdout: &str) -> Option<AgentEnvelope> {
    let trimmed = stdout.trim();
    if let Ok(envelope) = serde_json::from_str::<AgentEnvelope>(trimmed) {
        return Some(envelope);
    }

    // Fall back to the outermost object boundaries.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if start >= end {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

fn drain_pipe<R>(pipe: Option<R>) -> tokio::task::JoinHandle<String>
where
    R: AsyncReadExt + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut pipe) = pipe else {
            return String::new();
        };
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer).await;
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

/// Soft interrupt, grace wait, then hard kill of the whole process group.
async fn terminate_gracefully(child: &mut Child) {
    #[cfg(unix)]
    let pgid = child.id().map(|pid| unsafe { libc::getpgid(pid as libc::pid_t) });

    #[cfg(unix)]
    if let Some(pgid) = pgid.filter(|&p| p > 0) {
        unsafe { libc::killpg(pgid, libc::SIGINT) };
        if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_ok() {
            return;
        }
        unsafe { libc::killpg(pgid, libc::SIGKILL) };
    }

    let _ = child.start_kill();
    let _ = child.wait().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run_script(script: &str, deadline: Duration) -> AgentInvocation {
        // Wrap through sh -c by prepending the probe interface args.
        let config = AgentCliConfig {
            binary: "/bin/sh".to_string(),
            extra_args: vec!["-c".to_string(), script.to_string()],
        };
        let dir = tempfile::TempDir::new().unwrap();
        run_agent(
            &config,
            dir.path(),
            "task",
            READ_ONLY_TOOLS_FOR_TEST,
            deadline,
            &CancellationToken::new(),
        )
        .await
        .unwrap()
    }

    const READ_ONLY_TOOLS_FOR_TEST: &[&str] = &["Read", "Grep"];

    #[tokio::test]
    async fn envelope_on_stdout_completes() {
        let invocation = run_script(
            r#"echo '{"result": "the answer", "session_id": "s1", "unknown_field": 3}'"#,
            Duration::from_secs(10),
        )
        .await;

        assert_eq!(invocation.status, InvocationStatus::Completed);
        assert_eq!(invocation.response, "the answer");
        assert_eq!(invocation.session_id.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn stderr_noise_does_not_break_parsing() {
        let invocation = run_script(
            r#"echo 'warning: something' >&2; echo '{"result": "ok"}'"#,
            Duration::from_secs(10),
        )
        .await;
        assert_eq!(invocation.status, InvocationStatus::Completed);
        assert_eq!(invocation.response, "ok");
    }

    #[tokio::test]
    async fn nonzero_exit_without_envelope_is_error() {
        let invocation = run_script("echo nope; exit 3", Duration::from_secs(10)).await;
        assert_eq!(invocation.status, InvocationStatus::Error);
        assert_eq!(invocation.exit_code, Some(3));
        assert!(invocation.raw_output.contains("nope"));
    }

    #[tokio::test]
    async fn deadline_reports_timeout() {
        let started = Instant::now();
        let invocation = run_script("sleep 30", Duration::from_millis(200)).await;
        assert_eq!(invocation.status, InvocationStatus::Timeout);
        // The sh child handles SIGINT, so the grace window is not consumed.
        assert!(started.elapsed() < Duration::from_secs(15));
    }

    #[tokio::test]
    async fn cancellation_reports_timeout() {
        let config = AgentCliConfig {
            binary: "/bin/sh".to_string(),
            extra_args: vec!["-c".to_string(), "sleep 30".to_string()],
        };
        let dir = tempfile::TempDir::new().unwrap();
        let cancel = CancellationToken::new();

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel_clone.cancel();
        });

        let invocation = run_agent(
            &config,
            dir.path(),
            "task",
            READ_ONLY_TOOLS_FOR_TEST,
            Duration::from_secs(60),
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(invocation.status, InvocationStatus::Timeout);
    }

    #[tokio::test]
    async fn missing_binary_is_environment_missing() {
        let config = AgentCliConfig {
            binary: "/definitely/not/an/agent".to_string(),
            extra_args: Vec::new(),
        };
        let dir = tempfile::TempDir::new().unwrap();
        let err = run_agent(
            &config,
            dir.path(),
            "task",
            READ_ONLY_TOOLS_FOR_TEST,
            Duration::from_secs(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReadinessError::EnvironmentMissing { .. }));
    }

    #[test]
    fn envelope_parsing_tolerates_noise_and_unknowns() {
        let envelope = parse_envelope("log line\n{\"result\": \"r\", \"extra\": [1,2]}\n").unwrap();
        assert_eq!(envelope.result.as_deref(), Some("r"));
        assert!(parse_envelope("no json here").is_none());
    }

    #[test]
    fn path_lookup_finds_sh() {
        assert!(agent_cli_available("sh") || agent_cli_available("/bin/sh"));
        assert!(!agent_cli_available("definitely-not-a-real-binary-xyz"));
    }
}
