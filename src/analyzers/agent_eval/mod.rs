//! C7: agent evaluation.
//!
//! Runs the probe set concurrently against an external agent CLI inside
//! isolated workspaces, judges each completed response with the LLM
//! adjudicator, and accounts for approximate token cost. Disabled by
//! default; every missing precondition degrades the category to
//! unavailable instead of failing the run.

pub mod executor;
pub mod probes;
pub mod workspace;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::config::CategoryId;
use crate::core::errors::Result;
use crate::core::pipeline::{AnalysisContext, AnalysisResult, Analyzer};
use crate::judge::Adjudicator;

pub use executor::{AgentCliConfig, AgentInvocation, InvocationStatus};
pub use probes::{probe_set, ProbeSpec};
pub use workspace::Workspace;

/// Default blended price per million tokens, used for advisory cost totals.
const DEFAULT_COST_PER_MILLION_TOKENS: f64 = 6.0;

/// Characters per token for the fallback estimate.
const CHARS_PER_TOKEN: usize = 4;

/// Response excerpt length kept in the result record.
const EXCERPT_LIMIT: usize = 400;

/// Configuration for the C7 analyzer.
#[derive(Debug, Clone)]
pub struct AgentEvalConfig {
    /// Master switch; the category is unavailable when false
    pub enabled: bool,
    /// Agent CLI invocation settings
    pub cli: AgentCliConfig,
    /// Per-probe deadline override
    pub probe_timeout: Option<Duration>,
    /// Blended price per million tokens
    pub cost_per_million_tokens: f64,
}

impl Default for AgentEvalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cli: AgentCliConfig::default(),
            probe_timeout: None,
            cost_per_million_tokens: DEFAULT_COST_PER_MILLION_TOKENS,
        }
    }
}

/// Terminal status of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// Probe ran and was judged
    Completed,
    /// Deadline fired
    Timeout,
    /// Subprocess or judge failure, or cancellation
    Error,
    /// Probe never ran
    Unavailable,
}

/// One probe's reported outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Probe identifier (doubles as the metric name)
    pub id: String,
    /// Display name
    pub display_name: String,
    /// Judge score in [1, 10]; 0 for failed probes
    pub score: f64,
    /// Terminal status
    pub status: ProbeStatus,
    /// Wall-clock seconds
    pub duration_secs: f64,
    /// Judge reasoning, or the failure reason
    pub reasoning: String,
    /// Excerpt of the agent's response
    pub response_excerpt: String,
}

/// C7 analyzer output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentEvalMetrics {
    /// Whether the probes ran at all
    pub available: bool,
    /// Probe results in configured order
    pub probes: Vec<ProbeResult>,
    /// Approximate tokens consumed (agent output plus judging)
    pub approx_tokens: u64,
    /// Advisory cost estimate in USD
    pub total_cost_usd: f64,
}

impl AgentEvalMetrics {
    /// Placeholder for a disabled or degraded run.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// Executes one probe against a workspace directory.
///
/// Abstracted so the scheduling, judging, and ordering logic is testable
/// without a live agent CLI.
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    /// Whether the runner's backing tool is present on the host.
    fn available(&self) -> bool;

    /// Run one probe to completion or failure.
    async fn run(
        &self,
        probe: &ProbeSpec,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<AgentInvocation>;
}

/// Probe runner backed by the external agent CLI.
pub struct CliProbeRunner {
    config: AgentCliConfig,
    timeout_override: Option<Duration>,
}

#[async_trait]
impl ProbeRunner for CliProbeRunner {
    fn available(&self) -> bool {
        executor::agent_cli_available(&self.config.binary)
    }

    async fn run(
        &self,
        probe: &ProbeSpec,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<AgentInvocation> {
        executor::run_agent(
            &self.config,
            dir,
            probe.task,
            probes::READ_ONLY_TOOLS,
            self.timeout_override.unwrap_or(probe.timeout),
            cancel,
        )
        .await
    }
}

/// C7: agent evaluation analyzer.
pub struct AgentEvalAnalyzer {
    config: AgentEvalConfig,
    adjudicator: Option<Arc<dyn Adjudicator>>,
    runner: Arc<dyn ProbeRunner>,
    cancel: CancellationToken,
}

impl AgentEvalAnalyzer {
    /// Create the analyzer with the CLI-backed runner.
    pub fn new(config: AgentEvalConfig, adjudicator: Option<Arc<dyn Adjudicator>>) -> Self {
        let runner = Arc::new(CliProbeRunner {
            config: config.cli.clone(),
            timeout_override: config.probe_timeout,
        });
        Self {
            config,
            adjudicator,
            runner,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the probe runner (tests, dry runs).
    pub fn with_runner(mut self, runner: Arc<dyn ProbeRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Token that propagates a root cancellation to in-flight probes.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[async_trait]
impl Analyzer for AgentEvalAnalyzer {
    fn category(&self) -> CategoryId {
        CategoryId::AgentEvaluation
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        if !self.config.enabled {
            debug!("agent evaluation disabled");
            return Ok(AnalysisResult::AgentEvaluation(
                AgentEvalMetrics::unavailable(),
            ));
        }
        let Some(adjudicator) = self.adjudicator.clone() else {
            info!("no adjudicator configured, agent evaluation unavailable");
            return Ok(AnalysisResult::AgentEvaluation(
                AgentEvalMetrics::unavailable(),
            ));
        };
        if !self.runner.available() {
            info!("agent CLI not found, agent evaluation unavailable");
            return Ok(AnalysisResult::AgentEvaluation(
                AgentEvalMetrics::unavailable(),
            ));
        }

        let probes = probes::probe_set();
        let probe_ids: Vec<&str> = probes.iter().map(|p| p.id).collect();
        let workspace = Workspace::create(&ctx.root, &probe_ids).await?;

        // One task per probe; results rejoin in configured order.
        let mut handles = Vec::with_capacity(probes.len());
        for probe in &probes {
            let dir: PathBuf = workspace
                .probe_dir(probe.id)
                .unwrap_or(&ctx.root)
                .to_path_buf();
            let runner = Arc::clone(&self.runner);
            let judge = Arc::clone(&adjudicator);
            let cancel = self.cancel.clone();
            let probe = probe.clone();

            handles.push(tokio::spawn(async move {
                run_one_probe(&probe, &dir, runner.as_ref(), judge.as_ref(), &cancel).await
            }));
        }

        let mut results: Vec<ProbeResult> = Vec::with_capacity(handles.len());
        let mut approx_tokens = 0u64;
        let joined = futures::future::join_all(handles).await;
        for (outcome, probe) in joined.into_iter().zip(&probes) {
            match outcome {
                Ok((result, tokens)) => {
                    approx_tokens += tokens;
                    results.push(result);
                }
                Err(join_err) => results.push(ProbeResult {
                    id: probe.id.to_string(),
                    display_name: probe.display_name.to_string(),
                    score: 0.0,
                    status: ProbeStatus::Error,
                    duration_secs: 0.0,
                    reasoning: format!("probe task aborted: {join_err}"),
                    response_excerpt: String::new(),
                }),
            }
        }

        // Cleanup runs on every path that reaches the join above.
        workspace.cleanup().await;

        let total_cost_usd =
            approx_tokens as f64 / 1_000_000.0 * self.config.cost_per_million_tokens;

        info!(
            completed = results
                .iter()
                .filter(|r| r.status == ProbeStatus::Completed)
                .count(),
            total = results.len(),
            cost_usd = total_cost_usd,
            "agent evaluation finished"
        );

        Ok(AnalysisResult::AgentEvaluation(AgentEvalMetrics {
            available: true,
            probes: results,
            approx_tokens,
            total_cost_usd,
        }))
    }
}

/// Run, judge, and account for a single probe.
async fn run_one_probe(
    probe: &ProbeSpec,
    dir: &Path,
    runner: &dyn ProbeRunner,
    judge: &dyn Adjudicator,
    cancel: &CancellationToken,
) -> (ProbeResult, u64) {
    let mut tokens = (probe.task.len() / CHARS_PER_TOKEN) as u64;

    let invocation = match runner.run(probe, dir, cancel).await {
        Ok(invocation) => invocation,
        Err(err) => {
            return (
                ProbeResult {
                    id: probe.id.to_string(),
                    display_name: probe.display_name.to_string(),
                    score: 0.0,
                    status: ProbeStatus::Unavailable,
                    duration_secs: 0.0,
                    reasoning: err.to_string(),
                    response_excerpt: String::new(),
                },
                tokens,
            )
        }
    };

    tokens += (invocation.raw_output.len() / CHARS_PER_TOKEN) as u64;
    let duration_secs = invocation.duration.as_secs_f64();
    let excerpt: String = invocation.response.chars().take(EXCERPT_LIMIT).collect();

    let (score, status, reasoning) = match invocation.status {
        InvocationStatus::Completed => match judge.judge(probe.rubric, &invocation.response).await
        {
            Ok(verdict) => {
                tokens += verdict.tokens_used.unwrap_or_else(|| {
                    ((probe.rubric.len() + invocation.response.len()) / CHARS_PER_TOKEN) as u64
                });
                (
                    f64::from(verdict.score),
                    ProbeStatus::Completed,
                    verdict.reasoning,
                )
            }
            Err(err) => (0.0, ProbeStatus::Error, format!("judging failed: {err}")),
        },
        InvocationStatus::Timeout if cancel.is_cancelled() => (
            0.0,
            ProbeStatus::Error,
            "cancelled before completion".to_string(),
        ),
        InvocationStatus::Timeout => (
            0.0,
            ProbeStatus::Timeout,
            "probe deadline elapsed".to_string(),
        ),
        InvocationStatus::Error => (
            0.0,
            ProbeStatus::Error,
            format!(
                "agent exited with status {:?} and no usable envelope",
                invocation.exit_code
            ),
        ),
    };

    (
        ProbeResult {
            id: probe.id.to_string(),
            display_name: probe.display_name.to_string(),
            score,
            status,
            duration_secs,
            reasoning,
            response_excerpt: excerpt,
        },
        tokens,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ReadinessError;
    use crate::judge::ScriptedAdjudicator;
    use std::collections::BTreeMap;
    use std::time::Duration;

    /// Scripted runner keyed by probe id.
    struct ScriptedRunner {
        outcomes: BTreeMap<&'static str, InvocationStatus>,
    }

    #[async_trait]
    impl ProbeRunner for ScriptedRunner {
        fn available(&self) -> bool {
            true
        }

        async fn run(
            &self,
            probe: &ProbeSpec,
            _dir: &Path,
            _cancel: &CancellationToken,
        ) -> Result<AgentInvocation> {
            let status = self
                .outcomes
                .get(probe.id)
                .copied()
                .unwrap_or(InvocationStatus::Completed);
            Ok(AgentInvocation {
                status,
                response: if status == InvocationStatus::Completed {
                    format!("response for {}", probe.id)
                } else {
                    String::new()
                },
                session_id: None,
                duration: Duration::from_millis(5),
                exit_code: Some(if status == InvocationStatus::Error { 2 } else { 0 }),
                raw_output: "{}".to_string(),
            })
        }
    }

    fn enabled_config() -> AgentEvalConfig {
        AgentEvalConfig {
            enabled: true,
            ..AgentEvalConfig::default()
        }
    }

    async fn run_with(
        runner: ScriptedRunner,
        judge: ScriptedAdjudicator,
    ) -> AgentEvalMetrics {
        let analyzer = AgentEvalAnalyzer::new(enabled_config(), Some(Arc::new(judge)))
            .with_runner(Arc::new(runner));
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = AnalysisContext::new(dir.path(), Vec::new());

        match analyzer.analyze(&ctx).await.unwrap() {
            AnalysisResult::AgentEvaluation(metrics) => metrics,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn disabled_analyzer_is_unavailable() {
        let analyzer = AgentEvalAnalyzer::new(
            AgentEvalConfig::default(),
            Some(Arc::new(ScriptedAdjudicator::constant(5))),
        );
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = AnalysisContext::new(dir.path(), Vec::new());

        match analyzer.analyze(&ctx).await.unwrap() {
            AnalysisResult::AgentEvaluation(metrics) => assert!(!metrics.available),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_adjudicator_is_unavailable() {
        let analyzer = AgentEvalAnalyzer::new(enabled_config(), None);
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = AnalysisContext::new(dir.path(), Vec::new());

        match analyzer.analyze(&ctx).await.unwrap() {
            AnalysisResult::AgentEvaluation(metrics) => assert!(!metrics.available),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn partial_failures_keep_configured_order() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert("task_consistency", InvocationStatus::Completed);
        outcomes.insert("code_comprehension", InvocationStatus::Completed);
        outcomes.insert("cross_file_navigation", InvocationStatus::Completed);
        outcomes.insert("identifier_interpretability", InvocationStatus::Timeout);
        outcomes.insert("doc_accuracy", InvocationStatus::Error);

        let judge = ScriptedAdjudicator {
            rules: vec![
                ("consistently".to_string(), 7),
                ("comprehension of code".to_string(), 8),
                ("cross-file navigation".to_string(), 9),
            ],
            default_score: 5,
        };

        let metrics = run_with(ScriptedRunner { outcomes }, judge).await;
        assert!(metrics.available);
        assert_eq!(metrics.probes.len(), 5);

        let ids: Vec<&str> = metrics.probes.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "task_consistency",
                "code_comprehension",
                "cross_file_navigation",
                "identifier_interpretability",
                "doc_accuracy"
            ]
        );

        let statuses: Vec<ProbeStatus> = metrics.probes.iter().map(|p| p.status).collect();
        assert_eq!(
            statuses,
            vec![
                ProbeStatus::Completed,
                ProbeStatus::Completed,
                ProbeStatus::Completed,
                ProbeStatus::Timeout,
                ProbeStatus::Error
            ]
        );

        assert_eq!(metrics.probes[0].score, 7.0);
        assert_eq!(metrics.probes[1].score, 8.0);
        assert_eq!(metrics.probes[2].score, 9.0);
        assert_eq!(metrics.probes[3].score, 0.0);
        assert_eq!(metrics.probes[4].score, 0.0);
    }

    #[tokio::test]
    async fn completed_scores_stay_in_range() {
        let metrics = run_with(
            ScriptedRunner {
                outcomes: BTreeMap::new(),
            },
            ScriptedAdjudicator::constant(10),
        )
        .await;

        for probe in &metrics.probes {
            assert!(probe.score >= 1.0 && probe.score <= 10.0);
            assert_eq!(probe.status, ProbeStatus::Completed);
        }
        assert!(metrics.approx_tokens > 0);
        assert!(metrics.total_cost_usd > 0.0);
    }

    struct FailingRunner;

    #[async_trait]
    impl ProbeRunner for FailingRunner {
        fn available(&self) -> bool {
            true
        }

        async fn run(
            &self,
            _probe: &ProbeSpec,
            _dir: &Path,
            _cancel: &CancellationToken,
        ) -> Result<AgentInvocation> {
            Err(ReadinessError::environment_missing("agent", "vanished mid-run"))
        }
    }

    #[tokio::test]
    async fn runner_errors_mark_probes_unavailable_without_failing() {
        let analyzer = AgentEvalAnalyzer::new(
            enabled_config(),
            Some(Arc::new(ScriptedAdjudicator::constant(5))),
        )
        .with_runner(Arc::new(FailingRunner));
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = AnalysisContext::new(dir.path(), Vec::new());

        match analyzer.analyze(&ctx).await.unwrap() {
            AnalysisResult::AgentEvaluation(metrics) => {
                assert_eq!(metrics.probes.len(), 5);
                assert!(metrics
                    .probes
                    .iter()
                    .all(|p| p.status == ProbeStatus::Unavailable));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
