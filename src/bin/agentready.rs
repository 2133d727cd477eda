//! Thin CLI for the agent-readiness engine.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use agentready_rs::analyzers::agent_eval::{AgentCliConfig, AgentEvalConfig};
use agentready_rs::judge::{GeminiAdjudicator, JudgeConfig};
use agentready_rs::{ReadinessEngine, ScoringConfig};

/// Compute an agent-readiness score for a repository.
#[derive(Debug, Parser)]
#[command(name = "agentready", version, about)]
struct Args {
    /// Repository root to analyze
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Scoring configuration override (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Git history lookback window in months
    #[arg(long, default_value_t = 6)]
    lookback_months: u32,

    /// Run the live agent probes (requires the agent CLI and GEMINI_API_KEY)
    #[arg(long)]
    enable_agent_eval: bool,

    /// Agent CLI binary used for probes
    #[arg(long, default_value = "claude")]
    agent_binary: String,

    /// Write the full JSON report to this path
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = match &args.config {
        Some(path) => ScoringConfig::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ScoringConfig::default(),
    };

    let mut engine =
        ReadinessEngine::new(config)?.with_lookback_months(args.lookback_months);

    // The adjudicator powers both the C4 rubrics and C7 judging; it is
    // optional and only required when agent evaluation is requested.
    match JudgeConfig::from_env() {
        Ok(judge_config) => {
            engine = engine.with_adjudicator(Arc::new(GeminiAdjudicator::new(judge_config)));
        }
        Err(err) if args.enable_agent_eval => {
            anyhow::bail!("agent evaluation requires an adjudicator: {err}");
        }
        Err(_) => {}
    }

    if args.enable_agent_eval {
        engine = engine.with_agent_eval(AgentEvalConfig {
            enabled: true,
            cli: AgentCliConfig {
                binary: args.agent_binary.clone(),
                extra_args: Vec::new(),
            },
            ..AgentEvalConfig::default()
        });
    }

    let report = engine.assess(&args.path).await?;

    println!(
        "{}  —  {:.1}/10  ({})",
        report.root.display(),
        report.scored.composite,
        report.scored.tier
    );
    for category in &report.scored.categories {
        if category.is_available() {
            println!("  {:<24} {:>5.1}", category.name, category.score);
        } else {
            println!("  {:<24}   n/a", category.name);
        }
    }

    if let Some(path) = &args.output {
        std::fs::write(path, report.to_json()?)
            .with_context(|| format!("writing report to {}", path.display()))?;
        println!("report written to {}", path.display());
    }

    Ok(())
}
