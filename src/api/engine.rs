//! High-level engine facade: classify, analyze, score, report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analyzers::agent_eval::{AgentEvalAnalyzer, AgentEvalConfig};
use crate::analyzers::architecture::ArchitectureAnalyzer;
use crate::analyzers::code_health::CodeHealthAnalyzer;
use crate::analyzers::docs::DocumentationAnalyzer;
use crate::analyzers::semantics::SemanticsAnalyzer;
use crate::analyzers::temporal::{TemporalAnalyzer, DEFAULT_LOOKBACK_MONTHS};
use crate::analyzers::testing::TestingAnalyzer;
use crate::core::classify::classify_repository;
use crate::core::config::ScoringConfig;
use crate::core::errors::Result;
use crate::core::pipeline::{AnalysisContext, Analyzer, Pipeline};
use crate::core::scoring::{ScoredResult, ScoringEngine};
use crate::judge::Adjudicator;

/// The final report handed to rendering collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessReport {
    /// Analyzed repository root
    pub root: PathBuf,
    /// When the run finished
    pub generated_at: DateTime<Utc>,
    /// Wall-clock seconds for the whole run
    pub duration_secs: f64,
    /// Files per language, sorted by language key
    pub language_breakdown: Vec<(String, usize)>,
    /// Total files considered
    pub files_analyzed: usize,
    /// Scores, composite, and tier
    pub scored: ScoredResult,
}

impl ReadinessReport {
    /// Pretty-printed JSON for file output.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }
}

/// Orchestrates a full analysis run over one repository.
pub struct ReadinessEngine {
    config: ScoringConfig,
    lookback_months: u32,
    agent_eval: AgentEvalConfig,
    adjudicator: Option<Arc<dyn Adjudicator>>,
}

impl ReadinessEngine {
    /// Create an engine over a validated configuration.
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            lookback_months: DEFAULT_LOOKBACK_MONTHS,
            agent_eval: AgentEvalConfig::default(),
            adjudicator: None,
        })
    }

    /// Override the git history lookback window.
    pub fn with_lookback_months(mut self, months: u32) -> Self {
        self.lookback_months = months;
        self
    }

    /// Configure the C7 agent evaluation.
    pub fn with_agent_eval(mut self, config: AgentEvalConfig) -> Self {
        self.agent_eval = config;
        self
    }

    /// Attach an LLM adjudicator (enables C4 rubrics and C7 judging).
    pub fn with_adjudicator(mut self, adjudicator: Arc<dyn Adjudicator>) -> Self {
        self.adjudicator = Some(adjudicator);
        self
    }

    /// Run the full analysis-to-score pipeline.
    pub async fn assess(&self, root: impl AsRef<Path>) -> Result<ReadinessReport> {
        let root = root.as_ref();
        let started = std::time::Instant::now();

        let targets = classify_repository(root)?;
        let language_breakdown: Vec<(String, usize)> = targets
            .iter()
            .map(|t| (t.language.clone(), t.files.len()))
            .collect();
        let files_analyzed = targets.iter().map(|t| t.files.len()).sum();
        info!(
            root = %root.display(),
            files = files_analyzed,
            languages = language_breakdown.len(),
            "starting analysis"
        );

        let ctx = AnalysisContext::new(root, targets);
        let pipeline = Pipeline::new(
            ScoringEngine::new(self.config.clone())?,
            self.build_analyzers(),
        );
        let outcome = pipeline.run(&ctx).await?;

        Ok(ReadinessReport {
            root: root.to_path_buf(),
            generated_at: Utc::now(),
            duration_secs: started.elapsed().as_secs_f64(),
            language_breakdown,
            files_analyzed,
            scored: outcome.scored,
        })
    }

    /// The seven analyzers in C1..C7 order.
    fn build_analyzers(&self) -> Vec<Box<dyn Analyzer>> {
        let docs = match &self.adjudicator {
            Some(judge) => DocumentationAnalyzer::with_adjudicator(Arc::clone(judge)),
            None => DocumentationAnalyzer::new(),
        };

        vec![
            Box::new(CodeHealthAnalyzer::new()),
            Box::new(SemanticsAnalyzer::new()),
            Box::new(ArchitectureAnalyzer::new()),
            Box::new(docs),
            Box::new(TemporalAnalyzer::new(self.lookback_months)),
            Box::new(TestingAnalyzer::new()),
            Box::new(AgentEvalAnalyzer::new(
                self.agent_eval.clone(),
                self.adjudicator.clone(),
            )),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CategoryId;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn report_carries_all_seven_categories() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("app.py"),
            "def run(x):\n    if x:\n        return 1\n    return 0\n",
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "# App\n\nDoes things.\n").unwrap();

        let engine = ReadinessEngine::new(ScoringConfig::default()).unwrap();
        let report = engine.assess(dir.path()).await.unwrap();

        assert_eq!(report.scored.categories.len(), 7);
        assert!(report.scored.composite >= 0.0 && report.scored.composite <= 10.0);
        assert!(!report.scored.tier.is_empty());
        assert_eq!(report.files_analyzed, 1);

        // No git, agent eval disabled: those categories sit out.
        let temporal = report
            .scored
            .categories
            .iter()
            .find(|c| c.id == CategoryId::TemporalDynamics)
            .unwrap();
        assert!(!temporal.is_available());
        let agent = report
            .scored
            .categories
            .iter()
            .find(|c| c.id == CategoryId::AgentEvaluation)
            .unwrap();
        assert!(!agent.is_available());
    }

    #[tokio::test]
    async fn report_serializes_to_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("m.py"), "x = 1\n").unwrap();

        let engine = ReadinessEngine::new(ScoringConfig::default()).unwrap();
        let report = engine.assess(dir.path()).await.unwrap();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"composite\""));
        assert!(json.contains("\"tier\""));
    }
}
