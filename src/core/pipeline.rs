//! Analysis pipeline orchestration.
//!
//! Runs the seven analyzers sequentially over the shared target set, feeds
//! each result through its metric extractor, and reduces the bundles with
//! the scoring engine. Analyzers are fault boundaries: a failed analyzer
//! degrades its category to unavailable instead of failing the run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analyzers::agent_eval::AgentEvalMetrics;
use crate::analyzers::architecture::ArchitectureMetrics;
use crate::analyzers::code_health::CodeHealthMetrics;
use crate::analyzers::docs::DocumentationMetrics;
use crate::analyzers::semantics::SemanticsMetrics;
use crate::analyzers::temporal::TemporalMetrics;
use crate::analyzers::testing::TestingMetrics;
use crate::core::classify::AnalysisTarget;
use crate::core::config::CategoryId;
use crate::core::errors::Result;
use crate::core::scoring::{ScoredResult, ScoringEngine};
use crate::extract::extract_bundle;

/// Shared, read-only input handed to every analyzer.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    /// Repository root
    pub root: PathBuf,
    /// One target per detected language
    pub targets: Arc<Vec<AnalysisTarget>>,
}

impl AnalysisContext {
    /// Create a context over classified targets.
    pub fn new(root: impl Into<PathBuf>, targets: Vec<AnalysisTarget>) -> Self {
        Self {
            root: root.into(),
            targets: Arc::new(targets),
        }
    }
}

/// Tagged union of the seven analyzers' outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum AnalysisResult {
    /// C1 output
    CodeHealth(CodeHealthMetrics),
    /// C2 output
    SemanticExplicitness(SemanticsMetrics),
    /// C3 output
    Architecture(ArchitectureMetrics),
    /// C4 output
    Documentation(DocumentationMetrics),
    /// C5 output
    TemporalDynamics(TemporalMetrics),
    /// C6 output
    Testing(TestingMetrics),
    /// C7 output
    AgentEvaluation(AgentEvalMetrics),
}

impl AnalysisResult {
    /// The category this result belongs to.
    pub fn category(&self) -> CategoryId {
        match self {
            Self::CodeHealth(_) => CategoryId::CodeHealth,
            Self::SemanticExplicitness(_) => CategoryId::SemanticExplicitness,
            Self::Architecture(_) => CategoryId::Architecture,
            Self::Documentation(_) => CategoryId::Documentation,
            Self::TemporalDynamics(_) => CategoryId::TemporalDynamics,
            Self::Testing(_) => CategoryId::Testing,
            Self::AgentEvaluation(_) => CategoryId::AgentEvaluation,
        }
    }

    /// An unavailable placeholder for a category whose analyzer failed.
    pub fn unavailable(category: CategoryId) -> Self {
        match category {
            CategoryId::CodeHealth => Self::CodeHealth(CodeHealthMetrics::unavailable()),
            CategoryId::SemanticExplicitness => {
                Self::SemanticExplicitness(SemanticsMetrics::unavailable())
            }
            CategoryId::Architecture => Self::Architecture(ArchitectureMetrics::unavailable()),
            CategoryId::Documentation => Self::Documentation(DocumentationMetrics::unavailable()),
            CategoryId::TemporalDynamics => Self::TemporalDynamics(TemporalMetrics::unavailable()),
            CategoryId::Testing => Self::Testing(TestingMetrics::unavailable()),
            CategoryId::AgentEvaluation => Self::AgentEvaluation(AgentEvalMetrics::unavailable()),
        }
    }
}

/// Shared contract for all seven analyzers.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// The category this analyzer produces.
    fn category(&self) -> CategoryId;

    /// Extract raw measurements from the repository.
    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult>;
}

/// Orchestrates analyzers, extractors, and the scoring engine.
pub struct Pipeline {
    engine: ScoringEngine,
    analyzers: Vec<Box<dyn Analyzer>>,
}

/// Everything produced by one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Final scores and tier
    pub scored: ScoredResult,
    /// Raw analyzer outputs, keyed by category
    pub results: IndexMap<CategoryId, AnalysisResult>,
    /// Wall-clock duration of the run in seconds
    pub duration_secs: f64,
}

impl Pipeline {
    /// Create a pipeline over a scoring engine and an ordered analyzer list.
    pub fn new(engine: ScoringEngine, analyzers: Vec<Box<dyn Analyzer>>) -> Self {
        Self { engine, analyzers }
    }

    /// Run every analyzer, score the results, and compose the final result.
    ///
    /// Categories with no registered analyzer are reported unavailable, so
    /// the outcome always carries all seven categories.
    pub async fn run(&self, ctx: &AnalysisContext) -> Result<PipelineOutcome> {
        let started = Instant::now();
        let mut results: IndexMap<CategoryId, AnalysisResult> = IndexMap::new();

        for analyzer in &self.analyzers {
            let category = analyzer.category();
            info!(category = %category, "running analyzer");
            let result = match analyzer.analyze(ctx).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(category = %category, error = %err, "analyzer degraded to unavailable");
                    AnalysisResult::unavailable(category)
                }
            };
            results.insert(category, result);
        }

        for category in CategoryId::ALL {
            results
                .entry(category)
                .or_insert_with(|| AnalysisResult::unavailable(category));
        }
        results.sort_by(|a, _, b, _| {
            let pos = |id: &CategoryId| CategoryId::ALL.iter().position(|c| c == id).unwrap_or(7);
            pos(a).cmp(&pos(b))
        });

        let mut category_scores = Vec::with_capacity(results.len());
        for (&category, result) in &results {
            let bundle = extract_bundle(self.engine.config(), result);
            category_scores.push(self.engine.score_category(category, &bundle)?);
        }

        let scored = self.engine.compose(category_scores);
        info!(
            composite = scored.composite,
            tier = %scored.tier,
            "analysis complete"
        );

        Ok(PipelineOutcome {
            scored,
            results,
            duration_secs: started.elapsed().as_secs_f64(),
        })
    }
}
