//! Scoring configuration: categories, metric thresholds, and tiers.
//!
//! The configuration is validated once at load time; the rest of the core
//! assumes a valid config and reads it concurrently without synchronization.

use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::errors::{ReadinessError, Result};

/// Tolerance for per-category and cross-category weight sums.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// The seven analysis categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryId {
    /// C1: complexity, size, coupling, duplication
    CodeHealth,
    /// C2: explicit semantic cues in the code
    SemanticExplicitness,
    /// C3: import-graph shape
    Architecture,
    /// C4: documentation artifacts and coverage
    Documentation,
    /// C5: git history dynamics
    TemporalDynamics,
    /// C6: test suite shape and coverage
    Testing,
    /// C7: live agent probes
    AgentEvaluation,
}

impl CategoryId {
    /// All categories in canonical C1..C7 order.
    pub const ALL: [CategoryId; 7] = [
        CategoryId::CodeHealth,
        CategoryId::SemanticExplicitness,
        CategoryId::Architecture,
        CategoryId::Documentation,
        CategoryId::TemporalDynamics,
        CategoryId::Testing,
        CategoryId::AgentEvaluation,
    ];

    /// Stable configuration key for this category.
    pub fn key(self) -> &'static str {
        match self {
            CategoryId::CodeHealth => "code_health",
            CategoryId::SemanticExplicitness => "semantic_explicitness",
            CategoryId::Architecture => "architecture",
            CategoryId::Documentation => "documentation",
            CategoryId::TemporalDynamics => "temporal_dynamics",
            CategoryId::Testing => "testing",
            CategoryId::AgentEvaluation => "agent_evaluation",
        }
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A (raw value, score) waypoint for piecewise-linear normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Raw metric value at this waypoint
    pub value: f64,
    /// Score in [0, 10] assigned at this waypoint
    pub score: f64,
}

impl Breakpoint {
    /// Shorthand constructor used by the default tables.
    pub const fn new(value: f64, score: f64) -> Self {
        Self { value, score }
    }
}

/// Thresholds and weight for a single metric within a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricThresholds {
    /// Metric name (the scoring vocabulary key)
    pub name: String,
    /// Weight within the category, in [0, 1]
    pub weight: f64,
    /// Breakpoints, strictly ascending by raw value
    pub breakpoints: Vec<Breakpoint>,
}

impl MetricThresholds {
    fn new(name: &str, weight: f64, breakpoints: &[(f64, f64)]) -> Self {
        Self {
            name: name.to_string(),
            weight,
            breakpoints: breakpoints
                .iter()
                .map(|&(value, score)| Breakpoint::new(value, score))
                .collect(),
        }
    }
}

/// Configuration for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Human-readable display name
    pub display_name: String,
    /// Category weight within the composite, in [0, 1]
    pub weight: f64,
    /// Ordered metric list
    pub metrics: Vec<MetricThresholds>,
}

/// A named band over composite scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// Tier label, e.g. "Agent-Ready"
    pub name: String,
    /// Inclusive lower bound on the composite
    pub min_score: f64,
}

/// Top-level scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Per-category configuration, keyed by category
    pub categories: IndexMap<CategoryId, CategoryConfig>,
    /// Tier list, sorted descending by `min_score`
    pub tiers: Vec<TierConfig>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let mut categories = IndexMap::new();

        categories.insert(
            CategoryId::CodeHealth,
            CategoryConfig {
                display_name: "Code Health".to_string(),
                weight: 0.25,
                metrics: vec![
                    MetricThresholds::new(
                        "avg_complexity",
                        0.30,
                        &[(1.0, 10.0), (5.0, 8.0), (10.0, 6.0), (20.0, 3.0), (40.0, 1.0)],
                    ),
                    MetricThresholds::new(
                        "max_function_length",
                        0.20,
                        &[(10.0, 10.0), (50.0, 8.0), (100.0, 5.0), (200.0, 2.0), (400.0, 1.0)],
                    ),
                    MetricThresholds::new(
                        "avg_file_size",
                        0.15,
                        &[(50.0, 10.0), (200.0, 8.0), (400.0, 5.0), (800.0, 2.0), (1500.0, 1.0)],
                    ),
                    MetricThresholds::new(
                        "duplication_pct",
                        0.20,
                        &[(0.0, 10.0), (3.0, 8.0), (10.0, 5.0), (20.0, 2.0), (40.0, 1.0)],
                    ),
                    MetricThresholds::new(
                        "max_coupling",
                        0.15,
                        &[(2.0, 10.0), (5.0, 8.0), (10.0, 6.0), (20.0, 3.0), (40.0, 1.0)],
                    ),
                ],
            },
        );

        categories.insert(
            CategoryId::SemanticExplicitness,
            CategoryConfig {
                display_name: "Semantic Explicitness".to_string(),
                weight: 0.10,
                metrics: vec![
                    MetricThresholds::new(
                        "type_annotation_pct",
                        0.35,
                        &[(0.0, 1.0), (30.0, 3.0), (60.0, 6.0), (80.0, 8.0), (95.0, 10.0)],
                    ),
                    MetricThresholds::new(
                        "naming_consistency_pct",
                        0.25,
                        &[(50.0, 2.0), (70.0, 5.0), (85.0, 8.0), (95.0, 10.0)],
                    ),
                    MetricThresholds::new(
                        "magic_numbers_per_kloc",
                        0.20,
                        &[(0.0, 10.0), (5.0, 8.0), (15.0, 5.0), (30.0, 2.0), (60.0, 1.0)],
                    ),
                    MetricThresholds::new("type_strictness", 0.10, &[(0.0, 2.0), (1.0, 10.0)]),
                    MetricThresholds::new(
                        "null_safety_pct",
                        0.10,
                        &[(0.0, 2.0), (50.0, 5.0), (80.0, 8.0), (95.0, 10.0)],
                    ),
                ],
            },
        );

        categories.insert(
            CategoryId::Architecture,
            CategoryConfig {
                display_name: "Architecture".to_string(),
                weight: 0.20,
                metrics: vec![
                    MetricThresholds::new(
                        "max_directory_depth",
                        0.15,
                        &[(2.0, 10.0), (4.0, 8.0), (6.0, 6.0), (8.0, 4.0), (12.0, 1.0)],
                    ),
                    MetricThresholds::new(
                        "avg_fan_out",
                        0.25,
                        &[(2.0, 10.0), (5.0, 8.0), (10.0, 5.0), (20.0, 2.0)],
                    ),
                    MetricThresholds::new(
                        "circular_dependencies",
                        0.30,
                        &[(0.0, 10.0), (1.0, 7.0), (3.0, 4.0), (8.0, 1.0)],
                    ),
                    MetricThresholds::new(
                        "import_complexity",
                        0.15,
                        &[(1.0, 10.0), (2.0, 8.0), (3.0, 6.0), (5.0, 3.0), (8.0, 1.0)],
                    ),
                    MetricThresholds::new(
                        "dead_exports",
                        0.15,
                        &[(0.0, 10.0), (5.0, 7.0), (15.0, 4.0), (40.0, 1.0)],
                    ),
                ],
            },
        );

        categories.insert(
            CategoryId::Documentation,
            CategoryConfig {
                display_name: "Documentation".to_string(),
                weight: 0.10,
                metrics: vec![
                    MetricThresholds::new(
                        "readme_word_count",
                        0.15,
                        &[(0.0, 0.0), (100.0, 3.0), (300.0, 6.0), (800.0, 9.0), (1500.0, 10.0)],
                    ),
                    MetricThresholds::new(
                        "artifact_presence_pct",
                        0.20,
                        &[(0.0, 1.0), (40.0, 4.0), (60.0, 6.0), (80.0, 8.0), (100.0, 10.0)],
                    ),
                    MetricThresholds::new(
                        "comment_density_pct",
                        0.15,
                        &[(0.0, 2.0), (5.0, 6.0), (15.0, 9.0), (25.0, 10.0)],
                    ),
                    MetricThresholds::new(
                        "api_doc_coverage_pct",
                        0.25,
                        &[(0.0, 1.0), (25.0, 4.0), (50.0, 6.0), (75.0, 8.0), (95.0, 10.0)],
                    ),
                    MetricThresholds::new(
                        "llm_doc_quality",
                        0.25,
                        &[(0.0, 0.0), (50.0, 5.0), (100.0, 10.0)],
                    ),
                ],
            },
        );

        categories.insert(
            CategoryId::TemporalDynamics,
            CategoryConfig {
                display_name: "Temporal Dynamics".to_string(),
                weight: 0.10,
                metrics: vec![
                    MetricThresholds::new(
                        "churn_rate",
                        0.25,
                        &[(10.0, 10.0), (50.0, 8.0), (150.0, 5.0), (400.0, 2.0), (800.0, 1.0)],
                    ),
                    MetricThresholds::new(
                        "temporal_coupling_pct",
                        0.25,
                        &[(0.0, 10.0), (10.0, 7.0), (25.0, 4.0), (50.0, 1.0)],
                    ),
                    MetricThresholds::new(
                        "author_fragmentation",
                        0.15,
                        &[(1.0, 10.0), (2.0, 7.0), (3.0, 5.0), (5.0, 2.0)],
                    ),
                    MetricThresholds::new(
                        "commit_stability_days",
                        0.15,
                        &[(1.0, 3.0), (7.0, 6.0), (14.0, 8.0), (30.0, 10.0)],
                    ),
                    MetricThresholds::new(
                        "hotspot_concentration_pct",
                        0.20,
                        &[(20.0, 10.0), (40.0, 8.0), (60.0, 5.0), (80.0, 2.0), (95.0, 1.0)],
                    ),
                ],
            },
        );

        categories.insert(
            CategoryId::Testing,
            CategoryConfig {
                display_name: "Testing".to_string(),
                weight: 0.15,
                metrics: vec![
                    MetricThresholds::new(
                        "test_to_code_ratio",
                        0.25,
                        &[(0.0, 1.0), (0.2, 4.0), (0.5, 7.0), (1.0, 9.0), (2.0, 10.0)],
                    ),
                    MetricThresholds::new(
                        "test_file_ratio",
                        0.15,
                        &[(0.0, 1.0), (0.2, 5.0), (0.5, 8.0), (1.0, 10.0)],
                    ),
                    MetricThresholds::new(
                        "coverage_pct",
                        0.30,
                        &[(0.0, 1.0), (40.0, 4.0), (60.0, 6.0), (80.0, 9.0), (95.0, 10.0)],
                    ),
                    MetricThresholds::new(
                        "test_isolation_pct",
                        0.15,
                        &[(0.0, 2.0), (50.0, 5.0), (80.0, 8.0), (100.0, 10.0)],
                    ),
                    MetricThresholds::new(
                        "assertion_density",
                        0.15,
                        &[(0.0, 1.0), (1.0, 5.0), (3.0, 9.0), (6.0, 10.0)],
                    ),
                ],
            },
        );

        let probe_breakpoints: &[(f64, f64)] =
            &[(10.0, 1.0), (40.0, 4.0), (70.0, 7.0), (100.0, 10.0)];
        categories.insert(
            CategoryId::AgentEvaluation,
            CategoryConfig {
                display_name: "Agent Evaluation".to_string(),
                weight: 0.10,
                metrics: vec![
                    MetricThresholds::new("task_consistency", 0.25, probe_breakpoints),
                    MetricThresholds::new("code_comprehension", 0.25, probe_breakpoints),
                    MetricThresholds::new("cross_file_navigation", 0.20, probe_breakpoints),
                    MetricThresholds::new("identifier_interpretability", 0.15, probe_breakpoints),
                    MetricThresholds::new("doc_accuracy", 0.15, probe_breakpoints),
                ],
            },
        );

        Self {
            categories,
            tiers: vec![
                TierConfig {
                    name: "Agent-Ready".to_string(),
                    min_score: 8.5,
                },
                TierConfig {
                    name: "Agent-Assisted".to_string(),
                    min_score: 6.5,
                },
                TierConfig {
                    name: "Agent-Supervised".to_string(),
                    min_score: 4.5,
                },
                TierConfig {
                    name: "Agent-Resistant".to_string(),
                    min_score: 2.5,
                },
                TierConfig {
                    name: "Agent-Hostile".to_string(),
                    min_score: 0.0,
                },
            ],
        }
    }
}

impl ScoringConfig {
    /// Load configuration overrides from a YAML file.
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ReadinessError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Look up one category's configuration.
    pub fn category(&self, id: CategoryId) -> Option<&CategoryConfig> {
        self.categories.get(&id)
    }

    /// Validate weight sums, breakpoint ordering, and tier ordering.
    pub fn validate(&self) -> Result<()> {
        let category_weight_sum: f64 = self.categories.values().map(|c| c.weight).sum();
        if (category_weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ReadinessError::config(format!(
                "category weights sum to {category_weight_sum:.4}, expected 1.0"
            )));
        }

        for (id, category) in &self.categories {
            let metric_weight_sum: f64 = category.metrics.iter().map(|m| m.weight).sum();
            if (metric_weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(ReadinessError::config_field(
                    format!("metric weights sum to {metric_weight_sum:.4}, expected 1.0"),
                    id.key(),
                ));
            }

            for metric in &category.metrics {
                if metric.breakpoints.is_empty() {
                    return Err(ReadinessError::config_field(
                        "breakpoint list is empty",
                        format!("{}.{}", id.key(), metric.name),
                    ));
                }
                let ascending = metric
                    .breakpoints
                    .windows(2)
                    .all(|pair| pair[0].value < pair[1].value);
                if !ascending {
                    return Err(ReadinessError::config_field(
                        "breakpoints must be strictly ascending by raw value",
                        format!("{}.{}", id.key(), metric.name),
                    ));
                }
            }
        }

        if self.tiers.is_empty() {
            return Err(ReadinessError::config("tier list is empty"));
        }
        let descending = self
            .tiers
            .windows(2)
            .all(|pair| pair[0].min_score > pair[1].min_score);
        if !descending {
            return Err(ReadinessError::config(
                "tiers must be sorted descending by min_score",
            ));
        }
        let lowest = self.tiers.last().map(|t| t.min_score).unwrap_or(0.0);
        if lowest > 0.0 {
            return Err(ReadinessError::config(
                "lowest tier must cover the minimum possible composite",
            ));
        }

        Ok(())
    }
}
