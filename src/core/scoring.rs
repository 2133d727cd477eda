//! Piecewise-linear normalization and weighted aggregation.
//!
//! Converts heterogeneous raw measurements into comparable 0-10 scores,
//! aggregates them per category, and reduces the categories to a single
//! composite with a tier label. The engine performs no I/O and runs to
//! completion on whatever the analyzers delivered.

use serde::{Deserialize, Serialize};

use crate::core::bundle::RawMetricBundle;
use crate::core::config::{Breakpoint, CategoryId, ScoringConfig};
use crate::core::errors::{ReadinessError, Result};

/// Sentinel category score when every sub-score is unavailable.
pub const UNAVAILABLE_CATEGORY: f64 = -1.0;

/// Neutral score for an empty breakpoint list.
const NEUTRAL_SCORE: f64 = 5.0;

/// Piecewise-linear interpolation over a breakpoint sequence.
///
/// Values at or below the first breakpoint clamp to its score; values at or
/// above the last clamp to its score. Score sequences may be increasing or
/// decreasing; the algorithm is identical.
pub fn interpolate(breakpoints: &[Breakpoint], raw: f64) -> f64 {
    let Some(first) = breakpoints.first() else {
        return NEUTRAL_SCORE;
    };
    let last = breakpoints.last().expect("non-empty list has a last element");

    if raw <= first.value {
        return first.score;
    }
    if raw >= last.value {
        return last.score;
    }

    for pair in breakpoints.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if raw >= lo.value && raw <= hi.value {
            let fraction = (raw - lo.value) / (hi.value - lo.value);
            return lo.score + fraction * (hi.score - lo.score);
        }
    }

    // Unreachable for strictly ascending breakpoints; clamp defensively.
    last.score
}

/// One metric's normalized score within a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubScore {
    /// Metric name
    pub name: String,
    /// Raw measured value (0 when missing)
    pub raw_value: f64,
    /// Weight within the category
    pub weight: f64,
    /// Normalized score in [0, 10]
    pub score: f64,
    /// Whether the metric could be measured
    pub available: bool,
    /// Worst-offender locations backing the value
    pub evidence: Vec<crate::core::bundle::Evidence>,
}

/// One category's aggregate score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryScore {
    /// Category identifier
    pub id: CategoryId,
    /// Display name from configuration
    pub name: String,
    /// Weighted score in [0, 10], or [`UNAVAILABLE_CATEGORY`]
    pub score: f64,
    /// Category weight within the composite
    pub weight: f64,
    /// Per-metric sub-scores in configured order
    pub sub_scores: Vec<SubScore>,
}

impl CategoryScore {
    /// Whether this category participates in the composite.
    pub fn is_available(&self) -> bool {
        self.score >= 0.0
    }
}

/// The final scored result for a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResult {
    /// Per-category scores in C1..C7 order
    pub categories: Vec<CategoryScore>,
    /// Composite score in [0, 10]
    pub composite: f64,
    /// Tier label for the composite
    pub tier: String,
}

/// Scores raw metric bundles against a validated configuration.
#[derive(Debug)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    /// Create an engine over a validated configuration.
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Access the underlying configuration.
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score one category's raw bundle.
    pub fn score_category(&self, id: CategoryId, bundle: &RawMetricBundle) -> Result<CategoryScore> {
        let category = self
            .config
            .category(id)
            .ok_or_else(|| ReadinessError::config_field("category not configured", id.key()))?;

        let mut sub_scores = Vec::with_capacity(category.metrics.len());
        for metric in &category.metrics {
            let raw_value = bundle.value_or_zero(&metric.name);
            let available = !bundle.unavailable.contains(&metric.name);
            let score = if available {
                interpolate(&metric.breakpoints, raw_value).clamp(0.0, 10.0)
            } else {
                0.0
            };

            sub_scores.push(SubScore {
                name: metric.name.clone(),
                raw_value,
                weight: metric.weight,
                score,
                available,
                evidence: bundle.evidence_for(&metric.name),
            });
        }

        let available_weight: f64 = sub_scores
            .iter()
            .filter(|s| s.available)
            .map(|s| s.weight)
            .sum();
        let score = if available_weight > 0.0 {
            let weighted: f64 = sub_scores
                .iter()
                .filter(|s| s.available)
                .map(|s| s.score * s.weight)
                .sum();
            (weighted / available_weight).clamp(0.0, 10.0)
        } else {
            UNAVAILABLE_CATEGORY
        };

        Ok(CategoryScore {
            id,
            name: category.display_name.clone(),
            score,
            weight: category.weight,
            sub_scores,
        })
    }

    /// Combine category scores into the composite and classify its tier.
    ///
    /// Unavailable categories are excluded from the divisor, so disabling an
    /// analyzer does not depress the composite.
    pub fn compose(&self, categories: Vec<CategoryScore>) -> ScoredResult {
        let available_weight: f64 = categories
            .iter()
            .filter(|c| c.is_available())
            .map(|c| c.weight)
            .sum();

        let composite = if available_weight > 0.0 {
            let weighted: f64 = categories
                .iter()
                .filter(|c| c.is_available())
                .map(|c| c.score * c.weight)
                .sum();
            (weighted / available_weight).clamp(0.0, 10.0)
        } else {
            0.0
        };

        let tier = self.classify_tier(composite);

        ScoredResult {
            categories,
            composite,
            tier,
        }
    }

    /// First tier whose inclusive lower bound admits the composite.
    pub fn classify_tier(&self, composite: f64) -> String {
        self.config
            .tiers
            .iter()
            .find(|tier| composite >= tier.min_score)
            .or_else(|| self.config.tiers.last())
            .map(|tier| tier.name.clone())
            .unwrap_or_default()
    }
}
