//! Raw metric bundles and evidence.
//!
//! Extractors reduce analyzer output to a flat name -> raw-value mapping
//! plus evidence items; the scoring engine consumes nothing else. Maps are
//! insertion-ordered so rendering stays deterministic across runs.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Number of worst offenders retained per metric.
pub const EVIDENCE_LIMIT: usize = 5;

/// A concrete code location backing a metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Repository-relative file path, forward-slash form
    pub file: String,
    /// Line number, when the evidence is line-anchored
    pub line: Option<usize>,
    /// The numeric value at this location
    pub value: f64,
    /// Human-readable description
    pub description: String,
}

impl Evidence {
    /// Create a file-level evidence item.
    pub fn file_level(file: impl Into<String>, value: f64, description: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            value,
            description: description.into(),
        }
    }

    /// Create a line-anchored evidence item.
    pub fn at_line(
        file: impl Into<String>,
        line: usize,
        value: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            value,
            description: description.into(),
        }
    }
}

/// Severity ordering for evidence selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Larger raw values are worse (complexity, churn)
    HighIsWorse,
    /// Smaller raw values are worse (assertion density)
    LowIsWorse,
}

/// Keep the top worst offenders, deterministically ordered.
///
/// Sorts by severity, then file path, then line number, and truncates to
/// [`EVIDENCE_LIMIT`].
pub fn select_evidence(mut items: Vec<Evidence>, severity: Severity) -> Vec<Evidence> {
    items.sort_by(|a, b| {
        let by_value = match severity {
            Severity::HighIsWorse => b.value.partial_cmp(&a.value),
            Severity::LowIsWorse => a.value.partial_cmp(&b.value),
        }
        .unwrap_or(std::cmp::Ordering::Equal);

        by_value
            .then_with(|| a.file.cmp(&b.file))
            .then_with(|| a.line.unwrap_or(0).cmp(&b.line.unwrap_or(0)))
    });
    items.truncate(EVIDENCE_LIMIT);
    items
}

/// Scalar aggregate reporting a distribution and its worst specimen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    /// Mean over all observed values
    pub average: f64,
    /// Largest observed value
    pub max: f64,
    /// Identifier of the maximum's bearer (file, function)
    pub max_bearer: String,
}

impl MetricSummary {
    /// Build a summary from (value, bearer) pairs.
    ///
    /// Ties on the maximum resolve to the lexicographically smallest bearer
    /// so the summary is stable across runs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (f64, &'a str)>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut max_bearer = String::new();

        for (value, bearer) in pairs {
            count += 1;
            sum += value;
            if value > max || (value == max && bearer < max_bearer.as_str()) {
                max = value;
                max_bearer = bearer.to_string();
            }
        }

        if count == 0 {
            return Self::default();
        }
        Self {
            average: sum / count as f64,
            max,
            max_bearer,
        }
    }
}

/// Per-category raw measurements handed to the scoring engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMetricBundle {
    /// Metric name -> raw value
    pub values: IndexMap<String, f64>,
    /// Metric names whose value could not be measured
    pub unavailable: BTreeSet<String>,
    /// Metric name -> evidence items (every advertised key is present)
    pub evidence: IndexMap<String, Vec<Evidence>>,
}

impl RawMetricBundle {
    /// Record a measured raw value with its evidence.
    pub fn set(&mut self, name: &str, value: f64, evidence: Vec<Evidence>) {
        self.values.insert(name.to_string(), value);
        self.evidence.insert(name.to_string(), evidence);
    }

    /// Mark a metric as unavailable, keeping its (empty) evidence key.
    pub fn mark_unavailable(&mut self, name: &str) {
        self.unavailable.insert(name.to_string());
        self.evidence.entry(name.to_string()).or_default();
    }

    /// A bundle in which every named metric is unavailable.
    pub fn all_unavailable<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut bundle = Self::default();
        for name in names {
            bundle.mark_unavailable(name);
        }
        bundle
    }

    /// Raw value for a metric, defaulting to 0.
    pub fn value_or_zero(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    /// Evidence for a metric, empty when none was recorded.
    pub fn evidence_for(&self, name: &str) -> Vec<Evidence> {
        self.evidence.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evidence_selection_is_deterministic() {
        let items = vec![
            Evidence::at_line("b.py", 3, 12.0, "x"),
            Evidence::at_line("a.py", 9, 12.0, "y"),
            Evidence::at_line("a.py", 1, 30.0, "z"),
        ];

        let picked = select_evidence(items, Severity::HighIsWorse);
        assert_eq!(picked[0].value, 30.0);
        // Ties break by path then line.
        assert_eq!(picked[1].file, "a.py");
        assert_eq!(picked[2].file, "b.py");
    }

    #[test]
    fn low_is_worse_inverts_ordering() {
        let items = vec![
            Evidence::file_level("a.go", 5.0, "dense"),
            Evidence::file_level("b.go", 0.0, "bare"),
        ];

        let picked = select_evidence(items, Severity::LowIsWorse);
        assert_eq!(picked[0].file, "b.go");
    }

    #[test]
    fn selection_truncates_to_limit() {
        let items = (0..12)
            .map(|i| Evidence::file_level(format!("f{i}.py"), i as f64, ""))
            .collect();
        assert_eq!(select_evidence(items, Severity::HighIsWorse).len(), EVIDENCE_LIMIT);
    }

    #[test]
    fn summary_from_pairs() {
        let summary = MetricSummary::from_pairs([(2.0, "a.py"), (8.0, "b.py"), (5.0, "c.py")]);
        assert_eq!(summary.average, 5.0);
        assert_eq!(summary.max, 8.0);
        assert_eq!(summary.max_bearer, "b.py");
    }

    #[test]
    fn summary_ties_break_lexicographically() {
        let summary = MetricSummary::from_pairs([(8.0, "z.py"), (8.0, "a.py")]);
        assert_eq!(summary.max_bearer, "a.py");
    }

    #[test]
    fn empty_summary_is_zeroed() {
        let summary = MetricSummary::from_pairs(std::iter::empty::<(f64, &str)>());
        assert_eq!(summary, MetricSummary::default());
    }

    #[test]
    fn unavailable_bundle_keeps_evidence_keys() {
        let bundle = RawMetricBundle::all_unavailable(["a", "b"]);
        assert!(bundle.unavailable.contains("a"));
        assert!(bundle.evidence_for("b").is_empty());
        assert!(bundle.evidence.contains_key("b"));
    }
}
