//! Metric extractors: analyzer output -> raw metric bundles.
//!
//! One extractor per category, living next to the scoring engine so the
//! scoring vocabulary (metric name strings) stays orthogonal to analyzer
//! internals. Evidence is the top five worst offenders per metric,
//! deterministically ordered; every advertised metric key always carries an
//! evidence list, even when empty.

use crate::analyzers::agent_eval::{AgentEvalMetrics, ProbeStatus};
use crate::analyzers::architecture::ArchitectureMetrics;
use crate::analyzers::code_health::CodeHealthMetrics;
use crate::analyzers::docs::DocumentationMetrics;
use crate::analyzers::semantics::SemanticsMetrics;
use crate::analyzers::temporal::TemporalMetrics;
use crate::analyzers::testing::TestingMetrics;
use crate::core::bundle::{select_evidence, Evidence, RawMetricBundle, Severity};
use crate::core::config::{CategoryId, ScoringConfig};
use crate::core::pipeline::AnalysisResult;

/// Reduce one analyzer's output to its raw metric bundle.
///
/// Unavailable categories return a bundle covering every configured metric
/// name with empty evidence, so downstream rendering stays uniform.
pub fn extract_bundle(config: &ScoringConfig, result: &AnalysisResult) -> RawMetricBundle {
    let category = result.category();
    let names: Vec<&str> = config
        .category(category)
        .map(|c| c.metrics.iter().map(|m| m.name.as_str()).collect())
        .unwrap_or_default();

    match result {
        AnalysisResult::CodeHealth(m) if m.available => extract_code_health(m),
        AnalysisResult::SemanticExplicitness(m) if m.available => extract_semantics(m),
        AnalysisResult::Architecture(m) if m.available => extract_architecture(m),
        AnalysisResult::Documentation(m) if m.available => extract_documentation(m),
        AnalysisResult::TemporalDynamics(m) if m.available => extract_temporal(m),
        AnalysisResult::Testing(m) if m.available => extract_testing(m),
        AnalysisResult::AgentEvaluation(m) if m.available => extract_agent_eval(&names, m),
        _ => RawMetricBundle::all_unavailable(names),
    }
}

fn extract_code_health(m: &CodeHealthMetrics) -> RawMetricBundle {
    let mut bundle = RawMetricBundle::default();

    let complexity_evidence = select_evidence(
        m.functions
            .iter()
            .map(|f| {
                Evidence::at_line(
                    f.file.clone(),
                    f.start_line,
                    f.complexity as f64,
                    format!("{} has cyclomatic complexity {}", f.qualified_name, f.complexity),
                )
            })
            .collect(),
        Severity::HighIsWorse,
    );
    bundle.set("avg_complexity", m.complexity.average, complexity_evidence);

    let length_evidence = select_evidence(
        m.functions
            .iter()
            .map(|f| {
                Evidence::at_line(
                    f.file.clone(),
                    f.start_line,
                    f.line_count as f64,
                    format!("{} spans {} lines", f.qualified_name, f.line_count),
                )
            })
            .collect(),
        Severity::HighIsWorse,
    );
    bundle.set("max_function_length", m.function_length.max, length_evidence);

    bundle.set(
        "avg_file_size",
        m.file_size.average,
        if m.file_size.max_bearer.is_empty() {
            Vec::new()
        } else {
            vec![Evidence::file_level(
                m.file_size.max_bearer.clone(),
                m.file_size.max,
                format!("largest file: {} lines", m.file_size.max),
            )]
        },
    );

    let duplicate_evidence = select_evidence(
        m.duplicates
            .iter()
            .map(|d| {
                Evidence::at_line(
                    d.first.file.clone(),
                    d.first.start_line,
                    d.line_count as f64,
                    format!(
                        "{} lines duplicated at {}:{}",
                        d.line_count, d.second.file, d.second.start_line
                    ),
                )
            })
            .collect(),
        Severity::HighIsWorse,
    );
    bundle.set("duplication_pct", m.duplication_pct, duplicate_evidence);

    let coupling_evidence = select_evidence(
        m.afferent
            .iter()
            .map(|(module, &count)| {
                Evidence::file_level(
                    module.clone(),
                    count as f64,
                    format!("{count} inbound references"),
                )
            })
            .chain(m.efferent.iter().map(|(module, &count)| {
                Evidence::file_level(
                    module.clone(),
                    count as f64,
                    format!("{count} outbound references"),
                )
            }))
            .collect(),
        Severity::HighIsWorse,
    );
    bundle.set("max_coupling", m.max_coupling().0, coupling_evidence);

    bundle
}

fn extract_semantics(m: &SemanticsMetrics) -> RawMetricBundle {
    let mut bundle = RawMetricBundle::default();

    bundle.set("type_annotation_pct", m.type_annotation_pct, Vec::new());

    let naming_evidence = select_evidence(
        m.misnamed_sites
            .iter()
            .map(|s| {
                Evidence::at_line(
                    s.file.clone(),
                    s.line,
                    1.0,
                    format!("'{}' breaks the naming convention", s.token),
                )
            })
            .collect(),
        Severity::HighIsWorse,
    );
    bundle.set("naming_consistency_pct", m.naming_consistency_pct, naming_evidence);

    let magic_evidence = select_evidence(
        m.magic_sites
            .iter()
            .map(|s| {
                Evidence::at_line(
                    s.file.clone(),
                    s.line,
                    1.0,
                    format!("magic literal {}", s.token),
                )
            })
            .collect(),
        Severity::HighIsWorse,
    );
    bundle.set("magic_numbers_per_kloc", m.magic_numbers_per_kloc, magic_evidence);

    bundle.set("type_strictness", m.type_strictness, Vec::new());
    bundle.set("null_safety_pct", m.null_safety_pct, Vec::new());

    bundle
}

fn extract_architecture(m: &ArchitectureMetrics) -> RawMetricBundle {
    let mut bundle = RawMetricBundle::default();

    bundle.set(
        "max_directory_depth",
        m.max_directory_depth as f64,
        Vec::new(),
    );

    bundle.set(
        "avg_fan_out",
        m.fan_out.average,
        if m.fan_out.max_bearer.is_empty() {
            Vec::new()
        } else {
            vec![Evidence::file_level(
                m.fan_out.max_bearer.clone(),
                m.fan_out.max,
                format!("imports {} intra-repo modules", m.fan_out.max),
            )]
        },
    );

    let cycle_evidence = select_evidence(
        m.cycles
            .iter()
            .map(|members| {
                Evidence::file_level(
                    members.first().cloned().unwrap_or_default(),
                    members.len() as f64,
                    format!("import cycle: {}", members.join(" -> ")),
                )
            })
            .collect(),
        Severity::HighIsWorse,
    );
    bundle.set("circular_dependencies", m.cycles.len() as f64, cycle_evidence);

    bundle.set(
        "import_complexity",
        m.import_complexity.average,
        if m.import_complexity.max_bearer.is_empty() {
            Vec::new()
        } else {
            vec![Evidence::file_level(
                m.import_complexity.max_bearer.clone(),
                m.import_complexity.max,
                format!("{} path segments", m.import_complexity.max),
            )]
        },
    );

    let dead_evidence = select_evidence(
        m.dead_exports
            .iter()
            .map(|d| {
                Evidence::at_line(
                    d.module.clone(),
                    d.line,
                    1.0,
                    format!("exported '{}' is never referenced", d.symbol),
                )
            })
            .collect(),
        Severity::HighIsWorse,
    );
    bundle.set("dead_exports", m.dead_exports.len() as f64, dead_evidence);

    bundle
}

fn extract_documentation(m: &DocumentationMetrics) -> RawMetricBundle {
    let mut bundle = RawMetricBundle::default();

    bundle.set("readme_word_count", m.readme_word_count as f64, Vec::new());
    bundle.set("artifact_presence_pct", m.artifact_presence_pct(), Vec::new());
    bundle.set("comment_density_pct", m.comment_density_pct, Vec::new());

    let undocumented_evidence = select_evidence(
        m.undocumented
            .iter()
            .map(|(file, symbol, line)| {
                Evidence::at_line(
                    file.clone(),
                    *line,
                    1.0,
                    format!("public '{symbol}' has no documentation"),
                )
            })
            .collect(),
        Severity::HighIsWorse,
    );
    bundle.set("api_doc_coverage_pct", m.api_doc_coverage_pct, undocumented_evidence);

    if m.rubric_scores.is_empty() {
        bundle.mark_unavailable("llm_doc_quality");
    } else {
        let mean: f64 = m
            .rubric_scores
            .iter()
            .map(|r| f64::from(r.score))
            .sum::<f64>()
            / m.rubric_scores.len() as f64;
        let rubric_evidence = m
            .rubric_scores
            .iter()
            .map(|r| {
                Evidence::file_level(
                    "README.md",
                    f64::from(r.score),
                    format!("{}: {}", r.name, r.reasoning),
                )
            })
            .collect();
        bundle.set("llm_doc_quality", mean * 10.0, rubric_evidence);
    }

    bundle
}

fn extract_temporal(m: &TemporalMetrics) -> RawMetricBundle {
    let mut bundle = RawMetricBundle::default();

    let hotspot_evidence = select_evidence(
        m.hotspots
            .iter()
            .map(|h| {
                Evidence::file_level(
                    h.path.clone(),
                    h.lines_changed as f64,
                    format!(
                        "{} lines changed over {} commits by {} authors",
                        h.lines_changed, h.commit_count, h.author_count
                    ),
                )
            })
            .collect(),
        Severity::HighIsWorse,
    );

    bundle.set("churn_rate", m.churn_rate, hotspot_evidence.clone());

    let coupling_evidence = select_evidence(
        m.coupled_pairs
            .iter()
            .map(|p| {
                Evidence::file_level(
                    p.file_a.clone(),
                    p.strength_pct,
                    format!(
                        "changes with {} in {:.0}% of commits ({} shared)",
                        p.file_b, p.strength_pct, p.shared_commits
                    ),
                )
            })
            .collect(),
        Severity::HighIsWorse,
    );
    bundle.set("temporal_coupling_pct", m.temporal_coupling_pct, coupling_evidence);

    bundle.set("author_fragmentation", m.author_fragmentation, Vec::new());
    bundle.set("commit_stability_days", m.commit_stability_days, Vec::new());
    bundle.set(
        "hotspot_concentration_pct",
        m.hotspot_concentration_pct,
        hotspot_evidence,
    );

    bundle
}

fn extract_testing(m: &TestingMetrics) -> RawMetricBundle {
    let mut bundle = RawMetricBundle::default();

    bundle.set("test_to_code_ratio", m.test_to_code_ratio, Vec::new());
    bundle.set("test_file_ratio", m.test_file_ratio, Vec::new());

    match m.coverage {
        Some(report) => bundle.set("coverage_pct", report.percent, Vec::new()),
        None => bundle.mark_unavailable("coverage_pct"),
    }

    let breach_evidence = select_evidence(
        m.breaches
            .iter()
            .map(|b| {
                Evidence::file_level(
                    b.file.clone(),
                    1.0,
                    format!("{} depends on external '{}'", b.function, b.import),
                )
            })
            .collect(),
        Severity::HighIsWorse,
    );
    bundle.set("test_isolation_pct", m.test_isolation_pct, breach_evidence);

    // Sparse tests are the worst offenders here.
    let density_evidence = select_evidence(
        m.test_functions
            .iter()
            .map(|t| {
                Evidence::file_level(
                    t.name.clone(),
                    t.assertions as f64,
                    format!("{} assertions", t.assertions),
                )
            })
            .collect(),
        Severity::LowIsWorse,
    );
    bundle.set("assertion_density", m.assertion_density.average, density_evidence);

    bundle
}

fn extract_agent_eval(names: &[&str], m: &AgentEvalMetrics) -> RawMetricBundle {
    let mut bundle = RawMetricBundle::default();

    for name in names {
        let Some(probe) = m.probes.iter().find(|p| p.id == *name) else {
            bundle.mark_unavailable(name);
            continue;
        };

        match probe.status {
            ProbeStatus::Completed => {
                // Judge scores are 1..10; the raw scale upstream is 0..100.
                let evidence = vec![Evidence::file_level(
                    probe.id.clone(),
                    probe.score * 10.0,
                    format!("{}: {}", probe.display_name, probe.reasoning),
                )];
                bundle.set(name, probe.score * 10.0, evidence);
            }
            // Failed probes do not bias the category mean.
            _ => bundle.mark_unavailable(name),
        }
    }

    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::agent_eval::ProbeResult;
    use crate::analyzers::code_health::FunctionRecord;
    use crate::core::bundle::MetricSummary;

    fn config() -> ScoringConfig {
        ScoringConfig::default()
    }

    #[test]
    fn unavailable_categories_cover_all_metric_names() {
        let result = AnalysisResult::unavailable(CategoryId::TemporalDynamics);
        let bundle = extract_bundle(&config(), &result);

        assert_eq!(bundle.unavailable.len(), 5);
        for name in [
            "churn_rate",
            "temporal_coupling_pct",
            "author_fragmentation",
            "commit_stability_days",
            "hotspot_concentration_pct",
        ] {
            assert!(bundle.unavailable.contains(name));
            assert!(bundle.evidence.contains_key(name), "missing evidence key {name}");
        }
    }

    #[test]
    fn code_health_evidence_is_worst_first() {
        let metrics = CodeHealthMetrics {
            available: true,
            complexity: MetricSummary {
                average: 4.0,
                max: 12.0,
                max_bearer: "worst".to_string(),
            },
            functions: vec![
                FunctionRecord {
                    qualified_name: "mild".to_string(),
                    file: "a.py".to_string(),
                    start_line: 1,
                    line_count: 5,
                    complexity: 3,
                },
                FunctionRecord {
                    qualified_name: "worst".to_string(),
                    file: "b.py".to_string(),
                    start_line: 10,
                    line_count: 40,
                    complexity: 12,
                },
            ],
            ..CodeHealthMetrics::default()
        };

        let bundle = extract_bundle(&config(), &AnalysisResult::CodeHealth(metrics));
        let evidence = bundle.evidence_for("avg_complexity");
        assert_eq!(evidence[0].value, 12.0);
        assert!(evidence[0].description.contains("worst"));
    }

    #[test]
    fn failed_probes_become_unavailable_metrics() {
        let metrics = AgentEvalMetrics {
            available: true,
            probes: vec![
                ProbeResult {
                    id: "task_consistency".to_string(),
                    display_name: "Task-Execution Consistency".to_string(),
                    score: 7.0,
                    status: ProbeStatus::Completed,
                    duration_secs: 1.0,
                    reasoning: "solid".to_string(),
                    response_excerpt: String::new(),
                },
                ProbeResult {
                    id: "code_comprehension".to_string(),
                    display_name: "Code-Behavior Comprehension".to_string(),
                    score: 0.0,
                    status: ProbeStatus::Timeout,
                    duration_secs: 300.0,
                    reasoning: "probe deadline elapsed".to_string(),
                    response_excerpt: String::new(),
                },
            ],
            approx_tokens: 0,
            total_cost_usd: 0.0,
        };

        let bundle = extract_bundle(&config(), &AnalysisResult::AgentEvaluation(metrics));
        assert_eq!(bundle.value_or_zero("task_consistency"), 70.0);
        assert!(bundle.unavailable.contains("code_comprehension"));
        // Probes that never appear are unavailable too.
        assert!(bundle.unavailable.contains("doc_accuracy"));
    }

    #[test]
    fn coverage_absence_is_unavailable_not_zero() {
        let metrics = TestingMetrics {
            available: true,
            coverage: None,
            ..TestingMetrics::default()
        };
        let bundle = extract_bundle(&config(), &AnalysisResult::Testing(metrics));
        assert!(bundle.unavailable.contains("coverage_pct"));
        assert!(!bundle.unavailable.contains("test_to_code_ratio"));
    }

    #[test]
    fn llm_rubrics_scale_to_raw_hundred() {
        use crate::analyzers::docs::RubricScore;

        let metrics = DocumentationMetrics {
            available: true,
            rubric_scores: vec![
                RubricScore {
                    name: "readme_clarity".to_string(),
                    score: 8,
                    reasoning: "clear".to_string(),
                },
                RubricScore {
                    name: "completeness".to_string(),
                    score: 6,
                    reasoning: "gaps".to_string(),
                },
            ],
            ..DocumentationMetrics::default()
        };

        let bundle = extract_bundle(&config(), &AnalysisResult::Documentation(metrics));
        assert_eq!(bundle.value_or_zero("llm_doc_quality"), 70.0);
    }

    #[test]
    fn every_metric_key_has_an_evidence_list() {
        for id in CategoryId::ALL {
            let bundle = extract_bundle(&config(), &AnalysisResult::unavailable(id));
            for metric in &config().category(id).unwrap().metrics {
                assert!(
                    bundle.evidence.contains_key(&metric.name),
                    "{id}: {} lacks evidence key",
                    metric.name
                );
            }
        }
    }
}
