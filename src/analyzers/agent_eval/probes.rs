//! The MECE probe set.
//!
//! Each probe hands the external agent one read-only task and carries the
//! rubric its response is judged against. Probe weights shape the category
//! score; the set is fixed but individually addressable for tests.

use std::time::Duration;

/// Default per-probe deadline.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(300);

/// Read-only tools the agent may use during a probe.
pub const READ_ONLY_TOOLS: &[&str] = &["Read", "Grep", "Glob", "LS"];

/// One agent probe definition.
#[derive(Debug, Clone)]
pub struct ProbeSpec {
    /// Stable identifier (doubles as the metric name)
    pub id: &'static str,
    /// Human-readable name
    pub display_name: &'static str,
    /// The task handed to the agent
    pub task: &'static str,
    /// Judging rubric with weighted criteria
    pub rubric: &'static str,
    /// Per-probe deadline
    pub timeout: Duration,
}

/// The configured probe set, in reporting order.
pub fn probe_set() -> Vec<ProbeSpec> {
    vec![
        ProbeSpec {
            id: "task_consistency",
            display_name: "Task-Execution Consistency",
            task: "List the primary entry points of this repository (binaries, main \
                   functions, exported top-level APIs) and for each, state in one \
                   sentence what it does. Be precise about file paths.",
            rubric: "Score how consistently and precisely the agent executed the task. \
                     Criteria: every named entry point exists at the stated path (40%), \
                     descriptions match actual behavior (30%), no invented files or \
                     functions (20%), answer is complete for a repository of this size (10%).",
            timeout: DEFAULT_PROBE_TIMEOUT,
        },
        ProbeSpec {
            id: "code_comprehension",
            display_name: "Code-Behavior Comprehension",
            task: "Pick the most behaviorally complex source file in this repository and \
                   explain, step by step, what its central function does, including edge \
                   cases and error paths.",
            rubric: "Score the agent's comprehension of code behavior. Criteria: the \
                     explanation matches the code's actual control flow (40%), edge cases \
                     and error paths are identified (30%), the chosen file is genuinely \
                     central (15%), no hallucinated behavior (15%).",
            timeout: DEFAULT_PROBE_TIMEOUT,
        },
        ProbeSpec {
            id: "cross_file_navigation",
            display_name: "Cross-File Navigation",
            task: "Trace one complete data or control flow that crosses at least three \
                   files in this repository, naming each file and the hand-off between \
                   them.",
            rubric: "Score the agent's cross-file navigation. Criteria: the traced flow \
                     is real and the hand-offs are accurate (45%), at least three files \
                     are correctly linked (25%), file paths are exact (20%), the flow \
                     chosen is representative rather than trivial (10%).",
            timeout: DEFAULT_PROBE_TIMEOUT,
        },
        ProbeSpec {
            id: "identifier_interpretability",
            display_name: "Identifier Interpretability",
            task: "Using only names (no doc comments), infer what the ten most important \
                   identifiers in this repository mean, then verify each inference \
                   against the code and report which names misled you.",
            rubric: "Score how interpretable the repository's identifiers were to the \
                     agent. Criteria: inferences from names alone were mostly correct \
                     (50%), misleading names are identified concretely (30%), the chosen \
                     identifiers are genuinely central (20%).",
            timeout: DEFAULT_PROBE_TIMEOUT,
        },
        ProbeSpec {
            id: "doc_accuracy",
            display_name: "Documentation-Accuracy Detection",
            task: "Compare the README's claims against the code. Report every claim that \
                   is inaccurate, outdated, or unverifiable, citing the contradicting \
                   file and line where possible.",
            rubric: "Score the agent's documentation-accuracy detection. Criteria: \
                     reported discrepancies are real (45%), citations point at the right \
                     code (25%), accurate claims are not falsely flagged (20%), coverage \
                     of the README is reasonably complete (10%).",
            timeout: DEFAULT_PROBE_TIMEOUT,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{CategoryId, ScoringConfig};

    #[test]
    fn probe_ids_match_scoring_vocabulary() {
        let config = ScoringConfig::default();
        let metric_names: Vec<&str> = config
            .category(CategoryId::AgentEvaluation)
            .unwrap()
            .metrics
            .iter()
            .map(|m| m.name.as_str())
            .collect();

        for probe in probe_set() {
            assert!(
                metric_names.contains(&probe.id),
                "probe {} missing from scoring config",
                probe.id
            );
        }
    }

    #[test]
    fn probes_are_unique_and_ordered() {
        let probes = probe_set();
        assert_eq!(probes.len(), 5);
        let mut ids: Vec<&str> = probes.iter().map(|p| p.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn default_deadline_is_five_minutes() {
        assert_eq!(DEFAULT_PROBE_TIMEOUT, Duration::from_secs(300));
        assert!(probe_set().iter().all(|p| p.timeout == DEFAULT_PROBE_TIMEOUT));
    }
}
