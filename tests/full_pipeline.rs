//! End-to-end pipeline tests over a synthetic fixture repository.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use agentready_rs::analyzers::agent_eval::{AgentEvalAnalyzer, AgentEvalConfig};
use agentready_rs::core::config::CategoryId;
use agentready_rs::judge::ScriptedAdjudicator;
use agentready_rs::{ReadinessEngine, ScoringConfig};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A small mixed-quality fixture: one clean module, one messy one, a test,
/// documentation, and a coverage artifact.
fn build_fixture(root: &Path) {
    write(
        root,
        "README.md",
        "# Fixture\n\nA fixture project used to exercise the scoring pipeline.\n\n\
         ```python\nimport app\napp.run()\n```\n\n```sh\npython -m app\n```\n",
    );
    write(root, "CHANGELOG.md", "## 0.1.0\n- initial\n");
    write(
        root,
        "app/__init__.py",
        "\"\"\"Application package.\"\"\"\n",
    );
    write(
        root,
        "app/core.py",
        "\"\"\"Core logic.\"\"\"\n\nfrom app import util\n\n\ndef run(limit: int) -> int:\n    \"\"\"Run the main loop.\"\"\"\n    total = 0\n    for i in range(limit):\n        if i % 2 == 0:\n            total += util.double(i)\n        else:\n            total += i\n    return total\n",
    );
    write(
        root,
        "app/util.py",
        "\"\"\"Helpers.\"\"\"\n\n\ndef double(x: int) -> int:\n    \"\"\"Double a value.\"\"\"\n    return x * 2\n\n\ndef unused_helper(x: int) -> int:\n    return x + 37\n",
    );
    write(
        root,
        "tests/test_core.py",
        "from app import core\n\n\ndef test_run():\n    assert core.run(4) == 8\n    assert core.run(0) == 0\n",
    );
    write(root, "lcov.info", "DA:1,3\nDA:2,0\nDA:3,1\nDA:4,2\n");
}

fn git(root: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .arg("-C")
        .arg(root)
        .args(args)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn init_history(root: &Path) -> bool {
    if !git(root, &["init", "-q"]) {
        return false;
    }
    git(root, &["config", "user.email", "fixture@example.com"]);
    git(root, &["config", "user.name", "Fixture"]);
    git(root, &["add", "."]) && git(root, &["commit", "-q", "-m", "initial"])
}

#[tokio::test]
async fn full_run_scores_available_categories() {
    let dir = TempDir::new().unwrap();
    build_fixture(dir.path());

    let engine = ReadinessEngine::new(ScoringConfig::default()).unwrap();
    let report = engine.assess(dir.path()).await.unwrap();

    assert_eq!(report.scored.categories.len(), 7);
    assert!(report.scored.composite > 0.0);

    let by_id = |id: CategoryId| {
        report
            .scored
            .categories
            .iter()
            .find(|c| c.id == id)
            .unwrap()
    };

    // Static categories must all be measurable on this fixture.
    for id in [
        CategoryId::CodeHealth,
        CategoryId::SemanticExplicitness,
        CategoryId::Architecture,
        CategoryId::Documentation,
        CategoryId::Testing,
    ] {
        assert!(by_id(id).is_available(), "{id} should be available");
    }

    // Coverage came from the LCOV artifact: 3 of 4 lines hit.
    let testing = by_id(CategoryId::Testing);
    let coverage = testing
        .sub_scores
        .iter()
        .find(|s| s.name == "coverage_pct")
        .unwrap();
    assert!(coverage.available);
    assert!((coverage.raw_value - 75.0).abs() < 1e-6);

    // Agent evaluation is disabled by default.
    assert!(!by_id(CategoryId::AgentEvaluation).is_available());
}

#[tokio::test]
async fn two_runs_are_deterministic() {
    let dir = TempDir::new().unwrap();
    build_fixture(dir.path());

    let engine = ReadinessEngine::new(ScoringConfig::default()).unwrap();
    let first = engine.assess(dir.path()).await.unwrap();
    let second = engine.assess(dir.path()).await.unwrap();

    assert_eq!(first.scored.composite, second.scored.composite);
    assert_eq!(first.scored.tier, second.scored.tier);
    for (a, b) in first
        .scored
        .categories
        .iter()
        .zip(second.scored.categories.iter())
    {
        assert_eq!(a.score, b.score, "category {} diverged", a.name);
        for (sa, sb) in a.sub_scores.iter().zip(b.sub_scores.iter()) {
            assert_eq!(sa.raw_value, sb.raw_value, "metric {} diverged", sa.name);
            assert_eq!(sa.evidence, sb.evidence, "evidence for {} diverged", sa.name);
        }
    }
}

#[tokio::test]
async fn git_history_enables_temporal_metrics() {
    let dir = TempDir::new().unwrap();
    build_fixture(dir.path());
    if !init_history(dir.path()) {
        // No git on this host; the unavailability path is covered elsewhere.
        return;
    }
    // A second commit so at least one file has a change gap.
    write(dir.path(), "app/util.py", "\"\"\"Helpers.\"\"\"\n\n\ndef double(x: int) -> int:\n    \"\"\"Double a value.\"\"\"\n    return x + x\n");
    git(dir.path(), &["add", "."]);
    git(dir.path(), &["commit", "-q", "-m", "tweak double"]);

    let engine = ReadinessEngine::new(ScoringConfig::default()).unwrap();
    let report = engine.assess(dir.path()).await.unwrap();

    let temporal = report
        .scored
        .categories
        .iter()
        .find(|c| c.id == CategoryId::TemporalDynamics)
        .unwrap();
    assert!(temporal.is_available());
    assert!(temporal.score >= 0.0 && temporal.score <= 10.0);
}

#[tokio::test]
async fn adjudicator_enables_doc_rubrics() {
    let dir = TempDir::new().unwrap();
    build_fixture(dir.path());

    let engine = ReadinessEngine::new(ScoringConfig::default())
        .unwrap()
        .with_adjudicator(Arc::new(ScriptedAdjudicator::constant(8)));
    let report = engine.assess(dir.path()).await.unwrap();

    let docs = report
        .scored
        .categories
        .iter()
        .find(|c| c.id == CategoryId::Documentation)
        .unwrap();
    let rubric = docs
        .sub_scores
        .iter()
        .find(|s| s.name == "llm_doc_quality")
        .unwrap();
    assert!(rubric.available);
    assert!((rubric.raw_value - 80.0).abs() < 1e-6);
}

#[tokio::test]
async fn cancel_token_is_exposed_for_root_cancellation() {
    // The analyzer must hand out a token that external orchestration can
    // trip; actual propagation is covered by the executor tests.
    let analyzer = AgentEvalAnalyzer::new(AgentEvalConfig::default(), None);
    let token = analyzer.cancel_token();
    assert!(!token.is_cancelled());
    token.cancel();
    assert!(analyzer.cancel_token().is_cancelled());
}
