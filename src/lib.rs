//! # Agentready-RS: Agent-Readiness Scoring Engine
//!
//! Computes a composite 1-10 agent-readiness rating for a source repository:
//! a prediction of how effectively autonomous coding agents can comprehend,
//! modify, and extend the code. The engine provides:
//!
//! - **Code Health**: cyclomatic complexity, function length, coupling, and
//!   structural duplicate detection
//! - **Semantic Explicitness**: type annotations, naming conventions, magic
//!   numbers, null-safety signals
//! - **Architecture**: import-graph cycles, fan-out, dead exports
//! - **Documentation & Temporal Dynamics**: artifact presence, comment
//!   density, git churn, temporal coupling, hotspots
//! - **Testing**: test ratios, coverage artifact parsing, assertion density
//! - **Agent Evaluation**: live probes against an external agent CLI, judged
//!   by an LLM rubric
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        API Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Core Engine  │  Analyzers   │  Language  │  Agent Probes   │
//! │               │              │  Profiles  │                 │
//! │ • Scoring     │ • CodeHealth │ • Python   │ • Workspaces    │
//! │ • Extractors  │ • Semantics  │ • Go       │ • Executor      │
//! │ • Pipeline    │ • Temporal   │ • JS/TS    │ • Judge         │
//! │ • Config      │ • Testing    │ • Rust     │                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agentready_rs::{ReadinessEngine, ScoringConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ReadinessEngine::new(ScoringConfig::default())?;
//!     let report = engine.assess("./my-repo").await?;
//!
//!     println!("{} ({:.1}/10)", report.scored.tier, report.scored.composite);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

// Core engine modules
pub mod core {
    //! Core data model, configuration, classification, and scoring.

    pub mod bundle;
    pub mod classify;
    pub mod config;
    pub mod errors;
    pub mod pipeline;
    pub mod scoring;
}

// Category analyzers (C1-C7)
pub mod analyzers {
    //! The seven category analyzers.

    pub mod agent_eval;
    pub mod architecture;
    pub mod code_health;
    pub mod docs;
    pub mod semantics;
    pub mod temporal;
    pub mod testing;
}

// Language-specific parsing profiles
pub mod lang {
    //! Tree-sitter parsing and per-language syntax profiles.

    pub mod common;
    pub mod profile;
    pub mod registry;

    pub use common::{ParsedUnit, SourceSpan};
    pub use profile::LanguageProfile;
    pub use registry::{language_for_path, registered_languages, LanguageInfo};
}

// Metric extraction (adjacent to the scoring engine by design)
pub mod extract;

// LLM adjudicator
pub mod judge;

// Public API and engine interface
pub mod api {
    //! High-level engine facade and report types.

    pub mod engine;
}

// Re-export primary types for convenience
pub use crate::api::engine::{ReadinessEngine, ReadinessReport};
pub use crate::core::config::ScoringConfig;
pub use crate::core::errors::{ReadinessError, Result};
pub use crate::core::scoring::ScoredResult;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
