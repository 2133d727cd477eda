//! Coverage artifact detection and parsing.
//!
//! Artifacts are probed in a fixed order: native Go profile, then LCOV,
//! then Cobertura XML. A malformed artifact makes the coverage metric
//! unavailable without failing the category.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::core::errors::{ReadinessError, Result};

/// Which artifact produced the coverage figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageSource {
    /// Go `cover.out` statement profile
    GoNative,
    /// LCOV tracefile
    Lcov,
    /// Cobertura XML
    Cobertura,
}

impl CoverageSource {
    /// Stable tag used in reports.
    pub fn tag(self) -> &'static str {
        match self {
            CoverageSource::GoNative => "go",
            CoverageSource::Lcov => "lcov",
            CoverageSource::Cobertura => "cobertura",
        }
    }
}

/// A parsed coverage figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Covered percentage in [0, 100]
    pub percent: f64,
    /// Artifact format
    pub source: CoverageSource,
}

/// Candidate file names per format, probed in order.
const GO_NATIVE_NAMES: &[&str] = &["cover.out", "coverage.out"];
const LCOV_NAMES: &[&str] = &["lcov.info", "coverage.lcov"];
const COBERTURA_NAMES: &[&str] = &["cobertura.xml", "coverage.xml"];

/// Find and parse the first coverage artifact under the root.
///
/// Returns `Ok(None)` when no artifact exists; a present-but-malformed
/// artifact is a [`ReadinessError::Parse`].
pub fn detect_coverage(root: &Path) -> Result<Option<CoverageReport>> {
    for name in GO_NATIVE_NAMES {
        let path = root.join(name);
        if path.is_file() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ReadinessError::io("failed to read coverage profile", e))?;
            return parse_go_native(&text).map(|percent| {
                Some(CoverageReport {
                    percent,
                    source: CoverageSource::GoNative,
                })
            });
        }
    }

    for name in LCOV_NAMES {
        let path = root.join(name);
        if path.is_file() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ReadinessError::io("failed to read lcov tracefile", e))?;
            return parse_lcov(&text).map(|percent| {
                Some(CoverageReport {
                    percent,
                    source: CoverageSource::Lcov,
                })
            });
        }
    }

    for name in COBERTURA_NAMES {
        let path = root.join(name);
        if path.is_file() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ReadinessError::io("failed to read cobertura report", e))?;
            return parse_cobertura(&text).map(|percent| {
                Some(CoverageReport {
                    percent,
                    source: CoverageSource::Cobertura,
                })
            });
        }
    }

    Ok(None)
}

/// Go statement profile: `file:start,end numstmts count` after a mode line.
pub fn parse_go_native(text: &str) -> Result<f64> {
    let mut total = 0u64;
    let mut covered = 0u64;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("mode:") {
            continue;
        }
        let mut fields = line.split_whitespace().rev();
        let count: u64 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| ReadinessError::parse("go-cover", format!("bad line: {line}")))?;
        let statements: u64 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| ReadinessError::parse("go-cover", format!("bad line: {line}")))?;

        total += statements;
        if count > 0 {
            covered += statements;
        }
    }

    if total == 0 {
        return Err(ReadinessError::parse("go-cover", "profile carries no statements"));
    }
    Ok(covered as f64 * 100.0 / total as f64)
}

/// LCOV tracefile: `DA:<line>,<hit>` records.
pub fn parse_lcov(text: &str) -> Result<f64> {
    let mut total = 0u64;
    let mut hit = 0u64;

    for line in text.lines() {
        let Some(record) = line.trim().strip_prefix("DA:") else {
            continue;
        };
        let mut parts = record.splitn(2, ',');
        let _line_no = parts.next();
        let hits: u64 = parts
            .next()
            .and_then(|f| f.trim().parse().ok())
            .ok_or_else(|| ReadinessError::parse("lcov", format!("bad DA record: {line}")))?;

        total += 1;
        if hits != 0 {
            hit += 1;
        }
    }

    if total == 0 {
        return Err(ReadinessError::parse("lcov", "tracefile carries no DA records"));
    }
    Ok(hit as f64 * 100.0 / total as f64)
}

/// Cobertura XML: the top-level `coverage` element's `line-rate`.
pub fn parse_cobertura(text: &str) -> Result<f64> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element) | Event::Empty(element)) => {
                if element.name().as_ref() == b"coverage" {
                    for attribute in element.attributes().flatten() {
                        if attribute.key.as_ref() == b"line-rate" {
                            let value = String::from_utf8_lossy(&attribute.value);
                            let rate: f64 = value.trim().parse().map_err(|_| {
                                ReadinessError::parse(
                                    "cobertura",
                                    format!("bad line-rate: {value}"),
                                )
                            })?;
                            return Ok(rate * 100.0);
                        }
                    }
                    return Err(ReadinessError::parse(
                        "cobertura",
                        "coverage element has no line-rate attribute",
                    ));
                }
            }
            Ok(Event::Eof) => {
                return Err(ReadinessError::parse(
                    "cobertura",
                    "no coverage element found",
                ))
            }
            Err(e) => {
                return Err(ReadinessError::parse("cobertura", format!("xml error: {e}")))
            }
            _ => {}
        }
        buf.clear();
    }
}
