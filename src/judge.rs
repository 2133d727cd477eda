//! LLM adjudicator: rubric-based scoring of text content.
//!
//! The adjudicator receives a rubric prompt and a content payload and
//! returns a structured `{score: 1..10, reasoning}` verdict. Calls must be
//! idempotent-safe under retries and have no other observable side effect.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::errors::{ReadinessError, Result};

/// Default per-call timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// One retry on transport failure; rubric calls are idempotent.
const MAX_ATTEMPTS: usize = 2;

/// A structured adjudication result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Integer score in 1..=10
    pub score: u8,
    /// The adjudicator's reasoning
    pub reasoning: String,
    /// Token usage, when the backend reports it
    pub tokens_used: Option<u64>,
}

/// Scores content against a rubric.
#[async_trait]
pub trait Adjudicator: Send + Sync {
    /// Judge `content` under `rubric`, returning a structured verdict.
    async fn judge(&self, rubric: &str, content: &str) -> Result<Verdict>;
}

/// Configuration for the Gemini-backed adjudicator.
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// API key
    pub api_key: String,
    /// API endpoint base
    pub api_endpoint: String,
    /// Model name
    pub model: String,
    /// Per-call timeout
    pub timeout: Duration,
}

impl JudgeConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ReadinessError::config("GEMINI_API_KEY environment variable not set"))?;

        Ok(Self {
            api_key,
            api_endpoint: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-2.5-flash".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }
}

/// Gemini-backed adjudicator.
pub struct GeminiAdjudicator {
    config: JudgeConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: i32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u64>,
}

/// The structured object the model is asked to emit.
#[derive(Debug, Deserialize)]
struct RubricVerdict {
    score: f64,
    #[serde(alias = "reasoning")]
    reason: String,
}

impl GeminiAdjudicator {
    /// Create an adjudicator over the given configuration.
    pub fn new(config: JudgeConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    async fn call_once(&self, prompt: &str) -> Result<Verdict> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.config.api_endpoint, self.config.model, self.config.api_key
        );

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.1,
                max_output_tokens: 1024,
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReadinessError::judge(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ReadinessError::judge(format!(
                "endpoint returned status {}",
                response.status()
            )));
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ReadinessError::judge(format!("malformed response: {e}")))?;

        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| ReadinessError::judge("response carried no candidates"))?;

        let verdict: RubricVerdict = serde_json::from_str(text.trim())
            .map_err(|e| ReadinessError::judge(format!("verdict is not valid JSON: {e}")))?;

        Ok(Verdict {
            score: (verdict.score.round() as i64).clamp(1, 10) as u8,
            reasoning: verdict.reason,
            tokens_used: body.usage_metadata.and_then(|u| u.total_token_count),
        })
    }
}

#[async_trait]
impl Adjudicator for GeminiAdjudicator {
    async fn judge(&self, rubric: &str, content: &str) -> Result<Verdict> {
        let prompt = format!(
            "{rubric}\n\nRespond with a JSON object {{\"score\": <integer 1-10>, \"reason\": \"<string>\"}} and nothing else.\n\n--- CONTENT ---\n{content}"
        );

        let mut last_err = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.call_once(&prompt).await {
                Ok(verdict) => return Ok(verdict),
                Err(err) => {
                    tracing::debug!(attempt, error = %err, "adjudicator call failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ReadinessError::judge("adjudicator failed")))
    }
}

/// Deterministic adjudicator for tests and dry runs.
///
/// Returns a fixed score per rubric keyword, or the default score when no
/// keyword matches.
pub struct ScriptedAdjudicator {
    /// (rubric substring, score) pairs checked in order
    pub rules: Vec<(String, u8)>,
    /// Score when no rule matches
    pub default_score: u8,
}

impl ScriptedAdjudicator {
    /// An adjudicator that always returns the given score.
    pub fn constant(score: u8) -> Self {
        Self {
            rules: Vec::new(),
            default_score: score,
        }
    }
}

#[async_trait]
impl Adjudicator for ScriptedAdjudicator {
    async fn judge(&self, rubric: &str, _content: &str) -> Result<Verdict> {
        let score = self
            .rules
            .iter()
            .find(|(needle, _)| rubric.contains(needle.as_str()))
            .map(|&(_, score)| score)
            .unwrap_or(self.default_score);

        Ok(Verdict {
            score: score.clamp(1, 10),
            reasoning: "scripted verdict".to_string(),
            tokens_used: None,
        })
    }
}
