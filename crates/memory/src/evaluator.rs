//! LLM-backed memory evaluation: should a candidate ADD / UPDATE / NOOP /
//! DELETE against the existing store? The caller applies the verdict.

use std::time::Duration;

use serde::Deserialize;

use prism_common::{Error, Result};

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-haiku-4-5";
const LLM_TIMEOUT: Duration = Duration::from_secs(60);
/// Candidate content is truncated to this many chars before prompting.
const CONTENT_LIMIT: usize = 3000;

const EVAL_PROMPT: &str = r#"You are a memory agent for a software development system.
Evaluate whether the following content should be saved as a reusable skill.

Criteria for ADD (all should hold):
1. Genuine discovery: not just following standard documentation
2. Transferable: useful in another project 6 months from now
3. Verified: tested or confirmed to work
4. Clear trigger: specific situation when this applies

Content to evaluate:
---
{content}
---

Existing skills in same domain (for duplicate detection):
{existing}

Respond with a single JSON object only - no markdown, no explanation:
{
  "decision": "ADD|UPDATE|NOOP|DELETE",
  "skill_id": "suggested-kebab-id",
  "type": "skill|pattern|gotcha|decision",
  "domain_tags": ["tag1", "tag2"],
  "reason": "one sentence explanation",
  "merge_with": "existing-skill-id-or-empty"
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EvaluationDecision {
    #[serde(rename = "ADD")]
    Add,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "NOOP")]
    Noop,
    #[serde(rename = "DELETE")]
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationResult {
    pub decision: EvaluationDecision,
    #[serde(default)]
    pub skill_id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub domain_tags: Vec<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub merge_with: String,
}

impl EvaluationResult {
    fn noop(reason: impl Into<String>) -> Self {
        Self {
            decision: EvaluationDecision::Noop,
            skill_id: String::new(),
            kind: String::new(),
            domain_tags: Vec::new(),
            reason: reason.into(),
            merge_with: String::new(),
        }
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

pub struct Evaluator {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl Evaluator {
    /// Build an evaluator from the environment. A missing API key disables
    /// the component: operations requiring it fail with
    /// `ConfigurationMissing`.
    pub fn from_env(model: Option<&str>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            Error::ConfigurationMissing("ANTHROPIC_API_KEY is not set; evaluation disabled".into())
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: DEFAULT_ENDPOINT.into(),
            model: model.unwrap_or(DEFAULT_MODEL).into(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Ask the model for a verdict on `content` given the existing skill ids.
    pub async fn evaluate(
        &self,
        content: &str,
        existing_ids: &[String],
    ) -> Result<EvaluationResult> {
        let prompt = build_prompt(content, existing_ids);
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 512,
            "messages": [{"role": "user", "content": prompt}],
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .timeout(LLM_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ExternalUnavailable(format!("evaluator: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::ExternalUnavailable(format!(
                "evaluator endpoint returned {}",
                resp.status()
            )));
        }

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| Error::ExternalUnavailable(format!("evaluator: {e}")))?;
        let text = parsed
            .content
            .first()
            .map(|b| b.text.as_str())
            .unwrap_or_default();
        Ok(parse_verdict(text))
    }
}

fn build_prompt(content: &str, existing_ids: &[String]) -> String {
    let truncated: String = content.chars().take(CONTENT_LIMIT).collect();
    let existing = if existing_ids.is_empty() {
        "(none)".to_string()
    } else {
        existing_ids
            .iter()
            .map(|id| format!("- {id}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    EVAL_PROMPT
        .replace("{content}", &truncated)
        .replace("{existing}", &existing)
}

/// Parse the model's JSON verdict. Anything unparseable degrades to NOOP so
/// a flaky model can never mutate memory.
fn parse_verdict(text: &str) -> EvaluationResult {
    serde_json::from_str(text.trim())
        .unwrap_or_else(|_| EvaluationResult::noop("failed to parse evaluator response"))
}
