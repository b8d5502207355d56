//! LLM-backed risk assessment over an OpenAI-compatible chat API.
//!
//! Groq is preferred when `GROQ_API_KEY` is set, otherwise OpenAI via
//! `OPENAI_API_KEY`. Without a key every record is labelled `UNKNOWN`.

use super::{Assessment, RiskAssessor};
use crate::model::{ExtensionRecord, RiskScore};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const GROQ_MODEL: &str = "llama-3.3-70b-versatile";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-4";

const SYSTEM_PROMPT: &str =
    "You are an expert Security Analyst. You assess browser extensions for security risks.";

/// Indicators listed in the prompt before summarising with a count.
const PROMPT_INDICATOR_LIMIT: usize = 10;

/// Connection settings for the chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmEndpoint {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

impl LlmEndpoint {
    /// Picks a provider from the environment.
    pub fn from_env() -> Option<Self> {
        Self::from_keys(
            std::env::var("GROQ_API_KEY").ok(),
            std::env::var("OPENAI_API_KEY").ok(),
        )
    }

    fn from_keys(groq: Option<String>, openai: Option<String>) -> Option<Self> {
        let non_empty = |k: Option<String>| k.filter(|k| !k.trim().is_empty());

        if let Some(api_key) = non_empty(groq) {
            return Some(Self {
                base_url: GROQ_BASE_URL.to_string(),
                model: GROQ_MODEL.to_string(),
                api_key,
            });
        }

        non_empty(openai).map(|api_key| Self {
            base_url: OPENAI_BASE_URL.to_string(),
            model: OPENAI_MODEL.to_string(),
            api_key,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

pub struct LlmAssessor {
    client: reqwest::Client,
    endpoint: Option<LlmEndpoint>,
}

impl LlmAssessor {
    pub fn new(endpoint: Option<LlmEndpoint>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, endpoint }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    async fn complete(&self, endpoint: &LlmEndpoint, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &endpoint.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", endpoint.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&endpoint.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("empty completion"))
    }
}

#[async_trait]
impl RiskAssessor for LlmAssessor {
    fn name(&self) -> &'static str {
        "LLM"
    }

    async fn assess(&self, record: &ExtensionRecord) -> Assessment {
        let endpoint = match &self.endpoint {
            Some(endpoint) => endpoint,
            None => return Assessment::unknown("LLM analysis skipped (no API key configured)."),
        };

        let prompt = build_prompt(record);
        match self.complete(endpoint, &prompt).await {
            Ok(content) => parse_response(&content),
            Err(e) => {
                warn!(app_id = %record.id, error = %e, "LLM analysis failed");
                Assessment::unknown(format!("Error during LLM analysis: {}", e))
            }
        }
    }
}

/// The score is taken from the last `Risk:` line, so an echoed
/// `Risk: <Level>` template before the answer does not count. The whole
/// reply is the summary.
pub fn parse_response(content: &str) -> Assessment {
    let score = content
        .lines()
        .map(str::trim)
        .rev()
        .find(|line| line.to_lowercase().starts_with("risk:"))
        .and_then(|line| line.split_once(':'))
        .map(|(_, level)| {
            RiskScore::parse_lenient(level.trim_matches(|c: char| !c.is_alphabetic()))
        })
        .unwrap_or_default();

    Assessment::new(score, content.trim())
}

fn preview<'a, I>(items: I, total: usize) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let shown: Vec<&str> = items
        .into_iter()
        .take(PROMPT_INDICATOR_LIMIT)
        .map(String::as_str)
        .collect();
    format!("{} ... ({} total)", shown.join(", "), total)
}

pub fn build_prompt(record: &ExtensionRecord) -> String {
    let age = record
        .age_days
        .map(|d| d.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    format!(
        "Analyze the risk of the following browser extension:\n\n\
         Name: {name}\n\
         ID: {id}\n\
         Version: {version}\n\
         Author: {author}\n\
         Description: {description}\n\
         Permissions: {permissions}\n\
         CSP: {csp}\n\
         Extension Age (Days): {age}\n\
         Extracted URLs: {urls}\n\
         Extracted IPs: {ips}\n\n\
         Determine the Risk Level (Low, Medium, High, Critical) and provide a justification.\n\
         Format your response exactly as follows:\n\
         Risk: <Level>\n\
         Reason: <Short justification summary>\n",
        name = record.name,
        id = record.id,
        version = record.version,
        author = record.author,
        description = record.description,
        permissions = record.permissions.join(", "),
        csp = record.content_security_policy,
        age = age,
        urls = preview(&record.extracted_urls, record.extracted_urls.len()),
        ips = preview(&record.extracted_ips, record.extracted_ips.len()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Vendor;

    #[test]
    fn test_parse_response_reads_risk_line() {
        let assessment = parse_response("Risk: HIGH\nReason: exfiltrates browsing history");
        assert_eq!(assessment.score, RiskScore::High);
        assert!(assessment.summary.contains("exfiltrates"));
    }

    #[test]
    fn test_parse_response_is_case_insensitive() {
        let assessment = parse_response("Some preamble\n  risk: medium \nreason: ok");
        assert_eq!(assessment.score, RiskScore::Medium);

        let assessment = parse_response("**Risk: Critical.**");
        assert_eq!(assessment.score, RiskScore::Unknown);

        let assessment = parse_response("Risk: **Critical**");
        assert_eq!(assessment.score, RiskScore::Critical);
    }

    #[test]
    fn test_parse_response_last_risk_line_wins() {
        let assessment =
            parse_response("Risk: <Level>\nReason: template echoed\nRisk: High\nReason: exfil");
        assert_eq!(assessment.score, RiskScore::High);

        let assessment = parse_response("Risk: Low\nRisk: nonsense");
        assert_eq!(assessment.score, RiskScore::Unknown);
    }

    #[test]
    fn test_parse_response_without_risk_line() {
        let assessment = parse_response("I cannot tell.");
        assert_eq!(assessment.score, RiskScore::Unknown);
        assert_eq!(assessment.summary, "I cannot tell.");
    }

    #[test]
    fn test_provider_preference() {
        let groq = LlmEndpoint::from_keys(Some("g".into()), Some("o".into())).unwrap();
        assert_eq!(groq.base_url, GROQ_BASE_URL);
        assert_eq!(groq.model, GROQ_MODEL);

        let openai = LlmEndpoint::from_keys(Some("  ".into()), Some("o".into())).unwrap();
        assert_eq!(openai.base_url, OPENAI_BASE_URL);
        assert_eq!(openai.api_key, "o");

        assert!(LlmEndpoint::from_keys(None, None).is_none());
    }

    #[tokio::test]
    async fn test_missing_key_returns_unknown() {
        let assessor = LlmAssessor::new(None, Duration::from_secs(1));
        let record = ExtensionRecord::new("a", Vendor::Chrome, "/x");

        let assessment = assessor.assess(&record).await;
        assert_eq!(assessment.score, RiskScore::Unknown);
        assert!(assessment.summary.contains("skipped"));
    }

    #[test]
    fn test_prompt_limits_indicators() {
        let mut record = ExtensionRecord::new("abc", Vendor::Chrome, "/x");
        record.permissions = vec!["tabs".into(), "cookies".into()];
        for i in 0..15 {
            record.extracted_urls.insert(format!("https://h{:02}.example.com", i));
        }

        let prompt = build_prompt(&record);
        assert!(prompt.contains("Permissions: tabs, cookies"));
        assert!(prompt.contains("(15 total)"));
        assert!(prompt.contains("https://h09.example.com"));
        assert!(!prompt.contains("https://h10.example.com"));
        assert!(prompt.contains("Extension Age (Days): Unknown"));
    }
}
