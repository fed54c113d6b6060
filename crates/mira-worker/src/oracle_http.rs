//! Default `reqwest`-based `LlmOracle` wiring for the worker binary
//! (spec.md §6: "the default binary wiring is a `reqwest`-based HTTP
//! client ... behind a feature flag"). Gated on the `http-oracle` feature
//! so the library itself stays oracle-agnostic.

use std::time::Duration;

use async_trait::async_trait;
use mira_types::{LlmOracle, OracleError, OracleRequest, OracleResponse};
use serde::Deserialize;
use serde_json::json;

const GENERATE_CONTENT_PATH: &str = "generateContent";

/// Thin client over Gemini's `generateContent` REST endpoint, matching the
/// model names `mira-budget`'s `PricingTable` already prices (`gemini-3-pro`,
/// `gemini-3-pro-large-context`).
pub struct HttpOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpOracle {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client configuration is static and always valid"),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_env() -> Result<Self, String> {
        let api_key = std::env::var("MIRA_ORACLE_API_KEY").map_err(|_| "MIRA_ORACLE_API_KEY is not set".to_string())?;
        let base_url = std::env::var("MIRA_ORACLE_BASE_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta/models".to_string());
        let model = std::env::var("MIRA_ORACLE_MODEL").unwrap_or_else(|_| "gemini-3-pro".to_string());
        Ok(Self::new(base_url, api_key, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: u32,
}

#[async_trait]
impl LlmOracle for HttpOracle {
    async fn complete(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        let url = format!("{}/{}:{}", self.base_url, self.model, GENERATE_CONTENT_PATH);

        let body = json!({
            "contents": [{ "parts": [{ "text": request.prompt }] }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens,
            },
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::Rejected("rate limited".to_string()));
        }
        if !response.status().is_success() {
            return Err(OracleError::Transport(format!("oracle returned status {}", response.status())));
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| OracleError::MalformedResponse("no candidates in oracle response".to_string()))?;

        let (input_tokens, output_tokens) = parsed
            .usage
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((0, 0));

        Ok(OracleResponse { text, input_tokens, output_tokens })
    }
}
