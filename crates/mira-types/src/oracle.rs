use async_trait::async_trait;
use thiserror::Error;

/// A single call to a language model: fixed prompt in, raw text out.
///
/// Both the AI Validator (§4.3) and the Learning Extractor (§4.6) are
/// written against this trait rather than any concrete HTTP provider, so a
/// deterministic fake can stand in during tests.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub prompt: String,
    /// Fixed at 0.0 everywhere this trait is called; kept explicit so a
    /// future caller cannot silently introduce nondeterminism.
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl OracleRequest {
    pub fn deterministic(prompt: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.0,
            max_output_tokens,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OracleResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("oracle transport error: {0}")]
    Transport(String),
    #[error("oracle returned a malformed response: {0}")]
    MalformedResponse(String),
    #[error("oracle rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait LlmOracle: Send + Sync {
    async fn complete(&self, request: OracleRequest) -> Result<OracleResponse, OracleError>;
}
