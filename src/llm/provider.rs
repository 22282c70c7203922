use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct CompletionOptions {
    /// Sampling temperature (0.0 = deterministic).
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Bound on a single request, so a stuck call cannot stall its caller.
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: Some(50),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty response")]
    EmptyResponse,

    #[error("Rate limited")]
    RateLimited,

    #[error("Request timeout")]
    Timeout,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            LlmError::Connection(err.to_string())
        }
    }
}

/// A text-generation backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider name, e.g. "ollama" or "groq".
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Sends a single prompt and returns the generated text as-is.
    ///
    /// An empty or whitespace-only completion is returned as
    /// [`LlmError::EmptyResponse`].
    async fn generate(&self, prompt: &str, options: &CompletionOptions)
        -> Result<String, LlmError>;

    async fn health_check(&self) -> Result<(), LlmError>;
}

/// Maps a non-success HTTP status to an error, keeping the body for context.
pub(crate) async fn error_for_status(response: reqwest::Response) -> LlmError {
    let status = response.status();
    if status.as_u16() == 429 {
        return LlmError::RateLimited;
    }
    let body = response.text().await.unwrap_or_default();
    LlmError::Api {
        status: status.as_u16(),
        message: body,
    }
}

pub(crate) fn non_empty(text: String) -> Result<String, LlmError> {
    if text.trim().is_empty() {
        Err(LlmError::EmptyResponse)
    } else {
        Ok(text)
    }
}
