//! Error types for the LLM transport layer.
//!
//! The engine itself converts LLM failures into data (`failed` results or
//! fallback decisions); these errors only cross API boundaries inside the
//! transport and the provider factory.

use thiserror::Error;

/// Errors raised by an LLM transport implementation.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The HTTP request could not be sent or the connection failed.
    #[error("LLM transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider returned a non-retryable error status.
    #[error("LLM API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The response body did not have the expected completion shape.
    #[error("malformed LLM response: {0}")]
    MalformedResponse(String),

    /// No API key was available for the requested provider.
    #[error("API key required for provider: {0}")]
    MissingApiKey(String),

    /// Retryable failures (429, 5xx, transport) exhausted every attempt.
    #[error("LLM call failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}
