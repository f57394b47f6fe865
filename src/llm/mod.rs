//! The LLM capability consumed by supervisors, agents, and synthesis.
//!
//! The engine only sees [`LlmClient`]: given messages, a model id, and a
//! temperature, return text (and any tool calls). A bundled
//! OpenAI-compatible transport lives in [`openai`]; tests inject scripted
//! implementations of the trait instead.

pub mod openai;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LlmError;

pub use openai::OpenAiCompatClient;

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

/// A single message in an LLM conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system", "user", or "assistant".
    pub role: String,
    /// The message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id.
    pub tool_id: String,
    /// Name of the requested tool.
    pub tool_name: String,
    /// Arguments as a JSON object.
    pub arguments: Value,
}

// ---------------------------------------------------------------------------
// LlmClient trait
// ---------------------------------------------------------------------------

/// Abstract chat-completion capability.
///
/// Implementations must be cheap to share (`Arc<dyn LlmClient>`); one client
/// may serve every supervisor, agent, and synthesis call in an execution.
#[async_trait]
pub trait LlmClient: Send + Sync + fmt::Debug {
    /// Run one chat completion and return the full text plus tool calls.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f64,
    ) -> Result<(String, Vec<ToolCall>), LlmError>;
}

// ---------------------------------------------------------------------------
// Provider factory
// ---------------------------------------------------------------------------

/// Default base URL for a known provider key.
pub fn provider_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "openai" => Some("https://api.openai.com/v1"),
        _ => None,
    }
}

/// Create a client for a provider.
///
/// Every supported provider speaks the OpenAI-compatible chat completions
/// API; unknown providers must supply `base_url`.
pub fn create_client(
    provider: &str,
    api_key: &str,
    base_url: Option<&str>,
) -> Result<Arc<dyn LlmClient>, LlmError> {
    let provider = provider.to_lowercase();
    let url = base_url
        .or_else(|| provider_base_url(&provider))
        .ok_or_else(|| LlmError::MalformedResponse(format!("unknown provider: {}", provider)))?;
    Ok(Arc::new(OpenAiCompatClient::new(api_key, url)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_provider_base_urls() {
        assert_eq!(
            provider_base_url("openrouter"),
            Some("https://openrouter.ai/api/v1")
        );
        assert_eq!(provider_base_url("openai"), Some("https://api.openai.com/v1"));
        assert_eq!(provider_base_url("somethingelse"), None);
    }

    #[test]
    fn test_factory_rejects_unknown_provider_without_url() {
        assert!(create_client("mystery", "key", None).is_err());
        assert!(create_client("mystery", "key", Some("http://localhost:8080/v1")).is_ok());
    }

    #[test]
    fn test_factory_is_case_insensitive() {
        assert!(create_client("OpenRouter", "key", None).is_ok());
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(ChatMessage::system("s").role, "system");
        assert_eq!(ChatMessage::user("u").role, "user");
        assert_eq!(ChatMessage::assistant("a").role, "assistant");
    }
}
