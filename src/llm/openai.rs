//! OpenAI-compatible chat completions transport.
//!
//! Works against any endpoint speaking the `/chat/completions` protocol:
//! OpenAI, OpenRouter, Azure, vLLM, Ollama, and friends. Retryable failures
//! (connection errors, 429, 5xx) back off exponentially; 4xx responses are
//! returned to the caller unretried.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::LlmError;
use crate::llm::{ChatMessage, LlmClient, ToolCall};

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default number of retries after the initial attempt.
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Client for OpenAI-compatible chat completion APIs.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // api_key deliberately omitted.
        f.debug_struct("OpenAiCompatClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatClient {
    /// Create a client for the given API key and base URL.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Extract text and tool calls from a chat completions response body.
    fn parse_response(body: &Value) -> Result<(String, Vec<ToolCall>), LlmError> {
        let message = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| {
                LlmError::MalformedResponse("response has no choices[0].message".to_string())
            })?;

        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();

        let tool_calls = message
            .get("tool_calls")
            .and_then(|t| t.as_array())
            .map(|calls| {
                calls
                    .iter()
                    .map(|tc| ToolCall {
                        tool_id: tc
                            .get("id")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        tool_name: tc
                            .get("function")
                            .and_then(|f| f.get("name"))
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        arguments: tc
                            .get("function")
                            .and_then(|f| f.get("arguments"))
                            .and_then(|v| v.as_str())
                            .and_then(|s| serde_json::from_str(s).ok())
                            .unwrap_or(Value::Null),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok((content, tool_calls))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f64,
    ) -> Result<(String, Vec<ToolCall>), LlmError> {
        let endpoint = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
        });

        let mut last_error = String::new();
        let mut retry_delay = Duration::from_secs(1);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                log::warn!(
                    "retrying LLM call (attempt {}) after {:?}: {}",
                    attempt,
                    retry_delay,
                    last_error
                );
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let response = match self
                .http
                .post(&endpoint)
                .timeout(self.timeout)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                last_error = format!("API returned {}", status);
                continue;
            }

            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            if status.is_client_error() {
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    body: text,
                });
            }

            let parsed: Value = serde_json::from_str(&text).map_err(|e| {
                LlmError::MalformedResponse(format!("invalid JSON from API: {}", e))
            })?;

            return Self::parse_response(&parsed);
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_text_only() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        });
        let (text, tool_calls) = OpenAiCompatClient::parse_response(&body).unwrap();
        assert_eq!(text, "hello");
        assert!(tool_calls.is_empty());
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let body = json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "function": {"name": "search", "arguments": "{\"q\": \"rust\"}"}
                }]
            }}]
        });
        let (text, tool_calls) = OpenAiCompatClient::parse_response(&body).unwrap();
        assert_eq!(text, "");
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].tool_name, "search");
        assert_eq!(tool_calls[0].arguments["q"], "rust");
    }

    #[test]
    fn test_parse_response_missing_choices() {
        let body = json!({"error": {"message": "nope"}});
        assert!(matches!(
            OpenAiCompatClient::parse_response(&body),
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = OpenAiCompatClient::new("k", "https://api.example.com/v1/");
        assert_eq!(client.base_url, "https://api.example.com/v1");
    }
}
