//! OpenAI-compatible chat-completions client.
//!
//! One concrete [`LlmClient`] ships with the crate: a thin `reqwest` wrapper
//! around the `/chat/completions` surface that OpenAI, LiteLLM gateways, and
//! most self-hosted inference servers expose.  Point it at a gateway with
//! [`LlmConfig::with_api_base`](crate::crewmind::llm::LlmConfig::with_api_base)
//! and it will serve provider-prefixed model ids (`anthropic/…`, `openai/…`)
//! unchanged, including the prompt-cache annotations the wire layer adds for
//! Anthropic models.
//!
//! # Example
//!
//! ```rust,no_run
//! use crewmind::crewmind::clients::openai::OpenAiCompatClient;
//! use crewmind::crewmind::llm::{LlmClient, LlmConfig, Message};
//!
//! # async {
//! let client = OpenAiCompatClient::new();
//! let config = LlmConfig::new("openai/gpt-4o")
//!     .with_api_key(std::env::var("LLM_API_KEY").unwrap_or_default())
//!     .with_api_base("http://localhost:4000/v1");
//! let reply = client
//!     .complete(&[Message::user("Say hello.")], &config)
//!     .await
//!     .unwrap();
//! println!("{}", reply);
//! # };
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::crewmind::llm::{build_wire_messages, LlmClient, LlmConfig, LlmError, Message};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// HTTP status Anthropic uses for "overloaded"; treated as retryable.
const OVERLOADED_STATUS: u16 = 529;

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
}

impl Default for OpenAiCompatClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiCompatClient {
    pub fn new() -> Self {
        OpenAiCompatClient {
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(config: &LlmConfig) -> String {
        let base = config
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/');
        format!("{}/chat/completions", base)
    }
}

/// Classify an error payload: overload signals become retryable
/// [`LlmError::Overloaded`], everything else is a provider error.
fn classify_error(status: u16, body: &str) -> LlmError {
    if status == OVERLOADED_STATUS || body.contains("overloaded_error") || body.contains("Overloaded")
    {
        LlmError::Overloaded(format!("HTTP {}: {}", status, body))
    } else {
        LlmError::Provider(format!("HTTP {}: {}", status, body))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn complete(
        &self,
        messages: &[Message],
        config: &LlmConfig,
    ) -> Result<String, LlmError> {
        let body = json!({
            "model": config.model,
            "messages": build_wire_messages(messages, &config.model),
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
        });

        let mut request = self.http.post(Self::endpoint(config)).json(&body);
        if let Some(key) = &config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(classify_error(status, &text));
        }

        let value: Value =
            serde_json::from_str(&text).map_err(|e| LlmError::Http(e.to_string()))?;

        // Some gateways report errors inside a 200 response.
        if let Some(error) = value.get("error") {
            return Err(classify_error(status, &error.to_string()));
        }

        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overload_classification() {
        assert!(matches!(
            classify_error(529, "busy"),
            LlmError::Overloaded(_)
        ));
        assert!(matches!(
            classify_error(500, "overloaded_error: try later"),
            LlmError::Overloaded(_)
        ));
        assert!(matches!(
            classify_error(400, "bad request"),
            LlmError::Provider(_)
        ));
    }

    #[test]
    fn endpoint_joins_base_cleanly() {
        let config = LlmConfig::new("openai/gpt-4o").with_api_base("http://localhost:4000/v1/");
        assert_eq!(
            OpenAiCompatClient::endpoint(&config),
            "http://localhost:4000/v1/chat/completions"
        );
    }
}
