//! Shared primitives for provider-agnostic LLM access.
//!
//! The runtime talks to a language model exclusively through the [`LlmClient`]
//! trait: a list of role-tagged [`Message`]s goes in, the assistant's raw text
//! comes out.  Everything else in this module supports that exchange -
//! [`LlmConfig`] carries the model selection and sampling knobs,
//! [`get_llm_response`] adds jittered-exponential-backoff retries for provider
//! overload, and [`build_wire_messages`] produces the JSON-facing message
//! shape, including the opt-in Anthropic prompt-cache annotation.
//!
//! Token accounting is deliberately approximate: the runtime only needs
//! relative budgets, so messages are estimated at one token per four
//! characters, split by role into input (system + user) and output
//! (assistant) totals.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;

/// Maximum number of attempts [`get_llm_response`] makes against an
/// overloaded provider before giving up.
const MAX_RETRIES: u32 = 10;

/// Upper bound, in seconds, on a single backoff sleep.
const MAX_BACKOFF_SECS: f64 = 60.0;

/// Represents the possible roles for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A system authored message that primes or constrains assistant behaviour.
    System,
    /// A user authored message (task prompts and environment responses).
    User,
    /// An assistant authored message (model replies).
    Assistant,
}

impl Role {
    /// Wire-format name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chat message exchanged with the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The message body.
    pub content: String,
}

impl Message {
    /// Convenience constructor for a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Convenience constructor for a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Convenience constructor for an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Model selection and sampling parameters shared by every call a driver makes.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Provider-qualified model identifier (e.g. `"anthropic/claude-sonnet-4-0"`).
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap per request.
    pub max_tokens: u32,
    /// Optional API key forwarded to the client implementation.
    pub api_key: Option<String>,
    /// Optional base URL for OpenAI-compatible gateways.
    pub api_base: Option<String>,
}

impl LlmConfig {
    /// Create a config for `model` with the default temperature (0.7) and a
    /// 4096-token completion cap.
    pub fn new(model: impl Into<String>) -> Self {
        LlmConfig {
            model: model.into(),
            temperature: 0.7,
            max_tokens: 4096,
            api_key: None,
            api_base: None,
        }
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override the completion token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }
}

/// Errors surfaced by [`LlmClient`] implementations.
#[derive(Debug)]
pub enum LlmError {
    /// The provider reported itself overloaded; the request may be retried.
    Overloaded(String),
    /// The provider returned an error response.
    Provider(String),
    /// Transport-level failure (connection, TLS, serialization).
    Http(String),
    /// The provider answered but the reply carried no assistant content.
    EmptyResponse,
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Overloaded(msg) => write!(f, "provider overloaded: {}", msg),
            LlmError::Provider(msg) => write!(f, "provider error: {}", msg),
            LlmError::Http(msg) => write!(f, "http error: {}", msg),
            LlmError::EmptyResponse => write!(f, "provider returned no content"),
        }
    }
}

impl Error for LlmError {}

/// Trait-driven abstraction over a concrete LLM transport.
///
/// Implementations translate the message list into the provider wire format
/// and return the assistant's raw text.  They **must** be thread-safe
/// (`Send + Sync`) so a single client can be shared between the orchestrator
/// and every subagent it spawns.  Implementations should map provider
/// "overloaded" signals to [`LlmError::Overloaded`] so that
/// [`get_llm_response`] can retry them.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a full request/response chat completion.
    async fn complete(&self, messages: &[Message], config: &LlmConfig)
        -> Result<String, LlmError>;
}

/// Call the client with retry on provider overload.
///
/// Backoff for attempt `n` (zero-based) is `2^n` seconds plus up to 10%
/// uniform jitter, capped at 60 seconds.  Any error other than
/// [`LlmError::Overloaded`] propagates unchanged, as does the overload error
/// once the retry budget is exhausted.
pub async fn get_llm_response(
    client: &dyn LlmClient,
    messages: &[Message],
    config: &LlmConfig,
) -> Result<String, LlmError> {
    let mut attempt = 0u32;
    loop {
        match client.complete(messages, config).await {
            Ok(content) => return Ok(content),
            Err(LlmError::Overloaded(msg)) if attempt + 1 < MAX_RETRIES => {
                let base = 2f64.powi(attempt as i32);
                let jitter = rand::thread_rng().gen::<f64>() * base * 0.1;
                let delay = (base + jitter).min(MAX_BACKOFF_SECS);
                log::warn!(
                    "Provider overloaded ({}), retrying in {:.2}s (attempt {}/{})",
                    msg,
                    delay,
                    attempt + 1,
                    MAX_RETRIES
                );
                tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Cache-control marker attached to annotated content parts.
#[derive(Debug, Clone, Serialize)]
pub struct CacheControl {
    /// Cache lifetime class; always `"ephemeral"`.
    #[serde(rename = "type")]
    pub control_type: &'static str,
}

/// One element of a structured content list.
#[derive(Debug, Clone, Serialize)]
pub struct ContentPart {
    /// Part discriminator; always `"text"`.
    #[serde(rename = "type")]
    pub part_type: &'static str,
    /// The text body.
    pub text: String,
    /// Present only on cache-annotated parts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

/// Message content as it appears on the wire: either a bare string or a list
/// of content parts (the shape required for cache annotations).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A message in the JSON shape providers expect.
#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: WireContent,
}

/// Convert messages to their wire shape, applying the Anthropic prompt-cache
/// annotation when the model identifier asks for it.
///
/// For models whose identifier contains `"anthropic/"`, the system message and
/// the last two user messages are promoted to a one-element content-part list
/// tagged `cache_control: {"type": "ephemeral"}`.  All other messages (and all
/// messages for every other provider) stay plain strings.  This is the only
/// place the cache hint exists; parsing and action handling never see it.
pub fn build_wire_messages(messages: &[Message], model: &str) -> Vec<WireMessage> {
    let annotate = model.contains("anthropic/");

    // Indices eligible for annotation: the system message plus the last two
    // user messages.
    let mut annotated: Vec<usize> = Vec::new();
    if annotate {
        let user_indices: Vec<usize> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == Role::User)
            .map(|(i, _)| i)
            .collect();
        if let Some(idx) = messages.iter().position(|m| m.role == Role::System) {
            annotated.push(idx);
        }
        annotated.extend(user_indices.iter().rev().take(2));
    }

    messages
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let content = if annotated.contains(&i) {
                WireContent::Parts(vec![ContentPart {
                    part_type: "text",
                    text: m.content.clone(),
                    cache_control: Some(CacheControl {
                        control_type: "ephemeral",
                    }),
                }])
            } else {
                WireContent::Text(m.content.clone())
            };
            WireMessage {
                role: m.role.as_str(),
                content,
            }
        })
        .collect()
}

/// Estimate the token count of a message list at ~4 characters per token.
fn estimate_tokens(messages: &[&Message]) -> usize {
    let total_chars: usize = messages.iter().map(|m| m.content.len()).sum();
    total_chars / 4
}

/// Estimated input-side tokens: system and user messages.
pub fn count_input_tokens(messages: &[Message]) -> usize {
    let input: Vec<&Message> = messages
        .iter()
        .filter(|m| m.role == Role::System || m.role == Role::User)
        .collect();
    estimate_tokens(&input)
}

/// Estimated output-side tokens: assistant messages.
pub fn count_output_tokens(messages: &[Message]) -> usize {
    let output: Vec<&Message> = messages.iter().filter(|m| m.role == Role::Assistant).collect();
    estimate_tokens(&output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_messages() -> Vec<Message> {
        vec![
            Message::system("sys"),
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
            Message::user("third"),
        ]
    }

    #[test]
    fn cache_annotation_only_for_anthropic_models() {
        let wire = build_wire_messages(&sample_messages(), "openai/gpt-4o");
        assert!(wire
            .iter()
            .all(|m| matches!(m.content, WireContent::Text(_))));
    }

    #[test]
    fn cache_annotation_targets_system_and_last_two_user_messages() {
        let wire = build_wire_messages(&sample_messages(), "anthropic/claude-sonnet-4-0");
        let annotated: Vec<usize> = wire
            .iter()
            .enumerate()
            .filter(|(_, m)| matches!(m.content, WireContent::Parts(_)))
            .map(|(i, _)| i)
            .collect();
        // system (0), plus user messages at 3 and 4; user at 1 stays plain.
        assert_eq!(annotated, vec![0, 3, 4]);
        if let WireContent::Parts(parts) = &wire[0].content {
            assert_eq!(parts.len(), 1);
            assert_eq!(parts[0].text, "sys");
            assert!(parts[0].cache_control.is_some());
        } else {
            panic!("system message should be a part list");
        }
    }

    #[test]
    fn token_estimates_split_by_role() {
        let messages = vec![
            Message::system("abcd"),     // 1 token
            Message::user("abcdefgh"),   // 2 tokens
            Message::assistant("abcd"),  // 1 token
        ];
        assert_eq!(count_input_tokens(&messages), 3);
        assert_eq!(count_output_tokens(&messages), 1);
    }
}
