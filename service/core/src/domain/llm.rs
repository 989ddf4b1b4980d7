// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Domain Interface (Anti-Corruption Layer)
//
// Defines the provider-agnostic chat types and the interface every backend
// adapter implements. Prevents vendor lock-in by abstracting external LLM
// APIs; implementations live in infrastructure/llm/.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One turn in a conversation.
///
/// Sequence order is conversation order; nothing deduplicates turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }
}

/// Conversation role tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Message payload: plain text or structured data.
///
/// Structured payloads are serialized to a JSON string before any backend
/// sees them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Structured(serde_json::Value),
}

impl MessageContent {
    /// Wire text for this payload. Structured content renders as compact JSON.
    pub fn to_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Structured(v) => v.to_string(),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, MessageContent::Structured(_))
    }
}

/// Closed set of supported backends, chosen from the model name by
/// [`Provider::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Gemini,
    Anthropic,
}

impl Provider {
    /// Classify a model name into a provider.
    ///
    /// Keyword tests run in a fixed order: "gpt", then "gemini", then
    /// "claude". A name containing more than one keyword resolves to the
    /// earliest match; names containing none are rejected.
    pub fn classify(model: &str) -> Result<Self, LLMError> {
        if model.contains("gpt") {
            Ok(Provider::OpenAI)
        } else if model.contains("gemini") {
            Ok(Provider::Gemini)
        } else if model.contains("claude") {
            Ok(Provider::Anthropic)
        } else {
            Err(LLMError::UnsupportedModel(model.to_string()))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Gemini => "gemini",
            Provider::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested response encoding.
///
/// `Json` maps onto each backend's JSON mode where one exists; Anthropic
/// has no equivalent and ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Token usage stats for a single completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Provider response translated back into domain terms.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated text
    pub text: String,

    /// Token usage stats
    pub usage: TokenUsage,

    /// Backend that produced the text
    pub provider: Provider,

    /// Model used (e.g., "gpt-4o", "claude-3-5-sonnet-20241022")
    pub model: String,
}

/// Domain interface for chat backends.
/// Anti-Corruption Layer that isolates business logic from vendor APIs.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one chat completion and return the extracted text plus usage.
    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        format: OutputFormat,
    ) -> Result<Completion, LLMError>;

    /// Check that the backend is reachable and credentials are accepted.
    async fn health_check(&self) -> Result<(), LLMError>;
}

/// Errors that can occur during LLM operations.
///
/// Configuration, provider-side, and retry-exhaustion failures are distinct
/// variants so callers never have to infer the cause from a sentinel value.
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Missing configuration: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("Retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_selects_openai_for_gpt_models() {
        assert_eq!(Provider::classify("gpt-4o").unwrap(), Provider::OpenAI);
        assert_eq!(Provider::classify("gpt-4o-mini").unwrap(), Provider::OpenAI);
    }

    #[test]
    fn classify_selects_gemini_and_anthropic() {
        assert_eq!(Provider::classify("gemini-1.5-pro").unwrap(), Provider::Gemini);
        assert_eq!(
            Provider::classify("claude-3-5-sonnet-20241022").unwrap(),
            Provider::Anthropic
        );
    }

    #[test]
    fn classify_rejects_unknown_models() {
        let err = Provider::classify("llama3.2").unwrap_err();
        assert!(matches!(err, LLMError::UnsupportedModel(m) if m == "llama3.2"));
    }

    #[test]
    fn classify_resolves_multi_keyword_names_in_fixed_order() {
        // Keyword order is gpt > gemini > claude.
        assert_eq!(Provider::classify("gpt-gemini-hybrid").unwrap(), Provider::OpenAI);
        assert_eq!(Provider::classify("gemini-claude-blend").unwrap(), Provider::Gemini);
    }

    #[test]
    fn classify_is_case_sensitive() {
        assert!(Provider::classify("GPT-4o").is_err());
    }

    #[test]
    fn structured_content_renders_as_compact_json() {
        let content = MessageContent::Structured(json!({"plan": ["a", "b"]}));
        assert_eq!(content.to_text(), r#"{"plan":["a","b"]}"#);
    }

    #[test]
    fn message_deserializes_structured_content() {
        let msg: Message =
            serde_json::from_value(json!({"role": "user", "content": {"task": 1}})).unwrap();
        assert_eq!(msg.role, Role::User);
        assert!(msg.content.is_structured());
    }
}
