// Anthropic LLM Provider Adapter
//
// Anti-Corruption Layer for the Anthropic Claude API.

use crate::domain::llm::{
    ChatProvider, Completion, LLMError, Message, OutputFormat, Provider, Role, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const ENDPOINT: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Fixed output cap applied to every call.
const MAX_TOKENS: u32 = 4096;

pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicAdapter {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }

    /// Split the conversation into Anthropic's shape.
    ///
    /// The first system turn becomes the top-level `system` parameter;
    /// system turns never appear in the message list. Everything else
    /// passes through with role and content preserved.
    fn build_request(model: &str, messages: &[Message]) -> AnthropicRequest {
        let mut system = None;
        let mut wire = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {
                    if system.is_none() {
                        system = Some(msg.content.to_text());
                    }
                }
                Role::User | Role::Assistant => wire.push(AnthropicMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.to_text(),
                }),
            }
        }

        AnthropicRequest {
            model: model.to_string(),
            messages: wire,
            max_tokens: MAX_TOKENS,
            system,
        }
    }
}

#[async_trait]
impl ChatProvider for AnthropicAdapter {
    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        _format: OutputFormat,
    ) -> Result<Completion, LLMError> {
        // Anthropic has no JSON response mode; the format hint is ignored.
        let request = Self::build_request(model, messages);

        let response = self
            .client
            .post(format!("{}/v1/messages", ENDPOINT))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 401 || status == 403 {
                LLMError::Authentication(error_text)
            } else if status == 429 {
                LLMError::RateLimit
            } else if status == 404 {
                LLMError::ModelNotFound(model.to_string())
            } else {
                LLMError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        let text = anthropic_response
            .content
            .first()
            .map(|c| c.text.clone())
            .unwrap_or_default();

        let total = anthropic_response.usage.input_tokens + anthropic_response.usage.output_tokens;

        Ok(Completion {
            text,
            usage: TokenUsage {
                prompt_tokens: anthropic_response.usage.input_tokens,
                completion_tokens: anthropic_response.usage.output_tokens,
                total_tokens: total,
            },
            provider: Provider::Anthropic,
            model: model.to_string(),
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        // Anthropic doesn't have a models list endpoint, so we check auth
        // with a GET against the messages endpoint. 404/405 still mean the
        // key was accepted.
        let response = self
            .client
            .get(format!("{}/v1/messages", ENDPOINT))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success()
            || response.status() == 404
            || response.status() == 405
        {
            Ok(())
        } else if response.status() == 401 || response.status() == 403 {
            Err(LLMError::Authentication("Invalid API key".into()))
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }
}
