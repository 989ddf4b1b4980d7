// OpenAI LLM Provider Adapter
//
// Anti-Corruption Layer for the OpenAI chat completions API.
// Also works with OpenAI-compatible APIs (LM Studio, vLLM, etc.)

use crate::domain::llm::{
    ChatProvider, Completion, LLMError, Message, OutputFormat, Provider, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

pub struct OpenAIAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: OpenAIUsage,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAIAdapter {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    // Messages pass through unchanged: the domain shape is already the
    // OpenAI shape.
    fn build_request(model: &str, messages: &[Message], format: OutputFormat) -> OpenAIRequest {
        OpenAIRequest {
            model: model.to_string(),
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.to_text(),
                })
                .collect(),
            response_format: match format {
                OutputFormat::Json => Some(ResponseFormat { kind: "json_object" }),
                OutputFormat::Text => None,
            },
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAIAdapter {
    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        format: OutputFormat,
    ) -> Result<Completion, LLMError> {
        let request = Self::build_request(model, messages, format);

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Provider("No response from model".into()))?;

        Ok(Completion {
            text: choice.message.content,
            usage: TokenUsage {
                prompt_tokens: openai_response.usage.prompt_tokens,
                completion_tokens: openai_response.usage.completion_tokens,
                total_tokens: openai_response.usage.total_tokens,
            },
            provider: Provider::OpenAI,
            model: model.to_string(),
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        // Simple check - try to list models endpoint
        let url = format!("{}/models", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else if response.status() == 401 || response.status() == 403 {
            Err(LLMError::Authentication("Invalid API key".into()))
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }
}
