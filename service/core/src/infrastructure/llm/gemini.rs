// Gemini LLM Provider Adapter
//
// Anti-Corruption Layer for the Google Generative Language API.

use crate::domain::llm::{
    ChatProvider, Completion, LLMError, Message, OutputFormat, Provider, Role, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
    #[serde(rename = "totalTokenCount", default)]
    total_token_count: u32,
}

impl GeminiAdapter {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// Translate the conversation into Gemini's `contents` shape.
    ///
    /// Gemini has no system role: system turns are dropped from the
    /// sequence and the first one's content is folded onto the first user
    /// turn as `"System: ...\n\nUser: ..."`. The assistant role renames to
    /// `model` and every payload wraps in a single-element `parts` list.
    fn to_contents(messages: &[Message]) -> Vec<GeminiContent> {
        let mut contents = Vec::new();
        for msg in messages {
            let role = match msg.role {
                Role::System => continue,
                Role::User => "user",
                Role::Assistant => "model",
            };
            contents.push(GeminiContent {
                role: role.to_string(),
                parts: vec![GeminiPart {
                    text: msg.content.to_text(),
                }],
            });
        }

        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.to_text());

        if let Some(system) = system {
            if let Some(first) = contents.first_mut() {
                if first.role == "user" {
                    let user = std::mem::take(&mut first.parts[0].text);
                    first.parts[0].text = format!("System: {}\n\nUser: {}", system, user);
                }
            }
        }

        contents
    }
}

#[async_trait]
impl ChatProvider for GeminiAdapter {
    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        format: OutputFormat,
    ) -> Result<Completion, LLMError> {
        let request = GeminiRequest {
            contents: Self::to_contents(messages),
            generation_config: match format {
                OutputFormat::Json => Some(GenerationConfig {
                    response_mime_type: "application/json",
                }),
                OutputFormat::Text => None,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
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

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Provider("No response from model".into()))?;

        let text = candidate
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        let usage = gemini_response.usage_metadata.unwrap_or(UsageMetadata {
            prompt_token_count: 0,
            candidates_token_count: 0,
            total_token_count: 0,
        });

        Ok(Completion {
            text,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            },
            provider: Provider::Gemini,
            model: model.to_string(),
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        // Listing models validates both reachability and the API key.
        let url = format!("{}/v1beta/models", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn system_content_folds_onto_first_user_turn() {
        let messages = vec![
            Message::system("Answer in French."),
            Message::user("What is the capital of France?"),
        ];
        let contents = GeminiAdapter::to_contents(&messages);

        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[0].parts.len(), 1);
        assert_eq!(
            contents[0].parts[0].text,
            "System: Answer in French.\n\nUser: What is the capital of France?"
        );
    }

    #[test]
    fn assistant_role_renames_to_model() {
        let messages = vec![Message::user("hi"), Message::assistant("hello")];
        let contents = GeminiAdapter::to_contents(&messages);

        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[1].role, "model");
        assert_eq!(contents[1].parts[0].text, "hello");
    }

    #[test]
    fn system_is_not_folded_when_first_turn_is_model() {
        let messages = vec![
            Message::system("sys"),
            Message::assistant("earlier answer"),
            Message::user("next"),
        ];
        let contents = GeminiAdapter::to_contents(&messages);

        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role, "model");
        assert_eq!(contents[1].parts[0].text, "next");
    }

    #[tokio::test]
    async fn complete_concatenates_candidate_parts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "candidates": [{"content": {"role": "model", "parts": [
                        {"text": "Par"}, {"text": "is"}
                    ]}}],
                    "usageMetadata": {
                        "promptTokenCount": 12,
                        "candidatesTokenCount": 3,
                        "totalTokenCount": 15
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = GeminiAdapter::new(reqwest::Client::new(), server.url(), "test-key");
        let completion = adapter
            .complete("gemini-1.5-pro", &[Message::user("capital?")], OutputFormat::Text)
            .await
            .unwrap();

        assert_eq!(completion.text, "Paris");
        assert_eq!(completion.provider, Provider::Gemini);
        assert_eq!(completion.usage.prompt_tokens, 12);
    }

    #[tokio::test]
    async fn complete_maps_429_to_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent")
            .with_status(429)
            .create_async()
            .await;

        let adapter = GeminiAdapter::new(reqwest::Client::new(), server.url(), "test-key");
        let err = adapter
            .complete("gemini-1.5-pro", &[Message::user("hi")], OutputFormat::Text)
            .await
            .unwrap_err();

        assert!(matches!(err, LLMError::RateLimit));
    }
}
