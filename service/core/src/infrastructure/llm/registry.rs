// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry - Credential Resolution and Provider Dispatch
//
// Holds one adapter per configured backend and routes each call to the
// adapter selected by Provider::classify. A call for a backend whose
// credential is absent fails with a configuration error before any network
// attempt.

use crate::domain::llm::{
    ChatProvider, Completion, LLMError, Message, OutputFormat, Provider,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{info, warn};

use super::anthropic::AnthropicAdapter;
use super::gemini::{self, GeminiAdapter};
use super::openai::{self, OpenAIAdapter};

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

/// Environment variables that must be present before the service starts.
pub const REQUIRED_KEYS: [&str; 3] = [OPENAI_API_KEY, GEMINI_API_KEY, ANTHROPIC_API_KEY];

/// Backend credentials, usually resolved from the process environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openai: Option<String>,
    pub gemini: Option<String>,
    pub anthropic: Option<String>,

    /// Override for OpenAI-compatible endpoints (LM Studio, vLLM, proxies).
    pub openai_endpoint: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            openai: env_key(OPENAI_API_KEY),
            gemini: env_key(GEMINI_API_KEY),
            anthropic: env_key(ANTHROPIC_API_KEY),
            openai_endpoint: env_key("OPENAI_BASE_URL"),
        }
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn missing_key(key_var: &str) -> LLMError {
    LLMError::Configuration(format!("{} not set. Did you set it in the .env file?", key_var))
}

/// Registry routing completions to the backend chosen from the model name.
pub struct ProviderRegistry {
    openai: Option<OpenAIAdapter>,
    gemini: Option<GeminiAdapter>,
    anthropic: Option<AnthropicAdapter>,
}

impl ProviderRegistry {
    pub fn from_env() -> Self {
        Self::new(Credentials::from_env())
    }

    pub fn new(credentials: Credentials) -> Self {
        // One HTTP client shared across adapters.
        let client = reqwest::Client::new();

        let openai_endpoint = credentials
            .openai_endpoint
            .unwrap_or_else(|| openai::DEFAULT_ENDPOINT.to_string());

        let openai = credentials.openai.map(|key| {
            info!("Initializing provider: openai ({})", openai_endpoint);
            OpenAIAdapter::new(client.clone(), openai_endpoint.clone(), key)
        });
        let gemini = credentials.gemini.map(|key| {
            info!("Initializing provider: gemini");
            GeminiAdapter::new(client.clone(), gemini::DEFAULT_ENDPOINT, key)
        });
        let anthropic = credentials.anthropic.map(|key| {
            info!("Initializing provider: anthropic");
            AnthropicAdapter::new(client.clone(), key)
        });

        let registry = Self {
            openai,
            gemini,
            anthropic,
        };

        if registry.available_providers().is_empty() {
            warn!("No LLM credentials configured - completions will not be available");
        }

        registry
    }

    pub fn available_providers(&self) -> Vec<Provider> {
        let mut providers = Vec::new();
        if self.openai.is_some() {
            providers.push(Provider::OpenAI);
        }
        if self.gemini.is_some() {
            providers.push(Provider::Gemini);
        }
        if self.anthropic.is_some() {
            providers.push(Provider::Anthropic);
        }
        providers
    }

    pub fn has_provider(&self, provider: Provider) -> bool {
        self.available_providers().contains(&provider)
    }

    fn backend(&self, provider: Provider) -> Result<&dyn ChatProvider, LLMError> {
        match provider {
            Provider::OpenAI => match &self.openai {
                Some(adapter) => Ok(adapter),
                None => Err(missing_key(OPENAI_API_KEY)),
            },
            Provider::Gemini => match &self.gemini {
                Some(adapter) => Ok(adapter),
                None => Err(missing_key(GEMINI_API_KEY)),
            },
            Provider::Anthropic => match &self.anthropic {
                Some(adapter) => Ok(adapter),
                None => Err(missing_key(ANTHROPIC_API_KEY)),
            },
        }
    }

    /// Check health of all configured providers.
    pub async fn health_check_all(&self) -> HashMap<Provider, Result<(), LLMError>> {
        let mut results = HashMap::new();

        for provider in self.available_providers() {
            info!("Health checking provider: {}", provider);
            let result = match self.backend(provider) {
                Ok(backend) => backend.health_check().await,
                Err(e) => Err(e),
            };
            results.insert(provider, result);
        }

        results
    }
}

#[async_trait]
impl ChatProvider for ProviderRegistry {
    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        format: OutputFormat,
    ) -> Result<Completion, LLMError> {
        let provider = Provider::classify(model)?;
        self.backend(provider)?.complete(model, messages, format).await
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        for (provider, result) in self.health_check_all().await {
            if let Err(e) = result {
                warn!("Provider {} unhealthy: {}", provider, e);
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai_only() -> ProviderRegistry {
        ProviderRegistry::new(Credentials {
            openai: Some("sk-test".into()),
            ..Default::default()
        })
    }

    #[test]
    fn registry_tracks_configured_providers() {
        let registry = openai_only();
        assert!(registry.has_provider(Provider::OpenAI));
        assert!(!registry.has_provider(Provider::Gemini));
        assert_eq!(registry.available_providers(), vec![Provider::OpenAI]);
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_network_attempt() {
        let registry = openai_only();
        let err = registry
            .complete(
                "claude-3-5-sonnet-20241022",
                &[Message::user("hi")],
                OutputFormat::Text,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LLMError::Configuration(msg) if msg.contains("ANTHROPIC_API_KEY")));
    }

    #[tokio::test]
    async fn unknown_model_is_rejected_at_dispatch() {
        let registry = openai_only();
        let err = registry
            .complete("mistral-large", &[Message::user("hi")], OutputFormat::Text)
            .await
            .unwrap_err();

        assert!(matches!(err, LLMError::UnsupportedModel(_)));
    }
}
