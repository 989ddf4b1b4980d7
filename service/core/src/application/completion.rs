// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Completion service
//!
//! Orchestrates provider dispatch: normalizes message content, runs the
//! backend call, and wraps the json-mode multi-turn variant in a bounded
//! rate-limit retry loop.

use crate::domain::llm::{
    ChatProvider, Completion, LLMError, Message, MessageContent, OutputFormat,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Model used by the json-mode multi-turn retry path.
const JSON_MODE_MODEL: &str = "gpt-4o";

/// Bounded retry parameters for rate-limit failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Application service running chat completions against any [`ChatProvider`].
pub struct CompletionService {
    backend: Arc<dyn ChatProvider>,
    retry: RetryPolicy,
}

impl CompletionService {
    pub fn new(backend: Arc<dyn ChatProvider>) -> Self {
        Self {
            backend,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(backend: Arc<dyn ChatProvider>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// Run one completion for the given model.
    ///
    /// Structured message content is serialized to text before the backend
    /// sees it; the caller records usage from the returned completion.
    pub async fn generate(
        &self,
        model: &str,
        messages: &[Message],
        format: OutputFormat,
    ) -> Result<Completion, LLMError> {
        let messages = normalize_content(messages);
        debug!("Dispatching completion for model {}", model);
        self.backend.complete(model, &messages, format).await
    }

    /// Json-mode multi-turn variant with bounded retry.
    ///
    /// Retries only on rate-limit failures, sleeping before each retry and
    /// doubling the delay after every failure. Any other error propagates
    /// immediately; exhaustion is reported as
    /// [`LLMError::RetriesExhausted`].
    pub async fn generate_json_with_retry(
        &self,
        messages: &[Message],
    ) -> Result<Completion, LLMError> {
        let messages = normalize_content(messages);
        let mut delay = self.retry.base_delay;

        for attempt in 1..=self.retry.max_attempts {
            match self
                .backend
                .complete(JSON_MODE_MODEL, &messages, OutputFormat::Json)
                .await
            {
                Ok(completion) => return Ok(completion),
                Err(LLMError::RateLimit) => {
                    warn!(
                        attempt,
                        "Rate limit exceeded. Retrying in {} seconds...",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }

        warn!("Failed to process due to rate limit");
        Err(LLMError::RetriesExhausted {
            attempts: self.retry.max_attempts,
        })
    }
}

/// Serialize structured message payloads to text, leaving text untouched.
fn normalize_content(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .map(|msg| Message {
            role: msg.role,
            content: match &msg.content {
                MessageContent::Structured(v) => MessageContent::Text(v.to_string()),
                text @ MessageContent::Text(_) => text.clone(),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{Provider, Role, TokenUsage};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Backend that replays a scripted sequence of outcomes.
    struct ScriptedBackend {
        attempts: AtomicU32,
        script: Mutex<Vec<Result<Completion, LLMError>>>,
        seen_messages: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<Completion, LLMError>>) -> Self {
            Self {
                attempts: AtomicU32::new(0),
                script: Mutex::new(script),
                seen_messages: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedBackend {
        async fn complete(
            &self,
            model: &str,
            messages: &[Message],
            _format: OutputFormat,
        ) -> Result<Completion, LLMError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.seen_messages.lock().unwrap().push(messages.to_vec());
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Err(LLMError::RateLimit);
            }
            script.remove(0).map(|mut c| {
                c.model = model.to_string();
                c
            })
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    fn completion(text: &str) -> Completion {
        Completion {
            text: text.to_string(),
            usage: TokenUsage::default(),
            provider: Provider::OpenAI,
            model: "gpt-4o".to_string(),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retry_exhausts_after_exactly_five_attempts() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let service = CompletionService::with_retry_policy(backend.clone(), fast_retry());

        let err = service
            .generate_json_with_retry(&[Message::user("hi")])
            .await
            .unwrap_err();

        assert!(matches!(err, LLMError::RetriesExhausted { attempts: 5 }));
        assert_eq!(backend.attempts(), 5);
    }

    #[tokio::test]
    async fn retry_stops_on_first_success() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(LLMError::RateLimit),
            Err(LLMError::RateLimit),
            Ok(completion("third time lucky")),
        ]));
        let service = CompletionService::with_retry_policy(backend.clone(), fast_retry());

        let result = service
            .generate_json_with_retry(&[Message::user("hi")])
            .await
            .unwrap();

        assert_eq!(result.text, "third time lucky");
        assert_eq!(backend.attempts(), 3);
    }

    #[tokio::test]
    async fn non_rate_limit_errors_propagate_without_retry() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(LLMError::Authentication(
            "bad key".into(),
        ))]));
        let service = CompletionService::with_retry_policy(backend.clone(), fast_retry());

        let err = service
            .generate_json_with_retry(&[Message::user("hi")])
            .await
            .unwrap_err();

        assert!(matches!(err, LLMError::Authentication(_)));
        assert_eq!(backend.attempts(), 1);
    }

    #[tokio::test]
    async fn generate_serializes_structured_content() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(completion("ok"))]));
        let service = CompletionService::new(backend.clone());

        let messages = vec![Message {
            role: Role::User,
            content: MessageContent::Structured(json!({"step": 1})),
        }];
        service
            .generate("gpt-4o", &messages, OutputFormat::Text)
            .await
            .unwrap();

        let seen = backend.seen_messages.lock().unwrap();
        assert_eq!(seen[0][0].content, MessageContent::Text(r#"{"step":1}"#.into()));
    }
}
