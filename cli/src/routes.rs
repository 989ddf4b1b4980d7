// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application routes served alongside the liveness endpoint.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use coxswain_core::domain::llm::{LLMError, Message, OutputFormat};
use coxswain_core::presentation::AppState;

pub fn app_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat_completion", post(chat_completion_handler))
        .route("/chat_completion_json", post(chat_completion_json_handler))
        .route("/usage", get(usage_handler))
}

#[derive(Deserialize)]
struct ChatCompletionRequest {
    messages: Vec<Message>,
    #[serde(default = "default_model")]
    model: String,
    #[serde(default)]
    output_type: OutputType,
}

#[derive(Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum OutputType {
    #[default]
    Text,
    Json,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

async fn chat_completion_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatCompletionRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    if let Err(response) = authorize(&headers, &state.api_key) {
        return response;
    }

    let format = match request.output_type {
        OutputType::Json => OutputFormat::Json,
        OutputType::Text => OutputFormat::Text,
    };

    let result = state
        .completions
        .generate(&request.model, &request.messages, format)
        .await;

    respond(&state, result)
}

/// Json-mode multi-turn variant: fixed model, bounded rate-limit retry.
async fn chat_completion_json_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatCompletionRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    if let Err(response) = authorize(&headers, &state.api_key) {
        return response;
    }

    let result = state
        .completions
        .generate_json_with_retry(&request.messages)
        .await;

    respond(&state, result)
}

async fn usage_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let ledger = state.usage.lock().expect("usage ledger lock poisoned");
    Json(json!({ "tokens_used": ledger.totals() }))
}

fn respond(
    state: &AppState,
    result: Result<coxswain_core::domain::llm::Completion, LLMError>,
) -> (StatusCode, Json<serde_json::Value>) {
    match result {
        Ok(completion) => {
            {
                let mut ledger = state.usage.lock().expect("usage ledger lock poisoned");
                ledger.record_completion(&completion);
            }
            (
                StatusCode::OK,
                Json(json!({
                    "content": completion.text,
                    "model": completion.model,
                    "provider": completion.provider,
                    "usage": completion.usage,
                })),
            )
        }
        Err(e) => {
            error!("Completion failed: {}", e);
            (status_for(&e), Json(json!({ "error": e.to_string() })))
        }
    }
}

fn authorize(
    headers: &HeaderMap,
    api_key: &str,
) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if bearer == Some(api_key) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid or missing API key" })),
        ))
    }
}

fn status_for(error: &LLMError) -> StatusCode {
    match error {
        LLMError::UnsupportedModel(_) => StatusCode::BAD_REQUEST,
        LLMError::ModelNotFound(_) => StatusCode::NOT_FOUND,
        LLMError::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        LLMError::RetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        LLMError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        LLMError::Authentication(_) | LLMError::Network(_) | LLMError::Provider(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", value.parse().unwrap());
        headers
    }

    #[test]
    fn authorize_accepts_matching_bearer_token() {
        assert!(authorize(&headers_with("Bearer test"), "test").is_ok());
    }

    #[test]
    fn authorize_rejects_wrong_or_missing_token() {
        assert!(authorize(&headers_with("Bearer nope"), "test").is_err());
        assert!(authorize(&HeaderMap::new(), "test").is_err());
    }

    #[test]
    fn error_statuses_are_distinguishable() {
        assert_eq!(
            status_for(&LLMError::UnsupportedModel("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&LLMError::Configuration("k".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&LLMError::RetriesExhausted { attempts: 5 }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_for(&LLMError::RateLimit), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn request_defaults_to_gpt4o_text() {
        let request: ChatCompletionRequest =
            serde_json::from_value(json!({"messages": [{"role": "user", "content": "hi"}]}))
                .unwrap();
        assert_eq!(request.model, "gpt-4o");
        assert!(matches!(request.output_type, OutputType::Text));
    }
}
