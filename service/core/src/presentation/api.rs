// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP server bootstrap
//!
//! Binds the listener, exposes the liveness endpoint, and serves whatever
//! application routes the caller supplies. The routes themselves are an
//! external collaborator; this layer only provides the shell.

use crate::application::CompletionService;
use crate::domain::usage::UsageLedger;
use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

/// Shared state for the HTTP application.
pub struct AppState {
    pub completions: Arc<CompletionService>,
    /// Ledger behind a lock: the accumulator itself is unsynchronized and
    /// requests run concurrently.
    pub usage: Mutex<UsageLedger>,
    pub api_key: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(completions: Arc<CompletionService>, api_key: impl Into<String>) -> Self {
        Self {
            completions,
            usage: Mutex::new(UsageLedger::new()),
            api_key: api_key.into(),
            start_time: Instant::now(),
        }
    }
}

/// Build the HTTP router: liveness endpoint plus the supplied application
/// routes.
pub fn router(state: Arc<AppState>, app_routes: Router<Arc<AppState>>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .merge(app_routes)
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

/// Bind and serve until ctrl-c or SIGTERM.
pub async fn serve(host: &str, port: u16, app: Router) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::ChatProvider;
    use crate::infrastructure::llm::{Credentials, ProviderRegistry};

    fn test_state() -> Arc<AppState> {
        let registry: Arc<dyn ChatProvider> =
            Arc::new(ProviderRegistry::new(Credentials::default()));
        Arc::new(AppState::new(
            Arc::new(CompletionService::new(registry)),
            "test",
        ))
    }

    #[test]
    fn health_reports_uptime() {
        let state = test_state();
        let Json(body) = tokio_test::block_on(health_handler(State(state)));

        assert_eq!(body["status"], "healthy");
        assert!(body["uptime_seconds"].is_u64());
    }

    #[test]
    fn router_accepts_external_routes() {
        let state = test_state();
        let extra: Router<Arc<AppState>> =
            Router::new().route("/ping", get(|| async { "pong" }));
        let _app = router(state, extra);
    }
}
