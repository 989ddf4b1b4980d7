// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Coxswain agents service
//!
//! The `coxswain` binary boots the agents HTTP service:
//!
//! 1. Load `.env`, then require every backend credential in the process
//!    environment. A missing credential exits with status 1 before the
//!    server binds.
//! 2. Serve the application routes plus `/health` on the configured
//!    host/port (default `0.0.0.0:4040`).

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::sync::Arc;
use tracing::info;

use coxswain_core::application::CompletionService;
use coxswain_core::infrastructure::llm::{ProviderRegistry, REQUIRED_KEYS};
use coxswain_core::presentation::{api, AppState};

mod routes;

/// Placeholder used when no service API key is configured.
const DEFAULT_API_KEY: &str = "test";

/// Coxswain agents service - multi-provider chat completions
#[derive(Parser)]
#[command(name = "coxswain")]
#[command(version, about, long_about = None)]
struct Cli {
    /// HTTP API host
    #[arg(long, env = "AGENTS_HOST", default_value = "0.0.0.0")]
    host: String,

    /// HTTP API port
    #[arg(long, env = "AGENTS_PORT", default_value = "4040")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "AGENTS_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so clap env overrides and credential checks see it.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    if let Some(var) = first_missing_credential(|name| std::env::var(name).ok()) {
        eprintln!(
            "{}",
            format!("Error: {} not found in environment variables", var).red()
        );
        std::process::exit(1);
    }

    let api_key =
        std::env::var("AGENTS_API_KEY").unwrap_or_else(|_| DEFAULT_API_KEY.to_string());

    let registry = Arc::new(ProviderRegistry::from_env());
    let completions = Arc::new(CompletionService::new(registry));
    let state = Arc::new(AppState::new(completions, api_key));

    let app = api::router(state, routes::app_routes());

    info!("Starting agents service");
    info!("Health check: http://localhost:{}/health", cli.port);

    api::serve(&cli.host, cli.port, app).await
}

/// First required credential missing from the environment, if any.
///
/// Empty values count as missing.
fn first_missing_credential<F>(get: F) -> Option<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    REQUIRED_KEYS
        .into_iter()
        .find(|name| get(name).map(|v| v.is_empty()).unwrap_or(true))
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
