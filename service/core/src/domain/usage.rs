// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Token usage accumulation
//!
//! Running input/output token counters keyed by `"<provider>/<model>"`.
//!
//! The ledger is plain additive state with no locking: it belongs to
//! whichever caller runs the completions. Concurrent mutation requires
//! external synchronization.

use crate::domain::llm::{Completion, Provider, TokenUsage};
use serde::Serialize;
use std::collections::HashMap;

/// Accumulated counters for one provider/model pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Per-process token usage ledger.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageLedger {
    totals: HashMap<String, ModelUsage>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one completion's usage to the `provider/model` counters.
    pub fn record(&mut self, provider: Provider, model: &str, usage: &TokenUsage) {
        let entry = self
            .totals
            .entry(format!("{}/{}", provider, model))
            .or_default();
        entry.input_tokens += u64::from(usage.prompt_tokens);
        entry.output_tokens += u64::from(usage.completion_tokens);
    }

    pub fn record_completion(&mut self, completion: &Completion) {
        self.record(completion.provider, &completion.model, &completion.usage);
    }

    pub fn get(&self, provider: Provider, model: &str) -> Option<ModelUsage> {
        self.totals.get(&format!("{}/{}", provider, model)).copied()
    }

    pub fn totals(&self) -> &HashMap<String, ModelUsage> {
        &self.totals
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}
