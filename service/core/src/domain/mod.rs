// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod llm;
pub mod usage;

pub use llm::{ChatProvider, Completion, LLMError, Message, MessageContent, OutputFormat, Provider, Role, TokenUsage};
pub use usage::{ModelUsage, UsageLedger};
