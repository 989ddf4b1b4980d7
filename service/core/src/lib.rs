// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Coxswain core
//!
//! Provider-agnostic chat completion primitives for the agents service.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain types, provider adapters, and server plumbing

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
