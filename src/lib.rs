// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Quill - streaming LLM chat sessions with durable history
//!
//! This crate exposes the shared runtime used by the `quill` CLI
//! (`src/main.rs`):
//! - `session`: the submit orchestrator tying everything together
//! - `client`: streaming chat-completion client and frame decoding
//! - `provider`: static catalog of provider configurations
//! - `store`: one-JSON-file-per-session durable history
//! - `limiter`: sliding-window admission control for API calls
//! - `attachments`: best-effort text extraction from uploaded files

pub mod attachments;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod limiter;
pub mod message;
pub mod provider;
pub mod session;
pub mod store;

pub use error::{QuillError, Result};
