// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider catalog
//!
//! Static configuration for the chat-completion API providers. The streamed
//! response framing varies per provider, so each config carries a
//! [`FrameFormat`] tag that the decoder branches on. Adding a provider never
//! touches the decoding core.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{QuillError, Result};

/// How a provider frames its streamed response body
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FrameFormat {
    /// SSE-style frames: each payload line is prefixed with `data: `
    Sse,
    /// One bare JSON object per line, no envelope
    JsonLines,
}

/// Configuration for a single API provider. Immutable after registry
/// construction; selected, not mutated, per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Registry key (e.g. "deepseek", "openrouter")
    pub name: String,

    /// API base URL; requests go to `{base_url}/chat/completions`
    pub base_url: String,

    /// Model identifier sent in the request body
    pub model: String,

    /// Streamed frame envelope used by this provider
    pub frame_format: FrameFormat,

    /// Additional headers merged into every request
    #[serde(default)]
    pub extra_headers: Vec<(String, String)>,
}

/// Static catalog of provider configurations
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderConfig>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Registry seeded with the built-in providers
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(ProviderConfig {
            name: "deepseek".to_string(),
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            frame_format: FrameFormat::JsonLines,
            extra_headers: vec![],
        });
        registry.register(ProviderConfig {
            name: "openrouter".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "deepseek/deepseek-chat-v3-0324:free".to_string(),
            frame_format: FrameFormat::Sse,
            extra_headers: vec![
                ("HTTP-Referer".to_string(), "http://localhost:8501".to_string()),
                ("X-Title".to_string(), "Quill Chat".to_string()),
            ],
        });
        registry
    }

    /// Register a provider configuration, replacing any existing entry
    pub fn register(&mut self, config: ProviderConfig) {
        self.providers.insert(config.name.clone(), config);
    }

    /// Look up a provider by name
    pub fn get(&self, name: &str) -> Result<&ProviderConfig> {
        self.providers
            .get(name)
            .ok_or_else(|| QuillError::UnknownProvider(name.to_string()))
    }

    /// Registered provider names, sorted for stable display
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
