// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management
//!
//! Handles loading and saving settings from ~/.quill/settings.json. The home
//! directory is overridable through `QUILL_HOME` so tests and multi-profile
//! setups never touch the real home.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::client::SamplingParams;
use crate::error::Result;
use crate::session::DEFAULT_PREAMBLE;

/// Main settings structure, stored in ~/.quill/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Default settings for new sessions
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Rate limiting for outbound API calls
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Defaults applied to new chat sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Provider selected when none is given on the command line
    #[serde(default = "default_provider")]
    pub provider: String,

    /// System preamble prepended to every request
    #[serde(default = "default_preamble")]
    pub preamble: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Repetition penalty, sent as `frequency_penalty` on the wire
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,
}

/// Rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum admitted calls per window
    #[serde(default = "default_max_calls")]
    pub max_calls: usize,

    /// Trailing window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_preamble() -> String {
    DEFAULT_PREAMBLE.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_repetition_penalty() -> f32 {
    1.1
}

fn default_max_calls() -> usize {
    crate::limiter::DEFAULT_MAX_CALLS
}

fn default_window_secs() -> u64 {
    crate::limiter::DEFAULT_WINDOW.as_secs()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            preamble: default_preamble(),
            temperature: default_temperature(),
            repetition_penalty: default_repetition_penalty(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: default_max_calls(),
            window_secs: default_window_secs(),
        }
    }
}

impl Settings {
    /// Get the quill home directory (~/.quill or $QUILL_HOME)
    pub fn quill_home() -> PathBuf {
        if let Ok(home) = std::env::var("QUILL_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".quill")
    }

    /// Get the default settings file path
    pub fn default_path() -> PathBuf {
        Self::quill_home().join("settings.json")
    }

    /// Directory holding persisted sessions
    pub fn sessions_dir() -> PathBuf {
        Self::quill_home().join("sessions")
    }

    /// Load settings from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load settings from a specific path; a missing file yields defaults
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Ensure all required directories exist
    pub fn ensure_directories() -> Result<()> {
        for dir in [Self::quill_home(), Self::sessions_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }

    /// API key for a provider, read from `<PROVIDER>_API_KEY` (uppercased,
    /// dashes mapped to underscores).
    pub fn api_key_for(provider: &str) -> Option<String> {
        let var = format!(
            "{}_API_KEY",
            provider.to_uppercase().replace('-', "_")
        );
        std::env::var(&var).ok().filter(|key| !key.is_empty())
    }

    /// Sampling parameters from the configured defaults
    pub fn sampling_params(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.defaults.temperature,
            repetition_penalty: self.defaults.repetition_penalty,
        }
    }

    /// Rate limit window as a Duration
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_secs)
    }
}
