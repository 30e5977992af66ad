// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Quill
//!
//! This module defines all error types used throughout the application.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for Quill operations
#[derive(Error, Debug)]
pub enum QuillError {
    /// Local sliding-window rate limit exceeded
    #[error("Rate limit exceeded: max {max} requests per {window_secs} seconds")]
    RateLimited { max: usize, window_secs: u64 },

    /// A submit is already in flight for this session
    #[error("Session is busy: a request is already in flight")]
    Busy,

    /// Requested provider is not in the registry
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// No credential available for the provider
    #[error("Missing API credential for provider: {0}")]
    MissingCredential(String),

    /// API-related errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Session persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Provider rejected the request with a non-2xx status
    #[error("API error ({provider}, {status}): {message}")]
    Server {
        provider: String,
        status: u16,
        message: String,
    },

    /// Network-level failure (connection reset, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Streamed body could not be decoded
    #[error("Streaming error: {0}")]
    Stream(String),

    /// The in-flight request was cancelled
    #[error("Request cancelled")]
    Cancelled,
}

/// Persistence-specific error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// No session with the given id
    #[error("Session not found: {0}")]
    NotFound(Uuid),

    /// Rollback target does not match the last persisted message
    #[error("Rollback mismatch: last message does not match the given message")]
    RollbackMismatch,

    /// IO errors while reading/writing session files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Corrupt or unserializable session file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Quill operations
pub type Result<T> = std::result::Result<T, QuillError>;

impl QuillError {
    /// Whether the error follows the rollback path (failures from streaming onward).
    pub fn triggers_rollback(&self) -> bool {
        matches!(self, QuillError::Api(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_display() {
        let err = QuillError::RateLimited {
            max: 10,
            window_secs: 60,
        };
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains("60"));
    }

    #[test]
    fn test_busy_display() {
        let err = QuillError::Busy;
        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn test_unknown_provider() {
        let err = QuillError::UnknownProvider("acme".to_string());
        assert!(err.to_string().contains("Unknown provider"));
        assert!(err.to_string().contains("acme"));
    }

    #[test]
    fn test_missing_credential() {
        let err = QuillError::MissingCredential("deepseek".to_string());
        assert!(err.to_string().contains("deepseek"));
    }

    #[test]
    fn test_api_error_server() {
        let err = ApiError::Server {
            provider: "openrouter".to_string(),
            status: 429,
            message: "too many requests".to_string(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("openrouter"));
        assert!(err.to_string().contains("too many requests"));
    }

    #[test]
    fn test_api_error_transport() {
        let err = ApiError::Transport("connection reset".to_string());
        assert!(err.to_string().contains("Transport error"));
    }

    #[test]
    fn test_api_error_cancelled() {
        let err = ApiError::Cancelled;
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_store_error_not_found() {
        let id = Uuid::new_v4();
        let err = StoreError::NotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_store_error_rollback_mismatch() {
        let err = StoreError::RollbackMismatch;
        assert!(err.to_string().contains("Rollback mismatch"));
    }

    #[test]
    fn test_quill_error_from_api_error() {
        let err: QuillError = ApiError::Transport("reset".to_string()).into();
        assert!(err.to_string().contains("API error"));
        assert!(err.triggers_rollback());
    }

    #[test]
    fn test_quill_error_from_store_error() {
        let err: QuillError = StoreError::RollbackMismatch.into();
        assert!(err.to_string().contains("Store error"));
        assert!(!err.triggers_rollback());
    }

    #[test]
    fn test_quill_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QuillError = io_err.into();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_rate_limited_does_not_trigger_rollback() {
        let err = QuillError::RateLimited {
            max: 10,
            window_secs: 60,
        };
        assert!(!err.triggers_rollback());
    }

    #[test]
    fn test_result_type_alias() {
        fn test_fn() -> Result<i32> {
            Ok(42)
        }

        assert_eq!(test_fn().unwrap(), 42);
    }
}
