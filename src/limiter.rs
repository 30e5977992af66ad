// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Sliding-window rate limiting for outbound API calls
//!
//! Admission is immediate accept/reject; retry policy is the caller's
//! concern. The window only ever holds timestamps within the trailing
//! interval, so a burst can never exceed `max_calls` per window.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default maximum admitted calls per window
pub const DEFAULT_MAX_CALLS: usize = 10;

/// Default trailing window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window admission control over outbound API calls
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter admitting at most `max_calls` per `window`
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            admitted: Mutex::new(VecDeque::new()),
        }
    }

    /// Try to admit a call now. Prunes expired entries, then rejects if the
    /// window is full (leaving it otherwise unchanged) or records the call
    /// and accepts.
    pub fn admit(&self) -> bool {
        self.admit_at(Instant::now())
    }

    fn admit_at(&self, now: Instant) -> bool {
        let mut admitted = self
            .admitted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        while let Some(&oldest) = admitted.front() {
            if now.duration_since(oldest) >= self.window {
                admitted.pop_front();
            } else {
                break;
            }
        }

        if admitted.len() >= self.max_calls {
            tracing::debug!(
                admitted = admitted.len(),
                max = self.max_calls,
                "rate limit window full, rejecting"
            );
            return false;
        }

        admitted.push_back(now);
        true
    }

    /// Maximum admitted calls per window
    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    /// Trailing window length
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of admissions currently retained in the window
    pub fn admitted_count(&self) -> usize {
        let now = Instant::now();
        let admitted = self
            .admitted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        admitted
            .iter()
            .filter(|&&t| now.duration_since(t) < self.window)
            .count()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CALLS, DEFAULT_WINDOW)
    }
}
