//! Retry logic for remote fetches.
//!
//! # Responsibilities
//! - Count consecutive transport failures per URL
//! - Decide whether another attempt is allowed
//!
//! # Design Decisions
//! - Bounded, fixed-delay retry; no backoff, no jitter
//! - Only transport failures (no HTTP response at all) are retried
//! - Any HTTP response, whatever its status, resets the counter

use dashmap::DashMap;
use std::time::Duration;

use crate::config::RetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: Duration::from_millis(config.delay_ms),
        }
    }

    /// Whether a request that has failed `failures` times in a row may run again.
    pub fn should_retry(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }
}

/// Consecutive transport failure counters keyed by URL.
///
/// Concurrent fetches of the same URL share one counter, so together they
/// get `max_attempts` tries and each alone may get fewer. A response to any
/// of them clears the count for all.
#[derive(Debug, Default)]
pub struct RetryTracker {
    failures: DashMap<String, u32>,
}

impl RetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more failure for `url` and return the new count.
    pub fn record_failure(&self, url: &str) -> u32 {
        let mut entry = self.failures.entry(url.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn clear(&self, url: &str) {
        self.failures.remove(url);
    }

    pub fn failures(&self, url: &str) -> u32 {
        self.failures.get(url).map_or(0, |v| *v)
    }
}
