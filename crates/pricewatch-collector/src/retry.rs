//! Bounded retry policy for flaky per-element reads.

use std::time::Duration;

/// How often to re-attempt a transiently-failed element read before giving
/// up on that single element. A policy value is passed in explicitly — the
/// collector has no ambient retry behaviour.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  /// Total attempts, including the first.
  pub max_attempts: u32,
  /// Fixed delay between attempts.
  pub backoff:      Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      backoff:      Duration::from_millis(250),
    }
  }
}
