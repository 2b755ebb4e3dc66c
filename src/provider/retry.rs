//! # Retry and Backoff
//!
//! Fibonacci backoff for transient control-plane errors, with a bounded
//! attempt budget so a flapping API surfaces as a per-principal failure
//! instead of blocking the run forever. The sequence for a 1s floor runs
//! 1s, 1s, 2s, 3s, 5s, 8s, ... capped at the configured ceiling.

use crate::constants;
use crate::provider::PolicyStoreError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry budgets and backoff bounds for control-plane calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts for a single call hitting transient errors
    pub transient_attempts: u32,
    /// Attempts for a write losing the etag race; budgeted separately since
    /// conflicts are expected under any concurrent external modification
    pub conflict_attempts: u32,
    /// Backoff floor (seconds)
    pub backoff_min_secs: u64,
    /// Backoff ceiling (seconds)
    pub backoff_max_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            transient_attempts: constants::DEFAULT_TRANSIENT_RETRY_ATTEMPTS,
            conflict_attempts: constants::DEFAULT_CONFLICT_RETRY_ATTEMPTS,
            backoff_min_secs: constants::DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: constants::DEFAULT_BACKOFF_MAX_SECS,
        }
    }
}

impl RetryPolicy {
    /// A policy with no sleeps, for tests
    pub fn immediate() -> Self {
        Self {
            backoff_min_secs: 0,
            backoff_max_secs: 0,
            ..Self::default()
        }
    }
}

/// Fibonacci backoff calculator
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    current: u64,
    next: u64,
    max_secs: u64,
}

impl FibonacciBackoff {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            current: min_secs,
            next: min_secs,
            max_secs,
        }
    }

    /// The next delay in the sequence, capped at the ceiling
    pub fn next_backoff_secs(&mut self) -> u64 {
        let delay = self.current.min(self.max_secs);
        let step = self.current.saturating_add(self.next).min(self.max_secs);
        self.current = self.next;
        self.next = step;
        delay
    }
}

/// Run `call` until it succeeds, fails non-transiently, or exhausts the
/// transient budget
///
/// Conflict and permission errors pass straight through; the caller owns
/// their handling.
pub async fn retry_transient<T, Fut, F>(
    operation: &str,
    policy: &RetryPolicy,
    mut call: F,
) -> Result<T, PolicyStoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PolicyStoreError>>,
{
    let mut backoff = FibonacciBackoff::new(policy.backoff_min_secs, policy.backoff_max_secs);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < policy.transient_attempts => {
                let delay = backoff.next_backoff_secs();
                warn!(
                    "Transient error on {} (attempt {}/{}): {}. Retrying in {}s",
                    operation, attempt, policy.transient_attempts, error, delay
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }
            Err(error) => return Err(error),
        }
    }
}
