//! Retry executor with exponential backoff and jitter.
//!
//! Runs an operation up to `max_retries` times, sleeping
//! `base_delay * 2^(attempt-1) + random(0, jitter_max)` between attempts.
//! Only transient errors (see [`crate::error`]) are retried; permanent
//! errors fail on the first attempt with no delay. After exhaustion the
//! original error is returned unwrapped.
//!
//! # Example
//!
//! ```rust,ignore
//! use db_resilience::resilience::retry::{RetryExecutor, RetryPolicy};
//!
//! let executor = RetryExecutor::new(RetryPolicy::default());
//! let rows = executor
//!     .execute_with_retry(|| async { client.query("...").await })
//!     .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::DbError;

/// Retry policy: attempt ceiling plus backoff shape.
///
/// Immutable per call; built from configuration and overridable per
/// invocation via [`RetryExecutor::execute_with_policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (default: 3).
    pub max_retries: u32,
    /// Delay before the first retry; doubles each attempt (default: 1s).
    pub base_delay: Duration,
    /// Upper bound of the random jitter added to each delay (default: 1s).
    pub jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            jitter_max: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with custom settings.
    #[must_use]
    pub const fn new(max_retries: u32, base_delay: Duration, jitter_max: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            jitter_max,
        }
    }

    /// Aggressive policy (more attempts, shorter backoff).
    #[must_use]
    pub const fn aggressive() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(200),
            jitter_max: Duration::from_millis(200),
        }
    }

    /// Conservative policy (fewer attempts, longer backoff).
    #[must_use]
    pub const fn conservative() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(2),
            jitter_max: Duration::from_secs(1),
        }
    }

    /// Delay to sleep after failed attempt `attempt` (1-based).
    ///
    /// Pre-jitter floor is `base_delay * 2^(attempt-1)`; jitter adds a
    /// uniform random value in `[0, jitter_max)`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        // Shift capped so pathological attempt counts cannot overflow.
        let exponent = attempt.saturating_sub(1).min(20);
        let floor_ms = base_ms.saturating_mul(1_u64 << exponent);

        let jitter_ms = self.jitter_max.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..jitter_ms)
        };

        Duration::from_millis(floor_ms.saturating_add(jitter))
    }
}

/// Extensible retryability predicate.
type RetryPredicate = Box<dyn Fn(&DbError) -> bool + Send + Sync>;

/// Generic "run this operation, retry transient failures with backoff"
/// primitive.
pub struct RetryExecutor {
    policy: RetryPolicy,
    predicates: Vec<RetryPredicate>,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryExecutor {
    /// Create an executor with the given default policy.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            predicates: Vec::new(),
        }
    }

    /// Add a custom retryability predicate.
    ///
    /// An error is retried when the built-in classifier or any predicate
    /// marks it retryable.
    #[must_use]
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&DbError) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// The executor's default policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn is_retryable(&self, error: &DbError) -> bool {
        error.is_retryable() || self.predicates.iter().any(|p| p(error))
    }

    /// Run `op` with the executor's default policy.
    pub async fn execute_with_retry<T, F, Fut>(&self, op: F) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        let policy = self.policy;
        self.execute_with_policy(op, &policy).await
    }

    /// Run `op` with a per-invocation policy override.
    ///
    /// # Errors
    ///
    /// Returns the original, unwrapped error: immediately for permanent
    /// failures, after `max_retries` attempts for transient ones.
    pub async fn execute_with_policy<T, F, Fut>(
        &self,
        mut op: F,
        policy: &RetryPolicy,
    ) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !self.is_retryable(&error) {
                        return Err(error);
                    }

                    if attempt >= policy.max_retries {
                        tracing::warn!(
                            attempts = attempt,
                            error = %error,
                            "retries exhausted, surfacing original error"
                        );
                        return Err(error);
                    }

                    let delay = policy.backoff_delay(attempt);
                    tracing::warn!(
                        attempt,
                        max_retries = policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient database error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Retry a multi-step unit of work atomically from scratch.
    ///
    /// The whole closure re-runs on transient failure; callers must ensure
    /// it is safe to re-run (no non-idempotent side effects straddle
    /// retries).
    pub async fn execute_transaction<T, F, Fut>(&self, transaction: F) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        self.execute_with_retry(transaction).await
    }

    /// [`Self::execute_transaction`] with a per-invocation policy override.
    pub async fn execute_transaction_with_policy<T, F, Fut>(
        &self,
        transaction: F,
        policy: &RetryPolicy,
    ) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        self.execute_with_policy(transaction, policy).await
    }
}
