//! Safe operation wrappers.
//!
//! Thin façade over the retry executor for application code: reads can
//! degrade to a caller-supplied fallback when the database stays down,
//! writes always return their scoped connection handle, and transactions
//! re-run atomically from scratch. These wrappers are the only foreground
//! error surface of the resilience layer.

use std::future::Future;
use std::sync::Arc;

use crate::client::DatabaseClient;
use crate::error::DbError;
use crate::resilience::retry::{RetryExecutor, RetryPolicy};

/// Runs read/write/transaction operations through the retry executor.
pub struct SafeOperations {
    executor: RetryExecutor,
    client: Arc<dyn DatabaseClient>,
}

impl std::fmt::Debug for SafeOperations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeOperations")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl SafeOperations {
    /// Create a façade with the given retry policy.
    #[must_use]
    pub fn new(client: Arc<dyn DatabaseClient>, policy: RetryPolicy) -> Self {
        Self {
            executor: RetryExecutor::new(policy),
            client,
        }
    }

    /// Create a façade around a pre-built executor (custom predicates).
    #[must_use]
    pub const fn with_executor(client: Arc<dyn DatabaseClient>, executor: RetryExecutor) -> Self {
        Self { executor, client }
    }

    /// The underlying retry executor.
    #[must_use]
    pub const fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Run `op` with retries; log and surface the original error on failure.
    pub async fn safe_db_operation<T, F, Fut>(&self, op: F) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        self.executor.execute_with_retry(op).await.map_err(|error| {
            tracing::error!(error = %error, "database operation failed after retries");
            error
        })
    }

    /// Run a read with retries, degrading to `fallback` on failure.
    ///
    /// When a fallback is supplied, unavailability becomes degraded service:
    /// the fallback is returned instead of an error. Without one, the
    /// original error surfaces.
    pub async fn safe_db_read<T, F, Fut>(&self, op: F, fallback: Option<T>) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        match self.executor.execute_with_retry(op).await {
            Ok(value) => Ok(value),
            Err(error) => match fallback {
                None => {
                    tracing::error!(error = %error, "database read failed with no fallback");
                    Err(error)
                }
                Some(value) => {
                    tracing::warn!(error = %error, "database read degraded to fallback value");
                    Ok(value)
                }
            },
        }
    }

    /// Run a write with retries, releasing the connection handle on every
    /// exit path.
    ///
    /// Writes never degrade: after exhaustion the original error surfaces,
    /// with no partial-success signaling. Release failure is only logged.
    pub async fn safe_db_write<T, F, Fut>(&self, op: F) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        let result = self.executor.execute_with_retry(op).await;

        if let Err(error) = self.client.release().await {
            tracing::warn!(error = %error, "failed to release connection handle");
        }

        result.map_err(|error| {
            tracing::error!(error = %error, "database write failed after retries");
            error
        })
    }

    /// Run a multi-step unit of work with atomic-retry-from-scratch
    /// semantics.
    ///
    /// The closure must be safe to re-run; see
    /// [`RetryExecutor::execute_transaction`].
    pub async fn safe_db_transaction<T, F, Fut>(&self, transaction: F) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        self.executor
            .execute_transaction(transaction)
            .await
            .map_err(|error| {
                tracing::error!(error = %error, "database transaction failed after retries");
                error
            })
    }
}
