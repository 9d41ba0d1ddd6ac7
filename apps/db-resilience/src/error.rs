//! Error taxonomy and retry classification for database operations.
//!
//! Every failure surfaced by the [`DatabaseClient`](crate::client::DatabaseClient)
//! port is a [`DbError`]. Errors split into two categories for retry
//! decisions:
//!
//! | Retryable (transient) | Non-Retryable (permanent) |
//! |-----------------------|---------------------------|
//! | Query/probe timeout | Malformed query |
//! | Connection pool exhausted | Constraint violation |
//! | Connection refused / reset | Permission denied |
//! | Not-found under replication lag | Anything else |
//!
//! The retry executor never wraps errors: after exhaustion the caller sees
//! the original `DbError`, not a retry-layer wrapper.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the database client and the resilience layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Operation exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Connection pool had no free handle.
    #[error("connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// The server actively refused the connection.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Row expected to exist was not found. Treated as transient: a freshly
    /// written row may not be visible on a lagging read replica yet.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Generic connection-level failure (reset, broken pipe, dropped socket).
    #[error("connection error: {0}")]
    Connection(String),

    /// Query rejected by the server (syntax, constraint, permission).
    #[error("query failed: {0}")]
    Query(String),

    /// Opaque error from the client driver, classified by code/message.
    #[error("client error [{code}]: {message}")]
    Client {
        /// Machine-inspectable driver error code.
        code: String,
        /// Human-readable driver message.
        message: String,
    },
}

/// Error categories for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Error is retryable (transient failure).
    Retryable,
    /// Error is not retryable (permanent failure).
    NonRetryable,
}

impl DbError {
    /// Classify this error for retry decisions.
    ///
    /// Structured variants carry their category directly; opaque
    /// [`DbError::Client`] errors fall back to message inspection.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Timeout(_)
            | Self::PoolExhausted(_)
            | Self::ConnectionRefused(_)
            | Self::NotFound(_)
            | Self::Connection(_) => ErrorCategory::Retryable,
            Self::Query(_) => ErrorCategory::NonRetryable,
            Self::Client { code, message } => classify_message(&format!("{code} {message}")),
        }
    }

    /// Shorthand for `category() == Retryable`.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Retryable
    }
}

/// Classify an opaque driver error by its code/message text.
///
/// Substring rules mirror the transient failure modes seen from relational
/// drivers: timeouts, pool exhaustion, refused/reset connections.
#[must_use]
pub fn classify_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();

    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("pool")
        || lower.contains("connection")
        || lower.contains("econnrefused")
        || lower.contains("broken pipe")
        || lower.contains("socket")
    {
        return ErrorCategory::Retryable;
    }

    ErrorCategory::NonRetryable
}
