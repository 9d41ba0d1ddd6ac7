// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::items_after_statements,
        clippy::default_trait_access
    )
)]

//! Database Resilience Layer
//!
//! Keeps a long-lived application alive against a flaky relational store.
//!
//! # Components
//!
//! - [`resilience::RetryExecutor`]: generic retry-with-backoff primitive.
//!   Transient failures (timeouts, pool exhaustion, refused connections,
//!   replication-lag not-found) are retried with exponential backoff and
//!   jitter; permanent errors fail fast.
//! - [`resilience::ConnectionManager`]: owns the logical connection's
//!   lifecycle — startup probe, periodic polling, reconnection with a
//!   slower 1.5x backoff curve, graceful shutdown.
//! - [`resilience::HealthMonitor`]: independent, debounced health signal
//!   with synchronous listener notification and best-effort audit records.
//! - [`resilience::SafeOperations`]: read/write/transaction wrappers that
//!   compose the retry executor with fallback-value and handle-release
//!   semantics.
//!
//! The managers are explicitly constructed service instances with a
//! process-wide lifecycle: created at startup, shared via `Arc`, torn down
//! at shutdown. They never sit on the hot path of individual queries.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use db_resilience::{
//!     config::ResilienceConfig,
//!     resilience::{ConnectionManager, HealthMonitor, SafeOperations},
//! };
//!
//! let config = ResilienceConfig::default();
//! let client: Arc<dyn db_resilience::client::DatabaseClient> = make_client();
//!
//! let connections = Arc::new(ConnectionManager::new(
//!     Arc::clone(&client),
//!     config.connection.clone(),
//!     config.health_check.clone(),
//! ));
//! connections.initialize().await;
//! connections.start_health_check();
//!
//! let health = Arc::new(HealthMonitor::new(
//!     Arc::clone(&client),
//!     config.health_check.clone(),
//! ));
//! health.start();
//!
//! let ops = SafeOperations::new(Arc::clone(&client), config.retry.to_policy());
//! let rows = ops
//!     .safe_db_read(|| async { client_query().await }, Some(Vec::new()))
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Database client port and health-event audit record.
pub mod client;

/// Configuration loading and validation.
pub mod config;

/// Error taxonomy and retry classification.
pub mod error;

/// Resilience components.
pub mod resilience;

/// Tracing setup.
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::{DatabaseClient, HealthEvent, HealthEventLevel};
pub use config::{ConfigError, ResilienceConfig, load_config};
pub use error::{DbError, ErrorCategory};
pub use resilience::{
    ConnectionManager, ConnectionState, HealthMonitor, HealthState, ListenerHandle,
    RetryExecutor, RetryPolicy, SafeOperations,
};
