//! Resilience components: retry, connection lifecycle, health monitoring,
//! and the safe operation wrappers that compose them.
//!
//! Hot path: application code calls [`ops::SafeOperations`], which drives
//! [`retry::RetryExecutor`] against the database client. Off the hot path,
//! [`connection::ConnectionManager`] and [`health::HealthMonitor`] run on
//! their own timers, probing the same client independently and exposing
//! cached status.

pub mod connection;
pub mod health;
pub mod ops;
pub mod retry;

pub use connection::{ConnectionManager, ConnectionState};
pub use health::{HealthMonitor, HealthState, ListenerHandle};
pub use ops::SafeOperations;
pub use retry::{RetryExecutor, RetryPolicy};
