//! Database client port and the health-event audit record.
//!
//! The resilience layer never talks to a driver directly: the application
//! supplies a [`DatabaseClient`] implementation and the managers probe it.
//! Probes must be read-only and idempotent; the managers may issue them
//! concurrently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DbError;

/// Port to the underlying database driver.
///
/// Implementations are shared across the connection manager, the health
/// monitor, and the safe-operation wrappers, so they must be `Send + Sync`.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Establish the logical connection.
    async fn connect(&self) -> Result<(), DbError>;

    /// Tear down the logical connection.
    async fn disconnect(&self) -> Result<(), DbError>;

    /// Lightweight connectivity probe (e.g. `SELECT 1`).
    ///
    /// Callers bound this with a hard timeout; implementations should keep
    /// it cheap and side-effect free.
    async fn ping(&self) -> Result<(), DbError>;

    /// Return the scoped connection handle to the pool.
    async fn release(&self) -> Result<(), DbError>;

    /// Persist a health-transition audit record.
    ///
    /// Best-effort: the monitor logs and swallows failures from this call.
    async fn record_health_event(&self, event: &HealthEvent) -> Result<(), DbError>;
}

/// Severity of a health event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthEventLevel {
    /// Informational (recovery).
    Info,
    /// Degradation in progress.
    Warning,
    /// Unhealthy transition.
    Error,
}

impl std::fmt::Display for HealthEventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Append-only audit record written on every health-state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthEvent {
    /// Unique event id.
    pub id: Uuid,
    /// Severity.
    pub level: HealthEventLevel,
    /// Component that emitted the event.
    pub source: String,
    /// Human-readable description.
    pub message: String,
    /// Structured context (failure counts, thresholds).
    pub details: serde_json::Value,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

impl HealthEvent {
    /// Create a new event stamped with the current time.
    #[must_use]
    pub fn new(
        level: HealthEventLevel,
        source: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            source: source.into(),
            message: message.into(),
            details,
            timestamp: Utc::now(),
        }
    }
}
