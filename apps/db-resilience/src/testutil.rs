//! Scripted fake database client for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{DatabaseClient, HealthEvent};
use crate::error::DbError;

/// Fake client whose probe outcomes follow a script, then a default.
pub struct ScriptedClient {
    ping_script: Mutex<VecDeque<bool>>,
    ping_default: bool,
    pub ping_count: AtomicU32,
    pub connect_count: AtomicU32,
    pub disconnect_count: AtomicU32,
    pub release_count: AtomicU32,
    pub events: Mutex<Vec<HealthEvent>>,
    pub fail_event_writes: AtomicBool,
}

impl ScriptedClient {
    /// Client whose probes always succeed.
    pub fn healthy() -> Self {
        Self::with_script(vec![], true)
    }

    /// Client whose probes always fail.
    pub fn failing() -> Self {
        Self::with_script(vec![], false)
    }

    /// Client that plays `script` (true = probe succeeds), then `default`.
    pub fn with_script(script: Vec<bool>, default: bool) -> Self {
        Self {
            ping_script: Mutex::new(script.into()),
            ping_default: default,
            ping_count: AtomicU32::new(0),
            connect_count: AtomicU32::new(0),
            disconnect_count: AtomicU32::new(0),
            release_count: AtomicU32::new(0),
            events: Mutex::new(Vec::new()),
            fail_event_writes: AtomicBool::new(false),
        }
    }

    fn next_ping_ok(&self) -> bool {
        self.ping_script
            .lock()
            .pop_front()
            .unwrap_or(self.ping_default)
    }
}

#[async_trait]
impl DatabaseClient for ScriptedClient {
    async fn connect(&self) -> Result<(), DbError> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DbError> {
        self.disconnect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.ping_count.fetch_add(1, Ordering::SeqCst);
        if self.next_ping_ok() {
            Ok(())
        } else {
            Err(DbError::Timeout(Duration::from_secs(5)))
        }
    }

    async fn release(&self) -> Result<(), DbError> {
        self.release_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn record_health_event(&self, event: &HealthEvent) -> Result<(), DbError> {
        if self.fail_event_writes.load(Ordering::SeqCst) {
            return Err(DbError::Connection("audit table unavailable".into()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}
