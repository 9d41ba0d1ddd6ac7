//! Connection lifecycle management.
//!
//! Owns the single logical database connection: startup probe, periodic
//! connectivity polling, reconnection with backoff, and graceful shutdown.
//! One `ConnectionManager` lives per process, constructed at startup and
//! torn down with [`ConnectionManager::shutdown`].
//!
//! The manager never sits on the hot path of individual queries; it exposes
//! a cached flag via [`ConnectionManager::is_connected_to_database`]. The
//! flag fails closed: a status older than the staleness window counts as
//! disconnected.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::DatabaseClient;
use crate::config::{ConnectionConfig, HealthCheckConfig};

/// Snapshot of the connection lifecycle state.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionState {
    /// Result of the most recent probe.
    pub is_connected: bool,
    /// When the most recent probe completed; `None` before the first probe.
    pub last_check: Option<Instant>,
    /// Reconnect attempts since the last successful probe.
    pub reconnect_attempts: u32,
    /// Attempt ceiling before the manager gives up.
    pub max_reconnect_attempts: u32,
}

/// Manages the database connection lifecycle.
pub struct ConnectionManager {
    client: Arc<dyn DatabaseClient>,
    config: ConnectionConfig,
    health_check: HealthCheckConfig,
    state: RwLock<ConnectionState>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Create a manager in the `DISCONNECTED` state.
    #[must_use]
    pub fn new(
        client: Arc<dyn DatabaseClient>,
        config: ConnectionConfig,
        health_check: HealthCheckConfig,
    ) -> Self {
        let max_reconnect_attempts = config.max_reconnect_attempts;
        Self {
            client,
            config,
            health_check,
            state: RwLock::new(ConnectionState {
                is_connected: false,
                last_check: None,
                reconnect_attempts: 0,
                max_reconnect_attempts,
            }),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Establish the connection and run the startup probe.
    ///
    /// Failure is recorded as state, not propagated: the application starts
    /// either way and the periodic checker takes over.
    pub async fn initialize(&self) {
        if let Err(error) = self.client.connect().await {
            tracing::warn!(error = %error, "initial database connect failed");
        }

        let connected = self.probe().await;
        self.record_probe(connected);

        if connected {
            tracing::info!("database connection established");
        } else {
            tracing::warn!("database unreachable at startup, will keep checking");
        }
    }

    /// Start the periodic connectivity check task.
    ///
    /// No-op when disabled by configuration or already started. Ticks are
    /// serialized by the task loop itself: a new tick cannot start while a
    /// prior probe or reconnect sequence is still in flight.
    pub fn start_health_check(self: &Arc<Self>) {
        if !self.health_check.enabled {
            tracing::debug!("connection health check disabled by configuration");
            return;
        }

        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let manager = Arc::clone(self);
        let interval = self.health_check.interval();
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // Consume the immediate first tick; initialize() already probed.
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = manager.cancel.cancelled() => {
                        tracing::debug!("connection check task cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        manager.run_check_cycle().await;
                    }
                }
            }
        }));

        tracing::info!(
            interval_secs = interval.as_secs(),
            "connection health check started"
        );
    }

    /// One scheduled tick: probe, record, and react to transitions.
    async fn run_check_cycle(&self) {
        let was_connected = self.state.read().is_connected;
        let connected = self.probe().await;
        self.record_probe(connected);

        if was_connected && !connected {
            tracing::warn!("database connection lost");
            self.attempt_reconnect().await;
        } else if !was_connected && connected {
            tracing::info!("database connection restored");
        }
    }

    /// Reconnect with backoff until success, ceiling, or shutdown.
    ///
    /// Attempt `n` waits `base_reconnect_delay * 1.5^(n-1)`, then performs a
    /// disconnect-connect-probe cycle. An explicit loop rather than
    /// rescheduling, so pending attempts cannot overlap and shutdown cancels
    /// the wait deterministically.
    pub async fn attempt_reconnect(&self) {
        loop {
            let attempt = {
                let mut state = self.state.write();
                if state.reconnect_attempts >= state.max_reconnect_attempts {
                    tracing::error!(
                        attempts = state.reconnect_attempts,
                        "reconnect attempt ceiling reached, giving up"
                    );
                    return;
                }
                state.reconnect_attempts += 1;
                state.reconnect_attempts
            };

            let delay = reconnect_delay(&self.config, attempt);
            tracing::warn!(
                attempt,
                max_attempts = self.config.max_reconnect_attempts,
                delay_ms = delay.as_millis() as u64,
                "scheduling database reconnect"
            );

            tokio::select! {
                () = self.cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }

            if let Err(error) = self.client.disconnect().await {
                tracing::debug!(error = %error, "disconnect before reconnect failed");
            }
            if let Err(error) = self.client.connect().await {
                tracing::debug!(error = %error, "reconnect attempt failed to connect");
            }

            let connected = self.probe().await;
            self.record_probe(connected);
            if connected {
                tracing::info!(attempt, "reconnected to database");
                return;
            }
        }
    }

    /// Cached connection status, fail-closed on staleness.
    ///
    /// Returns `false` when no probe has completed yet or the last probe is
    /// older than the staleness window: unknown is unsafe.
    #[must_use]
    pub fn is_connected_to_database(&self) -> bool {
        let state = self.state.read();
        match state.last_check {
            Some(checked) if checked.elapsed() <= self.config.staleness_window() => {
                state.is_connected
            }
            Some(_) => {
                tracing::debug!("connection status stale, reporting disconnected");
                false
            }
            None => false,
        }
    }

    /// Snapshot of the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Stop the check task and disconnect.
    ///
    /// In-flight probes are left to complete; their results are discarded.
    /// Disconnect failure is logged, never propagated.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.task.lock().take();

        if let Err(error) = self.client.disconnect().await {
            tracing::warn!(error = %error, "disconnect during shutdown failed");
        }
        tracing::info!("connection manager shut down");
    }

    async fn probe(&self) -> bool {
        match tokio::time::timeout(self.config.probe_timeout(), self.client.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(error)) => {
                tracing::debug!(error = %error, "connection probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(
                    timeout_secs = self.config.probe_timeout_seconds,
                    "connection probe timed out"
                );
                false
            }
        }
    }

    fn record_probe(&self, connected: bool) {
        let mut state = self.state.write();
        state.is_connected = connected;
        state.last_check = Some(Instant::now());
        if connected {
            state.reconnect_attempts = 0;
        }
    }
}

/// Delay before reconnect attempt `attempt` (1-based): `base * 1.5^(n-1)`.
///
/// A slower-growing curve than the retry executor's, since reconnection is
/// coarser-grained.
fn reconnect_delay(config: &ConnectionConfig, attempt: u32) -> std::time::Duration {
    let base_ms = config.base_reconnect_delay().as_millis() as f64;
    let scaled = base_ms * 1.5_f64.powi(attempt.saturating_sub(1).min(30) as i32);
    std::time::Duration::from_millis(scaled as u64)
}
