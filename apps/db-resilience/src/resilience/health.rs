//! Debounced database health monitoring.
//!
//! Independent of the connection manager: the monitor probes the same
//! client on its own timer and exposes a cached, hysteresis-filtered health
//! signal. Health flips to unhealthy only after `max_consecutive_failures`
//! failing probes in a row, and flips back on the very next success, so a
//! single transient blip never flaps the signal.
//!
//! Listeners are invoked synchronously, in registration order, on every
//! transition. Each transition is also written to the database as a
//! best-effort [`HealthEvent`] audit record.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{DatabaseClient, HealthEvent, HealthEventLevel};
use crate::config::HealthCheckConfig;

/// Hard ceiling on a single health probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Listeners receive the new health value on every transition.
type ListenerMap = BTreeMap<u64, Arc<dyn Fn(bool) + Send + Sync>>;

/// Snapshot of the monitor's health state.
#[derive(Debug, Clone, Copy)]
pub struct HealthState {
    /// Current debounced health signal.
    pub is_healthy: bool,
    /// When the most recent probe completed; `None` before the first probe.
    pub last_check: Option<Instant>,
    /// Failing probes since the last success.
    pub consecutive_failures: u32,
    /// Failure threshold at which health flips to unhealthy.
    pub max_consecutive_failures: u32,
}

/// Handle returned by listener registration; removes the listener.
pub struct ListenerHandle {
    id: u64,
    listeners: Weak<Mutex<ListenerMap>>,
}

impl ListenerHandle {
    /// Remove the listener. It receives no further notifications.
    pub fn unregister(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().remove(&self.id);
        }
    }
}

/// Independent, debounced database health monitor.
///
/// One instance lives per process, shared via `Arc`, started with
/// [`HealthMonitor::start`] and torn down with [`HealthMonitor::cleanup`].
pub struct HealthMonitor {
    client: Arc<dyn DatabaseClient>,
    config: HealthCheckConfig,
    probe_timeout: Duration,
    state: RwLock<HealthState>,
    listeners: Arc<Mutex<ListenerMap>>,
    next_listener_id: AtomicU64,
    /// Serializes scheduled ticks and forced checks, so two probes never
    /// race on the consecutive-failure counter.
    probe_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    /// Create a monitor in the optimistic `HEALTHY` state.
    #[must_use]
    pub fn new(client: Arc<dyn DatabaseClient>, config: HealthCheckConfig) -> Self {
        let max_consecutive_failures = config.max_consecutive_failures;
        Self {
            client,
            config,
            probe_timeout: PROBE_TIMEOUT,
            state: RwLock::new(HealthState {
                is_healthy: true,
                last_check: None,
                consecutive_failures: 0,
                max_consecutive_failures,
            }),
            listeners: Arc::new(Mutex::new(BTreeMap::new())),
            next_listener_id: AtomicU64::new(1),
            probe_lock: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Override the probe ceiling (tests).
    #[must_use]
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Start the periodic probe task.
    ///
    /// No-op when disabled by configuration or already started.
    pub fn start(self: &Arc<Self>) {
        if !self.config.enabled {
            tracing::debug!("health monitoring disabled by configuration");
            return;
        }

        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let monitor = Arc::clone(self);
        let interval = self.config.interval();
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = monitor.cancel.cancelled() => {
                        tracing::debug!("health monitor task cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        monitor.check_health().await;
                    }
                }
            }
        }));

        tracing::info!(
            interval_secs = interval.as_secs(),
            threshold = self.config.max_consecutive_failures,
            "health monitor started"
        );
    }

    /// Run one probe cycle and fold the outcome into the health state.
    ///
    /// Returns the resulting health value. Probe failures are never
    /// propagated; they only move the failure counter.
    pub async fn check_health(&self) -> bool {
        let _guard = self.probe_lock.lock().await;

        let probe_ok = self.probe().await;
        let transition = self.apply_probe_outcome(probe_ok);

        if let Some(healthy) = transition {
            let failures = self.state.read().consecutive_failures;
            if healthy {
                tracing::info!("database health restored");
            } else {
                tracing::error!(
                    consecutive_failures = failures,
                    threshold = self.config.max_consecutive_failures,
                    "database marked unhealthy"
                );
            }
            self.notify_listeners(healthy);
            self.persist_transition(healthy, failures).await;
        }

        self.state.read().is_healthy
    }

    /// Fold one probe result into the state record.
    ///
    /// Returns `Some(new_health)` when the debounced signal flipped.
    fn apply_probe_outcome(&self, probe_ok: bool) -> Option<bool> {
        let mut state = self.state.write();
        state.last_check = Some(Instant::now());

        if probe_ok {
            state.consecutive_failures = 0;
            if state.is_healthy {
                None
            } else {
                state.is_healthy = true;
                Some(true)
            }
        } else {
            state.consecutive_failures += 1;
            if state.is_healthy && state.consecutive_failures >= state.max_consecutive_failures {
                state.is_healthy = false;
                Some(false)
            } else {
                None
            }
        }
    }

    /// Register a listener for health transitions.
    ///
    /// Listeners run synchronously, in registration order, with the new
    /// health value. The returned handle removes the listener.
    #[must_use]
    pub fn register_health_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().insert(id, Arc::new(listener));
        ListenerHandle {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Cached health status, fail-closed on staleness.
    ///
    /// When the last probe is older than the staleness window (or absent),
    /// this spawns an async re-check and reports `false` for the current
    /// call regardless of the cached value.
    #[must_use]
    pub fn is_database_healthy(self: &Arc<Self>) -> bool {
        let state = self.state.read();
        if let Some(checked) = state.last_check
            && checked.elapsed() <= self.config.staleness_window()
        {
            return state.is_healthy;
        }
        drop(state);

        tracing::debug!("health status stale, triggering re-check");
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            monitor.check_health().await;
        });
        false
    }

    /// Await one full probe cycle and return the resulting health value.
    pub async fn force_health_check(&self) -> bool {
        self.check_health().await
    }

    /// Snapshot of the current health state.
    #[must_use]
    pub fn state(&self) -> HealthState {
        *self.state.read()
    }

    /// Stop the probe task and drop all listeners.
    ///
    /// In-flight probes are left to complete; their results are discarded.
    pub fn cleanup(&self) {
        self.cancel.cancel();
        self.task.lock().take();
        self.listeners.lock().clear();
        tracing::info!("health monitor cleaned up");
    }

    async fn probe(&self) -> bool {
        match tokio::time::timeout(self.probe_timeout, self.client.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(error)) => {
                tracing::debug!(error = %error, "health probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(
                    timeout_secs = self.probe_timeout.as_secs(),
                    "health probe timed out"
                );
                false
            }
        }
    }

    /// Invoke listeners in registration order.
    ///
    /// The map lock is not held across callbacks, so a listener may register
    /// or unregister without deadlocking. A panicking listener is logged and
    /// does not block the rest.
    fn notify_listeners(&self, healthy: bool) {
        let snapshot: Vec<(u64, Arc<dyn Fn(bool) + Send + Sync>)> = self
            .listeners
            .lock()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        for (id, listener) in snapshot {
            // Skip listeners unregistered since the snapshot
            if !self.listeners.lock().contains_key(&id) {
                continue;
            }
            if std::panic::catch_unwind(AssertUnwindSafe(|| listener(healthy))).is_err() {
                tracing::warn!(listener_id = id, "health listener panicked");
            }
        }
    }

    /// Best-effort audit record for a transition. Failures are swallowed.
    async fn persist_transition(&self, healthy: bool, consecutive_failures: u32) {
        let (level, message) = if healthy {
            (HealthEventLevel::Info, "database health restored")
        } else {
            (HealthEventLevel::Error, "database marked unhealthy")
        };

        let event = HealthEvent::new(
            level,
            "health_monitor",
            message,
            serde_json::json!({
                "is_healthy": healthy,
                "consecutive_failures": consecutive_failures,
                "threshold": self.config.max_consecutive_failures,
            }),
        );

        if let Err(error) = self.client.record_health_event(&event).await {
            tracing::debug!(error = %error, "failed to persist health event");
        }
    }
}
