//! End-to-end scenarios for the resilience layer.
//!
//! Drives the retry executor, health monitor, connection manager, and safe
//! wrappers together against a scripted fake client.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use db_resilience::client::{DatabaseClient, HealthEvent};
use db_resilience::config::{ConnectionConfig, HealthCheckConfig};
use db_resilience::error::DbError;
use db_resilience::resilience::{
    ConnectionManager, HealthMonitor, RetryExecutor, RetryPolicy, SafeOperations,
};

/// Fake client whose probe outcomes follow a script, then a default.
struct FakeDb {
    ping_script: Mutex<VecDeque<bool>>,
    ping_default: bool,
    ping_count: AtomicU32,
    release_count: AtomicU32,
    events: Mutex<Vec<HealthEvent>>,
}

impl FakeDb {
    fn new(script: Vec<bool>, default: bool) -> Arc<Self> {
        Arc::new(Self {
            ping_script: Mutex::new(script.into()),
            ping_default: default,
            ping_count: AtomicU32::new(0),
            release_count: AtomicU32::new(0),
            events: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl DatabaseClient for FakeDb {
    async fn connect(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.ping_count.fetch_add(1, Ordering::SeqCst);
        let ok = self
            .ping_script
            .lock()
            .pop_front()
            .unwrap_or(self.ping_default);
        if ok {
            Ok(())
        } else {
            Err(DbError::ConnectionRefused("db:5432".into()))
        }
    }

    async fn release(&self) -> Result<(), DbError> {
        self.release_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn record_health_event(&self, event: &HealthEvent) -> Result<(), DbError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Scenario A: `max_retries = 3`, `base_delay = 100ms`; the operation times
/// out twice then returns 42. Expect the value, exactly 3 attempts, and an
/// elapsed time at or above the 300ms pre-jitter floor (100 + 200).
#[tokio::test]
async fn scenario_a_retry_timing_floor() {
    let executor = RetryExecutor::new(RetryPolicy::new(
        3,
        Duration::from_millis(100),
        Duration::ZERO,
    ));

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let started = Instant::now();

    let result = executor
        .execute_with_retry(move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= 2 {
                    Err(DbError::Timeout(Duration::from_secs(5)))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(
        started.elapsed() >= Duration::from_millis(300),
        "elapsed {:?} below the pre-jitter backoff floor",
        started.elapsed()
    );
}

/// Scenario B: threshold 3; three consecutive failing probes flip health
/// true -> false on the third, and a single subsequent success flips it
/// back immediately. Listeners observe both transitions, in order.
#[tokio::test]
async fn scenario_b_hysteresis_transitions() {
    let db = FakeDb::new(vec![false, false, false, true], true);
    let monitor = Arc::new(HealthMonitor::new(
        Arc::clone(&db) as Arc<dyn DatabaseClient>,
        HealthCheckConfig {
            max_consecutive_failures: 3,
            ..Default::default()
        },
    ));

    let transitions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&transitions);
    let _handle = monitor.register_health_listener(move |healthy| sink.lock().push(healthy));

    assert!(monitor.force_health_check().await); // failure 1
    assert!(monitor.force_health_check().await); // failure 2
    assert!(!monitor.force_health_check().await); // failure 3: flips
    assert!(monitor.force_health_check().await); // success: flips back

    assert_eq!(*transitions.lock(), vec![false, true]);

    // Both transitions were audited
    let events = db.events.lock();
    assert_eq!(events.len(), 2);
}

/// A read degrades to its fallback while the database is down, then serves
/// real data once probes recover; the write path surfaces the failure and
/// still releases its handle.
#[tokio::test]
async fn degraded_read_and_failing_write() {
    let db = FakeDb::new(vec![], true);
    let ops = SafeOperations::new(
        Arc::clone(&db) as Arc<dyn DatabaseClient>,
        RetryPolicy::new(2, Duration::from_millis(1), Duration::ZERO),
    );

    let fallback_rows = ops
        .safe_db_read(
            || async { Err::<Vec<&str>, _>(DbError::PoolExhausted("0 free".into())) },
            Some(vec![]),
        )
        .await
        .unwrap();
    assert!(fallback_rows.is_empty());

    let write_result: Result<(), DbError> = ops
        .safe_db_write(|| async { Err(DbError::PoolExhausted("0 free".into())) })
        .await;
    assert!(matches!(write_result, Err(DbError::PoolExhausted(_))));
    assert_eq!(db.release_count.load(Ordering::SeqCst), 1);

    let real_rows = ops
        .safe_db_read(|| async { Ok::<_, DbError>(vec!["row"]) }, Some(vec![]))
        .await
        .unwrap();
    assert_eq!(real_rows, vec!["row"]);
}

/// The connection manager reconnects after an outage and gives up at its
/// attempt ceiling when the outage persists.
#[tokio::test]
async fn reconnect_recovers_then_respects_ceiling() {
    // Outage: startup probe ok, then two failed cycles before recovery
    let db = FakeDb::new(vec![true, false, false, true], true);
    let manager = Arc::new(ConnectionManager::new(
        Arc::clone(&db) as Arc<dyn DatabaseClient>,
        ConnectionConfig {
            max_reconnect_attempts: 5,
            base_reconnect_delay_ms: 1,
            ..Default::default()
        },
        HealthCheckConfig::default(),
    ));

    manager.initialize().await;
    assert!(manager.is_connected_to_database());

    // Connection drops; the manager reconnects within the ceiling
    manager.attempt_reconnect().await;
    let state = manager.state();
    assert!(state.is_connected);
    assert_eq!(state.reconnect_attempts, 0);

    // Permanent outage: a fresh manager exhausts its ceiling and stops
    let dead = FakeDb::new(vec![], false);
    let manager = Arc::new(ConnectionManager::new(
        Arc::clone(&dead) as Arc<dyn DatabaseClient>,
        ConnectionConfig {
            max_reconnect_attempts: 3,
            base_reconnect_delay_ms: 1,
            ..Default::default()
        },
        HealthCheckConfig::default(),
    ));

    manager.attempt_reconnect().await;
    assert_eq!(manager.state().reconnect_attempts, 3);
    assert!(!manager.is_connected_to_database());
    assert_eq!(dead.ping_count.load(Ordering::SeqCst), 3);

    manager.shutdown().await;
}

/// The periodic tasks start, probe, and stop cleanly on teardown.
#[tokio::test]
async fn periodic_tasks_start_and_stop() {
    let db = FakeDb::new(vec![], true);
    let config = HealthCheckConfig {
        enabled: true,
        interval_seconds: 1,
        ..Default::default()
    };

    let manager = Arc::new(ConnectionManager::new(
        Arc::clone(&db) as Arc<dyn DatabaseClient>,
        ConnectionConfig::default(),
        config.clone(),
    ));
    let monitor = Arc::new(HealthMonitor::new(
        Arc::clone(&db) as Arc<dyn DatabaseClient>,
        config,
    ));

    manager.initialize().await;
    manager.start_health_check();
    monitor.start();

    // The monitor's interval ticks immediately; give it a moment to probe
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(db.ping_count.load(Ordering::SeqCst) >= 2);

    manager.shutdown().await;
    monitor.cleanup();

    let settled = db.ping_count.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    // No further probes after teardown (intervals are 1s, none was due)
    assert_eq!(db.ping_count.load(Ordering::SeqCst), settled);
}
