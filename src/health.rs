//! Health Monitor
//!
//! Runs a liveness probe per registered key on its own repeating timer and keeps the
//! latest [`ChannelHealthRecord`] for each. Probes are bounded by a timeout and a
//! panicking probe counts as a failure, so one bad probe never stops the others.

use crate::telemetry::{ChannelEvent, EventBus, HealthEventData};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Liveness check for one channel.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Result<(), String>;
}

#[async_trait]
impl<F, Fut> HealthProbe for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), String>> + Send,
{
    async fn probe(&self) -> Result<(), String> {
        (self)().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelHealthRecord {
    pub key: String,
    pub healthy: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl ChannelHealthRecord {
    fn unchecked(key: &str) -> Self {
        Self {
            key: key.to_string(),
            healthy: false,
            last_checked_at: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSettings {
    /// Consecutive failures after which a key is reported unhealthy
    pub failure_threshold: u32,
    /// Upper bound on a single probe
    pub probe_timeout: Duration,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 1,
            probe_timeout: Duration::from_millis(5_000),
        }
    }
}

struct Registration {
    id: u64,
    probe: Arc<dyn HealthProbe>,
    timer: Option<JoinHandle<()>>,
}

struct MonitorInner {
    settings: HealthSettings,
    records: RwLock<HashMap<String, (u64, ChannelHealthRecord)>>,
    registrations: Mutex<HashMap<String, Registration>>,
    next_id: AtomicU64,
    events: EventBus,
}

/// Cheap to clone; clones observe the same records. Timers stop once the last clone
/// is dropped.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(HealthSettings::default())
    }
}

impl HealthMonitor {
    pub fn new(settings: HealthSettings) -> Self {
        Self::with_event_bus(settings, EventBus::new())
    }

    pub fn with_event_bus(settings: HealthSettings, events: EventBus) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                settings: HealthSettings {
                    failure_threshold: settings.failure_threshold.max(1),
                    ..settings
                },
                records: RwLock::new(HashMap::new()),
                registrations: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                events,
            }),
        }
    }

    pub fn settings(&self) -> HealthSettings {
        self.inner.settings
    }

    /// Health transitions as `health_changed` events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.inner.events.subscribe()
    }

    /// Probe `key` every `interval`, starting one interval from now. Re-registering a
    /// key replaces its probe and resets its record.
    pub fn register_health_check(
        &self,
        key: impl Into<String>,
        probe: Arc<dyn HealthProbe>,
        interval: Duration,
    ) {
        let key = key.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        self.inner
            .records
            .write()
            .insert(key.clone(), (id, ChannelHealthRecord::unchecked(&key)));

        let timer = match Handle::try_current() {
            Ok(handle) if !interval.is_zero() => Some(handle.spawn(run_timer(
                Arc::downgrade(&self.inner),
                key.clone(),
                id,
                Arc::clone(&probe),
                interval,
            ))),
            Ok(_) => {
                warn!(key = %key, "Zero health check interval; periodic probing disabled");
                None
            }
            Err(_) => {
                warn!(key = %key, "No async runtime; periodic probing disabled");
                None
            }
        };

        let previous = self
            .inner
            .registrations
            .lock()
            .insert(key.clone(), Registration { id, probe, timer });
        if let Some(previous) = previous {
            previous.abort();
        }
        debug!(key = %key, interval_ms = interval.as_millis() as u64, "Registered health check");
    }

    /// Run the probe for `key` once, now. `None` if nothing is registered under `key`.
    pub async fn check_now(&self, key: &str) -> Option<ChannelHealthRecord> {
        let (id, probe) = {
            let registrations = self.inner.registrations.lock();
            let registration = registrations.get(key)?;
            (registration.id, Arc::clone(&registration.probe))
        };
        self.inner.run_probe(key, id, probe.as_ref()).await
    }

    /// Stop probing `key` and forget its record.
    pub fn unregister(&self, key: &str) -> bool {
        let removed = self.inner.registrations.lock().remove(key);
        self.inner.records.write().remove(key);
        match removed {
            Some(registration) => {
                registration.abort();
                debug!(key, "Unregistered health check");
                true
            }
            None => false,
        }
    }

    pub fn get_health(&self, key: &str) -> Option<ChannelHealthRecord> {
        self.inner
            .records
            .read()
            .get(key)
            .map(|(_, record)| record.clone())
    }

    pub fn get_all_health_statuses(&self) -> HashMap<String, ChannelHealthRecord> {
        self.inner
            .records
            .read()
            .iter()
            .map(|(key, (_, record))| (key.clone(), record.clone()))
            .collect()
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.registrations.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Stop every timer and drop every record.
    pub fn shutdown(&self) {
        let registrations: Vec<_> = self.inner.registrations.lock().drain().collect();
        self.inner.records.write().clear();
        for (_, registration) in registrations {
            registration.abort();
        }
    }
}

impl Registration {
    fn abort(self) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
    }
}

async fn run_timer(
    monitor: Weak<MonitorInner>,
    key: String,
    id: u64,
    probe: Arc<dyn HealthProbe>,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = monitor.upgrade() else {
            break;
        };
        if inner.run_probe(&key, id, probe.as_ref()).await.is_none() {
            break;
        }
    }
}

impl MonitorInner {
    async fn run_probe(
        &self,
        key: &str,
        id: u64,
        probe: &dyn HealthProbe,
    ) -> Option<ChannelHealthRecord> {
        let budget = self.settings.probe_timeout;
        let outcome = AssertUnwindSafe(tokio::time::timeout(budget, probe.probe()))
            .catch_unwind()
            .await;
        let outcome = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(format!("probe timed out after {}ms", budget.as_millis())),
            Err(_) => Err("probe panicked".to_string()),
        };
        self.record(key, id, outcome)
    }

    /// Apply a probe outcome. Results for a replaced or removed registration are dropped.
    fn record(&self, key: &str, id: u64, outcome: Result<(), String>) -> Option<ChannelHealthRecord> {
        let (previous, updated) = {
            let mut records = self.records.write();
            let (current_id, record) = records.get_mut(key)?;
            if *current_id != id {
                return None;
            }
            let previous = record.last_checked_at.map(|_| record.healthy);

            record.last_checked_at = Some(Utc::now());
            match &outcome {
                Ok(()) => {
                    record.healthy = true;
                    record.consecutive_failures = 0;
                    record.last_error = None;
                }
                Err(error) => {
                    record.consecutive_failures = record.consecutive_failures.saturating_add(1);
                    record.last_error = Some(error.clone());
                    if record.consecutive_failures >= self.settings.failure_threshold {
                        record.healthy = false;
                    }
                }
            }
            (previous, record.clone())
        };

        if let Err(error) = &outcome {
            warn!(
                key,
                consecutive_failures = updated.consecutive_failures,
                error = %error,
                "Health check failed"
            );
        }

        if previous != Some(updated.healthy) {
            info!(key, healthy = updated.healthy, "Channel health changed");
            self.events.emit_best_effort(
                "health_changed",
                json!(HealthEventData {
                    key: key.to_string(),
                    healthy: updated.healthy,
                    consecutive_failures: updated.consecutive_failures,
                    error: updated.last_error.clone(),
                }),
            );
        }
        Some(updated)
    }
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        for (_, registration) in self.registrations.get_mut().drain() {
            registration.abort();
        }
    }
}
