//! Channel Registry
//!
//! Owns every live channel, grouped by scope. A scope is one UI view or feature
//! instance; registering it builds its channels, wraps each in a [`QueuedChannel`],
//! hands each to the [`HealthMonitor`], and fires a first readiness probe for all of
//! them together. Closing the scope tears all of that down again.

use crate::channel::{ChannelConfig, ChannelOptions};
use crate::config::UniformConfig;
use crate::context::ExecutionContext;
use crate::factory::ChannelFactory;
use crate::health::{ChannelHealthRecord, HealthMonitor, HealthProbe};
use crate::queue::{QueueStatus, QueuedChannel};
use crate::telemetry::{EventBus, QueueEventData};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Identity of a registered channel: `scope:channel`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryKey {
    pub scope: String,
    pub channel: String,
}

impl RegistryKey {
    pub fn new(scope: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.channel)
    }
}

#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Period of each channel's health probe
    pub health_interval: Duration,
    /// Fallbacks for options a channel config leaves unset
    pub defaults: ChannelOptions,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_millis(30_000),
            defaults: ChannelOptions {
                timeout_ms: Some(30_000),
                retries: Some(0),
                retry_delay_ms: Some(250),
                ..Default::default()
            },
        }
    }
}

/// Outcome of [`ChannelRegistry::register_scope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeRegistration {
    pub scope: String,
    pub channels: Vec<String>,
    /// Channels registered as no-op stubs because their transport is unavailable
    pub unavailable: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelStatus {
    pub queue: QueueStatus,
    pub health: Option<ChannelHealthRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeStatus {
    pub channels: Vec<String>,
    /// Every channel has had its first readiness probe attempted
    pub settled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatus {
    pub context: ExecutionContext,
    pub scopes: BTreeMap<String, ScopeStatus>,
    pub channels: BTreeMap<String, ChannelStatus>,
}

struct ScopeEntry {
    names: Vec<String>,
    settled: watch::Receiver<bool>,
    initializer: Option<JoinHandle<()>>,
}

pub struct ChannelRegistry {
    factory: Arc<ChannelFactory>,
    monitor: HealthMonitor,
    settings: RegistrySettings,
    channels: RwLock<HashMap<RegistryKey, QueuedChannel>>,
    scopes: RwLock<HashMap<String, ScopeEntry>>,
    events: Option<EventBus>,
}

impl ChannelRegistry {
    pub fn new(factory: Arc<ChannelFactory>, monitor: HealthMonitor, settings: RegistrySettings) -> Self {
        Self {
            factory,
            monitor,
            settings,
            channels: RwLock::new(HashMap::new()),
            scopes: RwLock::new(HashMap::new()),
            events: None,
        }
    }

    /// Registry with its own monitor, both configured from `[channels]` and `[health]`.
    pub fn from_config(factory: Arc<ChannelFactory>, config: &UniformConfig) -> Self {
        let monitor = HealthMonitor::new(config.health.settings());
        Self::new(factory, monitor, config.registry_settings())
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn context(&self) -> ExecutionContext {
        self.factory.context()
    }

    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    /// Register `configs` under `scope`, replacing any live registration of the same
    /// scope. Unavailable transports are registered as no-op stubs rather than
    /// rejected. Initial readiness probes start in the background; see
    /// [`wait_for_scope`](Self::wait_for_scope).
    pub fn register_scope(&self, scope: &str, configs: Vec<ChannelConfig>) -> ScopeRegistration {
        if self.scopes.read().contains_key(scope) {
            info!(scope, "Replacing live scope registration");
            self.close_scope(scope);
        }

        let context = self.context();
        let mut names: Vec<String> = Vec::new();
        let mut unavailable = Vec::new();
        let mut probe_keys = Vec::new();

        for config in configs {
            let ChannelConfig {
                name,
                descriptor,
                options,
            } = config;
            let key = RegistryKey::new(scope, &name);
            let transport = descriptor.kind();

            if let Err(reason) = self.factory.availability(&descriptor) {
                warn!(
                    scope,
                    channel = %name,
                    transport = %transport,
                    context = %context,
                    reason = %reason,
                    "Transport unavailable; registering no-op channel"
                );
                self.emit(
                    "channel_unavailable",
                    QueueEventData {
                        key: key.to_string(),
                        transport: transport.to_string(),
                        queued: None,
                        reason: Some(reason),
                    },
                );
                unavailable.push(name.clone());
            }

            let options = options.or(&self.settings.defaults);
            let channel = QueuedChannel::new(self.factory.create(&name, descriptor), options);

            let replaced = self.channels.write().insert(key.clone(), channel.clone());
            if let Some(previous) = replaced {
                debug!(key = %key, "Duplicate channel name in scope; replacing");
                previous.close();
            }

            let probe: Arc<dyn HealthProbe> = Arc::new(channel);
            self.monitor
                .register_health_check(key.to_string(), probe, self.settings.health_interval);

            if !names.contains(&name) {
                names.push(name);
                probe_keys.push(key.to_string());
            }
            self.emit(
                "channel_registered",
                QueueEventData {
                    key: key.to_string(),
                    transport: transport.to_string(),
                    queued: None,
                    reason: None,
                },
            );
        }

        let (settled_tx, settled) = watch::channel(probe_keys.is_empty());
        let initializer = match Handle::try_current() {
            Ok(handle) if !probe_keys.is_empty() => {
                let monitor = self.monitor.clone();
                Some(handle.spawn(async move {
                    join_all(probe_keys.iter().map(|key| monitor.check_now(key))).await;
                    settled_tx.send_replace(true);
                }))
            }
            _ => {
                settled_tx.send_replace(true);
                None
            }
        };

        info!(scope, channels = names.len(), unavailable = unavailable.len(), "Registered scope");
        self.scopes.write().insert(
            scope.to_string(),
            ScopeEntry {
                names: names.clone(),
                settled,
                initializer,
            },
        );

        ScopeRegistration {
            scope: scope.to_string(),
            channels: names,
            unavailable,
        }
    }

    pub fn get(&self, scope: &str, name: &str) -> Option<QueuedChannel> {
        self.channels
            .read()
            .get(&RegistryKey::new(scope, name))
            .cloned()
    }

    /// Resolves once every channel in `scope` has had its first readiness probe
    /// attempted, whatever the outcome. Returns at once for an unknown scope.
    pub async fn wait_for_scope(&self, scope: &str) {
        let settled = self.scopes.read().get(scope).map(|entry| entry.settled.clone());
        if let Some(mut settled) = settled {
            let _ = settled.wait_for(|settled| *settled).await;
        }
    }

    pub fn is_scope_settled(&self, scope: &str) -> bool {
        self.scopes
            .read()
            .get(scope)
            .map(|entry| *entry.settled.borrow())
            .unwrap_or(false)
    }

    /// Close every channel in `scope` and drop its health checks. Returns the number of
    /// channels closed; unknown scopes are a no-op.
    pub fn close_scope(&self, scope: &str) -> usize {
        let Some(entry) = self.scopes.write().remove(scope) else {
            return 0;
        };
        if let Some(initializer) = entry.initializer {
            initializer.abort();
        }

        let mut closed = 0;
        for name in &entry.names {
            let key = RegistryKey::new(scope, name);
            let removed = self.channels.write().remove(&key);
            if let Some(channel) = removed {
                let status = channel.status();
                channel.close();
                closed += 1;
                self.emit(
                    "channel_closed",
                    QueueEventData {
                        key: key.to_string(),
                        transport: status.transport.to_string(),
                        queued: Some(status.stats.pending),
                        reason: None,
                    },
                );
            }
            self.monitor.unregister(&key.to_string());
        }

        info!(scope, closed, "Closed scope");
        if let Some(events) = &self.events {
            events.emit_best_effort("scope_closed", json!({ "scope": scope, "closed": closed }));
        }
        closed
    }

    pub fn close_all(&self) -> usize {
        self.list_scopes()
            .iter()
            .map(|scope| self.close_scope(scope))
            .sum()
    }

    /// Live scope ids, sorted
    pub fn list_scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self.scopes.read().keys().cloned().collect();
        scopes.sort();
        scopes
    }

    /// Every live `scope:channel` key, sorted
    pub fn list_channel_names(&self) -> Vec<String> {
        let mut keys: Vec<RegistryKey> = self.channels.read().keys().cloned().collect();
        keys.sort();
        keys.iter().map(ToString::to_string).collect()
    }

    pub fn scope_channels(&self, scope: &str) -> Vec<String> {
        self.scopes
            .read()
            .get(scope)
            .map(|entry| entry.names.clone())
            .unwrap_or_default()
    }

    pub fn get_all_health_statuses(&self) -> HashMap<String, ChannelHealthRecord> {
        self.monitor.get_all_health_statuses()
    }

    pub fn status(&self) -> RegistryStatus {
        let scopes = self
            .scopes
            .read()
            .iter()
            .map(|(scope, entry)| {
                (
                    scope.clone(),
                    ScopeStatus {
                        channels: entry.names.clone(),
                        settled: *entry.settled.borrow(),
                    },
                )
            })
            .collect();

        let channels = self
            .channels
            .read()
            .iter()
            .map(|(key, channel)| {
                let key = key.to_string();
                let status = ChannelStatus {
                    queue: channel.status(),
                    health: self.monitor.get_health(&key),
                };
                (key, status)
            })
            .collect();

        RegistryStatus {
            context: self.context(),
            scopes,
            channels,
        }
    }

    fn emit(&self, event_type: &str, data: QueueEventData) {
        if let Some(events) = &self.events {
            events.emit_best_effort(event_type, json!(data));
        }
    }
}
