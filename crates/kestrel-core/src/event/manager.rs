use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ConfigStore;
use crate::event::bus::{BusConfig, BusStatus, EventBus, EventListener, ThrottleConfig};
use crate::event::error::EventSystemError;
use crate::event::filter::EventFilter;
use crate::event::metrics::MetricsSnapshot;
use crate::event::types::{BusEvent, BusKind, EventKind};
use crate::kernel::component::KernelComponent;
use crate::kernel::error::Result;

/// Tuned defaults for each of the fixed channels. Lifecycle and system
/// buses favor reliability over volume; the business bus favors volume.
pub fn default_bus_configs() -> HashMap<BusKind, BusConfig> {
    let mut configs = HashMap::new();
    for kind in BusKind::ALL {
        let (capacity, history_size) = match kind {
            BusKind::Plugin => (2048, 512),
            BusKind::System => (1024, 128),
            BusKind::Business => (4096, 512),
            BusKind::Health => (512, 128),
            BusKind::Config => (256, 64),
            BusKind::Resource => (512, 128),
            BusKind::Security => (256, 128),
            BusKind::Metrics => (1024, 0),
        };
        configs.insert(
            kind,
            BusConfig {
                capacity,
                history_size,
                ..BusConfig::default()
            },
        );
    }
    configs
}

/// Overrides scanned from `kestrel.events.<bus>`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct BusSettings {
    capacity: Option<usize>,
    enabled: Option<bool>,
    throttle_rate: Option<u32>,
    throttle_burst: Option<u32>,
    history_size: Option<usize>,
    shutdown_grace_ms: Option<u64>,
}

/// Build per-bus configurations from the defaults plus any configured
/// overrides.
pub fn bus_configs_from(config: &ConfigStore) -> HashMap<BusKind, BusConfig> {
    let mut configs = default_bus_configs();
    for (kind, bus_config) in configs.iter_mut() {
        let prefix = format!("kestrel.events.{}", kind.name());
        if config.section(&prefix).is_none() {
            continue;
        }
        let settings: BusSettings = match config.scan(&prefix) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("ignoring invalid settings for bus '{}': {}", kind, e);
                continue;
            }
        };
        if let Some(capacity) = settings.capacity {
            bus_config.capacity = capacity;
        }
        if let Some(enabled) = settings.enabled {
            bus_config.enabled = enabled;
        }
        if let (Some(rate), Some(burst)) = (settings.throttle_rate, settings.throttle_burst) {
            bus_config.throttle = Some(ThrottleConfig {
                rate_per_sec: rate,
                burst,
            });
        }
        if let Some(history_size) = settings.history_size {
            bus_config.history_size = history_size;
        }
        if let Some(grace_ms) = settings.shutdown_grace_ms {
            bus_config.shutdown_grace = Duration::from_millis(grace_ms);
        }
    }
    configs
}

/// Process-wide event system health for monitoring.
#[derive(Debug, Clone)]
pub struct EventSystemHealth {
    pub healthy: bool,
    pub buses: Vec<BusStatus>,
}

/// Owns the fixed set of buses and routes publishes and listener
/// operations to them.
///
/// Constructed once at bootstrap and passed by `Arc` into the plugin
/// manager and every runtime facade; there is no process-global instance.
pub struct EventBusManager {
    // Indexed by BusKind discriminant, in BusKind::ALL order.
    buses: Vec<Arc<EventBus>>,
    next_subscription: AtomicU64,
}

impl fmt::Debug for EventBusManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBusManager")
            .field("buses", &self.buses.len())
            .finish_non_exhaustive()
    }
}

impl EventBusManager {
    /// Create the manager with one bus per [`BusKind`]. Missing entries in
    /// `configs` fall back to the default configuration.
    pub fn new(mut configs: HashMap<BusKind, BusConfig>) -> Self {
        let buses = BusKind::ALL
            .iter()
            .map(|kind| {
                let config = configs.remove(kind).unwrap_or_default();
                Arc::new(EventBus::new(*kind, config))
            })
            .collect();
        Self {
            buses,
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_bus_configs())
    }

    /// The bus for a kind. Every kind exists for the manager's lifetime.
    pub fn bus(&self, kind: BusKind) -> &Arc<EventBus> {
        &self.buses[kind as usize]
    }

    /// Publish on the event kind's default bus.
    pub fn publish(&self, event: BusEvent) -> std::result::Result<(), EventSystemError> {
        self.publish_to(event.kind.default_bus(), event)
    }

    /// Publish on an explicit bus.
    pub fn publish_to(
        &self,
        kind: BusKind,
        event: BusEvent,
    ) -> std::result::Result<(), EventSystemError> {
        self.bus(kind).publish(event)
    }

    pub fn add_listener(
        &self,
        id: impl Into<String>,
        filter: EventFilter,
        handler: Arc<dyn EventListener>,
        kind: BusKind,
    ) -> std::result::Result<(), EventSystemError> {
        self.bus(kind).add_listener(id, filter, handler)
    }

    /// Remove a listener by id from whichever buses carry it. Idempotent;
    /// returns whether any listener was removed.
    pub fn remove_listener(&self, id: &str) -> bool {
        let mut removed = false;
        for bus in &self.buses {
            removed |= bus.remove_listener(id);
        }
        removed
    }

    /// Convenience sugar over `add_listener`: subscribe a handler to one
    /// event kind on that kind's default bus. Returns the generated
    /// listener id for later removal.
    pub fn subscribe_to(
        &self,
        kind: EventKind,
        handler: Arc<dyn EventListener>,
    ) -> std::result::Result<String, EventSystemError> {
        let seq = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let id = format!("subscription:{}:{}", kind.name(), seq);
        let filter = EventFilter::new().with_kind(kind);
        self.add_listener(id.clone(), filter, handler, kind.default_bus())?;
        Ok(id)
    }

    pub fn bus_status(&self) -> Vec<BusStatus> {
        self.buses.iter().map(|b| b.status()).collect()
    }

    /// Delivered events retained by one bus, filtered.
    pub fn event_history(&self, kind: BusKind, filter: &EventFilter) -> Vec<BusEvent> {
        self.bus(kind).history(filter)
    }

    /// Sum of every bus's counters.
    pub fn aggregate_metrics(&self) -> MetricsSnapshot {
        let mut total = MetricsSnapshot::default();
        for bus in &self.buses {
            total.merge(&bus.metrics());
        }
        total
    }

    pub fn metrics_by_bus(&self) -> HashMap<BusKind, MetricsSnapshot> {
        self.buses.iter().map(|b| (b.kind(), b.metrics())).collect()
    }

    pub fn event_system_health(&self) -> EventSystemHealth {
        let buses = self.bus_status();
        EventSystemHealth {
            healthy: buses.iter().all(|b| b.healthy),
            buses,
        }
    }

    /// Start every bus's pump task. Requires a running tokio runtime.
    pub fn start_all(&self) {
        for bus in &self.buses {
            bus.start();
        }
    }

    /// Close every bus, each with its own configured grace period.
    pub async fn close_all(&self) {
        for bus in &self.buses {
            bus.close(bus.config().shutdown_grace).await;
        }
    }
}

#[async_trait]
impl KernelComponent for EventBusManager {
    fn name(&self) -> &'static str {
        "EventBusManager"
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.start_all();
        log::info!("event buses started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.close_all().await;
        log::info!("event buses closed");
        Ok(())
    }
}
