//! # Kestrel Core Runtime Facade
//!
//! The capability object handed to each plugin during initialization.
//! It wraps the resource registry, event buses, and configuration access,
//! implicitly scoped to the owning plugin's identity — plugins never touch
//! manager internals, and the manager can swap or mock the underlying
//! pieces without plugins noticing.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ConfigStore;
use crate::config::error::ConfigSystemError;
use crate::event::EventBusManager;
use crate::event::bus::BusStatus;
use crate::event::error::EventSystemError;
use crate::event::filter::EventFilter;
use crate::event::metrics::MetricsSnapshot;
use crate::event::types::{BusEvent, BusKind, EventKind};
use crate::resource::{ResourceInfo, ResourceRegistry, ResourceSystemError};

/// Per-plugin capability facade.
///
/// Private-resource calls carry the plugin's own instance id implicitly, so
/// one plugin can never reach into another's private namespace; shared
/// resources and event publishing are open by design. Cloning is cheap and
/// keeps the same identity scope, so a plugin may hand clones to its
/// background tasks.
#[derive(Clone)]
pub struct PluginRuntime {
    plugin_name: String,
    plugin_id: String,
    config_prefix: String,
    config: Arc<ConfigStore>,
    resources: Arc<ResourceRegistry>,
    events: Arc<EventBusManager>,
}

impl fmt::Debug for PluginRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRuntime")
            .field("plugin_id", &self.plugin_id)
            .field("config_prefix", &self.config_prefix)
            .finish_non_exhaustive()
    }
}

impl PluginRuntime {
    pub fn new(
        plugin_name: &str,
        plugin_id: &str,
        config_prefix: &str,
        config: Arc<ConfigStore>,
        resources: Arc<ResourceRegistry>,
        events: Arc<EventBusManager>,
    ) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            plugin_id: plugin_id.to_string(),
            config_prefix: config_prefix.to_string(),
            config,
            resources,
            events,
        }
    }

    /// The unique instance id of the owning plugin.
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn config_prefix(&self) -> &str {
        &self.config_prefix
    }

    /// The whole configuration store; dependency decisions sometimes need
    /// to look outside the plugin's own section.
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Deserialize this plugin's own configuration section.
    pub fn scan_config<T: DeserializeOwned>(&self) -> Result<T, ConfigSystemError> {
        self.config.scan(&self.config_prefix)
    }

    /// This plugin's raw configuration subtree, if present.
    pub fn config_section(&self) -> Option<Value> {
        self.config.section(&self.config_prefix).cloned()
    }

    /// Register a resource private to this plugin. Fails if this plugin
    /// already registered the name.
    pub fn register_private_resource<T: Send + Sync + 'static>(
        &self,
        name: &str,
        value: T,
    ) -> Result<(), ResourceSystemError> {
        self.resources.register_private(&self.plugin_id, name, value)
    }

    /// Register (or replace) a resource visible to every plugin.
    pub fn register_shared_resource<T: Send + Sync + 'static>(&self, name: &str, value: T) {
        self.resources.register_shared(name, value);
    }

    pub fn get_private_resource<T: Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, ResourceSystemError> {
        self.resources.get_private_typed(&self.plugin_id, name)
    }

    pub fn get_shared_resource<T: Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, ResourceSystemError> {
        self.resources.get_shared_typed(name)
    }

    /// Snapshot of every registry entry, for diagnostics.
    pub fn list_resources(&self) -> Vec<ResourceInfo> {
        self.resources.list()
    }

    /// Publish an event stamped with this plugin's identity and the current
    /// timestamp on the kind's default bus.
    pub fn emit_event(
        &self,
        kind: EventKind,
        metadata: HashMap<String, Value>,
    ) -> Result<(), EventSystemError> {
        self.emit_event_with(kind, move |mut event| {
            event.metadata = metadata;
            event
        })
    }

    /// Like [`emit_event`](Self::emit_event) with full control over the
    /// event before publication.
    pub fn emit_event_with<F>(&self, kind: EventKind, build: F) -> Result<(), EventSystemError>
    where
        F: FnOnce(BusEvent) -> BusEvent,
    {
        let event = build(BusEvent::new(kind, &self.plugin_id, &self.plugin_name));
        self.events.publish(event)
    }

    /// Read access to per-bus status for diagnostics.
    pub fn bus_status(&self) -> Vec<BusStatus> {
        self.events.bus_status()
    }

    /// Delivered events retained by a bus, filtered, for diagnostics.
    pub fn event_history(&self, kind: BusKind, filter: &EventFilter) -> Vec<BusEvent> {
        self.events.event_history(kind, filter)
    }

    /// Aggregate event metrics across all buses.
    pub fn event_metrics(&self) -> MetricsSnapshot {
        self.events.aggregate_metrics()
    }
}

#[cfg(test)]
mod tests;
