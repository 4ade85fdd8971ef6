use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Independent logical event channels. Each bus has its own queue, pump
/// task, throttle, and metrics; there is no ordering guarantee across buses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// Plugin lifecycle events
    Plugin,
    /// System internal events
    System,
    /// Business events emitted by plugins
    Business,
    /// Health check events
    Health,
    /// Configuration events
    Config,
    /// Resource management events
    Resource,
    /// Security events
    Security,
    /// Monitoring metrics events
    Metrics,
}

impl BusKind {
    /// All buses, in a stable order.
    pub const ALL: [BusKind; 8] = [
        BusKind::Plugin,
        BusKind::System,
        BusKind::Business,
        BusKind::Health,
        BusKind::Config,
        BusKind::Resource,
        BusKind::Security,
        BusKind::Metrics,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BusKind::Plugin => "plugin",
            BusKind::System => "system",
            BusKind::Business => "business",
            BusKind::Health => "health",
            BusKind::Config => "config",
            BusKind::Resource => "resource",
            BusKind::Security => "security",
            BusKind::Metrics => "metrics",
        }
    }
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Enumerated domain tags for events flowing through the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    // Plugin lifecycle
    PluginInitializing,
    PluginInitialized,
    PluginStarting,
    PluginStarted,
    PluginStopping,
    PluginStopped,
    PluginFailed,

    // Health
    HealthOk,
    HealthWarning,
    HealthCritical,
    HealthCheckFailed,

    // Configuration
    ConfigChanged,
    ConfigInvalid,
    ConfigApplied,

    // Dependencies
    DependencyMissing,
    DependencyError,

    // Resources
    ResourceCreated,
    ResourceModified,
    ResourceRemoved,
    ResourceExhausted,

    // System
    SystemStart,
    SystemShutdown,
    SystemError,
    ErrorOccurred,
    PanicRecovered,

    // Security
    SecurityViolation,
    AuthenticationFailed,

    // Metrics
    MetricsSnapshot,
}

impl EventKind {
    /// Dotted wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::PluginInitializing => "plugin.initializing",
            EventKind::PluginInitialized => "plugin.initialized",
            EventKind::PluginStarting => "plugin.starting",
            EventKind::PluginStarted => "plugin.started",
            EventKind::PluginStopping => "plugin.stopping",
            EventKind::PluginStopped => "plugin.stopped",
            EventKind::PluginFailed => "plugin.failed",
            EventKind::HealthOk => "health.ok",
            EventKind::HealthWarning => "health.warning",
            EventKind::HealthCritical => "health.critical",
            EventKind::HealthCheckFailed => "health.check_failed",
            EventKind::ConfigChanged => "config.changed",
            EventKind::ConfigInvalid => "config.invalid",
            EventKind::ConfigApplied => "config.applied",
            EventKind::DependencyMissing => "dependency.missing",
            EventKind::DependencyError => "dependency.error",
            EventKind::ResourceCreated => "resource.created",
            EventKind::ResourceModified => "resource.modified",
            EventKind::ResourceRemoved => "resource.removed",
            EventKind::ResourceExhausted => "resource.exhausted",
            EventKind::SystemStart => "system.start",
            EventKind::SystemShutdown => "system.shutdown",
            EventKind::SystemError => "system.error",
            EventKind::ErrorOccurred => "error.occurred",
            EventKind::PanicRecovered => "error.panic_recovered",
            EventKind::SecurityViolation => "security.violation",
            EventKind::AuthenticationFailed => "security.auth_failed",
            EventKind::MetricsSnapshot => "metrics.snapshot",
        }
    }

    /// The bus this kind is routed to when published without an explicit
    /// bus override.
    pub fn default_bus(&self) -> BusKind {
        match self {
            EventKind::PluginInitializing
            | EventKind::PluginInitialized
            | EventKind::PluginStarting
            | EventKind::PluginStarted
            | EventKind::PluginStopping
            | EventKind::PluginStopped
            | EventKind::PluginFailed => BusKind::Plugin,
            EventKind::HealthOk
            | EventKind::HealthWarning
            | EventKind::HealthCritical
            | EventKind::HealthCheckFailed => BusKind::Health,
            EventKind::ConfigChanged | EventKind::ConfigInvalid | EventKind::ConfigApplied => {
                BusKind::Config
            }
            EventKind::DependencyMissing | EventKind::DependencyError => BusKind::Plugin,
            EventKind::ResourceCreated
            | EventKind::ResourceModified
            | EventKind::ResourceRemoved
            | EventKind::ResourceExhausted => BusKind::Resource,
            EventKind::SystemStart
            | EventKind::SystemShutdown
            | EventKind::SystemError
            | EventKind::ErrorOccurred
            | EventKind::PanicRecovered => BusKind::System,
            EventKind::SecurityViolation | EventKind::AuthenticationFailed => BusKind::Security,
            EventKind::MetricsSnapshot => BusKind::Metrics,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Event priority level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventPriority {
    /// Lowest priority, processed last
    Low = 0,
    /// Normal priority, processed in the middle
    Normal = 1,
    /// High priority, processed first
    High = 2,
    /// Critical priority, processed immediately
    Critical = 3,
}

impl Default for EventPriority {
    fn default() -> Self {
        EventPriority::Normal
    }
}

/// An immutable event record.
///
/// Constructed once via [`BusEvent::new`] plus the builder-style `with_*`
/// methods, then published; nothing mutates an event after publication.
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub kind: EventKind,
    pub priority: EventPriority,
    pub category: String,
    /// Logical emitter, e.g. a plugin name or "plugin-manager".
    pub source: String,
    /// Unique instance id of the plugin this event concerns; empty for
    /// system-level events.
    pub plugin_id: String,
    /// Free-form status snapshot, e.g. "active" or "failed".
    pub status: String,
    /// Unix timestamp (seconds).
    pub timestamp: i64,
    pub metadata: HashMap<String, Value>,
    pub error: Option<String>,
}

impl BusEvent {
    pub fn new(kind: EventKind, plugin_id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind,
            priority: EventPriority::Normal,
            category: "default".to_string(),
            source: source.into(),
            plugin_id: plugin_id.into(),
            status: String::new(),
            timestamp: unix_timestamp(),
            metadata: HashMap::new(),
            error: None,
        }
    }

    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Current Unix timestamp in seconds.
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
