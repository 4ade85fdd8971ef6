//! # Kestrel Core
//!
//! The plugin orchestration runtime: a factory of named plugin
//! constructors, a manager driving each plugin through a
//! dependency-ordered lifecycle state machine, a private/shared resource
//! registry, a multi-channel filterable and throttleable event bus, a
//! per-plugin runtime facade, and a health aggregator.
pub mod config;
pub mod event;
pub mod health;
pub mod kernel;
pub mod plugin_system;
pub mod resource;
pub mod runtime;

// Re-export key public types for hosts and plugins.
pub use config::ConfigStore;
pub use event::{
    BusEvent, BusKind, EventBusManager, EventFilter, EventKind, EventListener, EventPriority,
    listener_fn,
};
pub use health::{HealthAggregator, HealthReport, SystemHealth};
pub use kernel::{Application, Error as KernelError, Result as KernelResult};
pub use plugin_system::{
    Plugin, PluginDescriptor, PluginFactory, PluginManager, PluginState, PluginSystemError,
};
pub use resource::ResourceRegistry;
pub use runtime::PluginRuntime;

#[cfg(test)]
mod tests;
