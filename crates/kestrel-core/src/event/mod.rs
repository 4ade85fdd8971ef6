//! # Kestrel Core Event System
//!
//! A set of independent logical channels ("buses"), each a bounded,
//! filterable, optionally-throttled pub/sub queue with asynchronous
//! delivery. Publishing never blocks the publisher: excess events are
//! dropped and counted, never silently lost. Delivery preserves publish
//! order per listener within one bus; there is no ordering guarantee
//! across buses.
pub mod bus;
pub mod error;
pub mod filter;
pub mod manager;
pub mod metrics;
pub mod types;

pub use bus::{
    BusConfig, BusStatus, DropReason, ErrorCallback, EventBus, EventListener, ThrottleConfig,
    listener_fn,
};
pub use filter::EventFilter;
pub use manager::{EventBusManager, EventSystemHealth, bus_configs_from, default_bus_configs};
pub use metrics::MetricsSnapshot;
pub use types::{BusEvent, BusKind, EventKind, EventPriority, unix_timestamp};

#[cfg(test)]
mod tests;
