use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ConfigStore;
use crate::event::bus::listener_fn;
use crate::event::filter::EventFilter;
use crate::event::manager::{EventBusManager, bus_configs_from, default_bus_configs};
use crate::event::types::{BusEvent, BusKind, EventKind};
use crate::tests::common::wait_until;

fn lifecycle_event() -> BusEvent {
    BusEvent::new(EventKind::PluginStarted, "demo@1.0.0#1", "plugin-manager")
}

#[tokio::test]
async fn test_publish_routes_by_default_bus() {
    let manager = EventBusManager::with_defaults();
    let plugin_hits = Arc::new(AtomicU64::new(0));
    let system_hits = Arc::new(AtomicU64::new(0));

    let hits = Arc::clone(&plugin_hits);
    manager
        .add_listener(
            "on-plugin",
            EventFilter::new(),
            listener_fn(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }),
            BusKind::Plugin,
        )
        .unwrap();
    let hits = Arc::clone(&system_hits);
    manager
        .add_listener(
            "on-system",
            EventFilter::new(),
            listener_fn(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }),
            BusKind::System,
        )
        .unwrap();
    manager.start_all();

    manager.publish(lifecycle_event()).unwrap();
    wait_until(|| plugin_hits.load(Ordering::SeqCst) == 1).await;
    assert_eq!(system_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_subscribe_to_sugar() {
    let manager = EventBusManager::with_defaults();
    let hits = Arc::new(AtomicU64::new(0));
    let hits_clone = Arc::clone(&hits);
    let id = manager
        .subscribe_to(
            EventKind::PluginStarted,
            listener_fn(move |_| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
    manager.start_all();

    manager.publish(lifecycle_event()).unwrap();
    // A different kind on the same bus does not reach the subscription.
    manager
        .publish(BusEvent::new(
            EventKind::PluginStopped,
            "demo@1.0.0#1",
            "plugin-manager",
        ))
        .unwrap();

    wait_until(|| manager.bus(BusKind::Plugin).metrics().processed == 2).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    assert!(manager.remove_listener(&id));
    assert!(!manager.remove_listener(&id));
}

#[tokio::test]
async fn test_aggregate_metrics_sums_buses() {
    let manager = EventBusManager::with_defaults();
    manager
        .publish(lifecycle_event())
        .unwrap();
    manager
        .publish(BusEvent::new(EventKind::SystemStart, "", "kernel"))
        .unwrap();
    manager
        .publish(BusEvent::new(EventKind::HealthOk, "", "health-aggregator"))
        .unwrap();

    let total = manager.aggregate_metrics();
    assert_eq!(total.published, 3);
    assert_eq!(manager.bus(BusKind::Plugin).metrics().published, 1);
    assert_eq!(manager.bus(BusKind::System).metrics().published, 1);
    assert_eq!(manager.bus(BusKind::Health).metrics().published, 1);
}

#[tokio::test]
async fn test_event_system_health_reflects_closed_buses() {
    let manager = EventBusManager::with_defaults();
    manager.start_all();
    assert!(manager.event_system_health().healthy);

    manager.close_all().await;
    let health = manager.event_system_health();
    assert!(!health.healthy);
    assert!(health.buses.iter().all(|b| b.closed));
}

#[test]
fn test_bus_configs_from_overrides() {
    let config = ConfigStore::from_json_str(
        r#"{
            "kestrel": {
                "events": {
                    "business": {"capacity": 64, "throttle_rate": 100, "throttle_burst": 10},
                    "metrics": {"enabled": false}
                }
            }
        }"#,
    )
    .unwrap();

    let configs = bus_configs_from(&config);
    let business = &configs[&BusKind::Business];
    assert_eq!(business.capacity, 64);
    let throttle = business.throttle.unwrap();
    assert_eq!(throttle.rate_per_sec, 100);
    assert_eq!(throttle.burst, 10);
    assert!(!configs[&BusKind::Metrics].enabled);

    // Untouched buses keep their defaults.
    let defaults = default_bus_configs();
    assert_eq!(configs[&BusKind::Plugin].capacity, defaults[&BusKind::Plugin].capacity);
}
