use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;

use crate::config::ConfigStore;
use crate::event::{BusEvent, EventBusManager, EventFilter, EventKind, listener_fn};
use crate::resource::{ResourceRegistry, ResourceSystemError};
use crate::runtime::PluginRuntime;
use crate::tests::common::wait_until;

fn facade_for(plugin_id: &str, prefix: &str, config: ConfigStore) -> (PluginRuntime, Arc<ResourceRegistry>, Arc<EventBusManager>) {
    let resources = Arc::new(ResourceRegistry::new());
    let events = Arc::new(EventBusManager::with_defaults());
    let runtime = PluginRuntime::new(
        "demo",
        plugin_id,
        prefix,
        Arc::new(config),
        Arc::clone(&resources),
        Arc::clone(&events),
    );
    (runtime, resources, events)
}

#[derive(Debug, Deserialize, PartialEq)]
struct DemoSettings {
    endpoint: String,
}

#[test]
fn test_scan_config_scoped_to_prefix() {
    let config = ConfigStore::from_json_str(
        r#"{"kestrel": {"plugins": {"demo": {"endpoint": "localhost:9000"}}}}"#,
    )
    .unwrap();
    let (runtime, _, _) = facade_for("demo@1.0.0#1", "kestrel.plugins.demo", config);

    let settings: DemoSettings = runtime.scan_config().unwrap();
    assert_eq!(settings.endpoint, "localhost:9000");
    assert!(runtime.config_section().is_some());
}

#[test]
fn test_private_resources_are_scoped_to_owner() {
    let resources = Arc::new(ResourceRegistry::new());
    let events = Arc::new(EventBusManager::with_defaults());
    let config = Arc::new(ConfigStore::empty());

    let mine = PluginRuntime::new(
        "mine",
        "mine@1.0.0#1",
        "",
        Arc::clone(&config),
        Arc::clone(&resources),
        Arc::clone(&events),
    );
    let theirs = PluginRuntime::new(
        "theirs",
        "theirs@1.0.0#2",
        "",
        config,
        resources,
        events,
    );

    mine.register_private_resource("conn", AtomicU64::new(7)).unwrap();

    // Reachable through the owning facade only.
    assert_eq!(
        mine.get_private_resource::<AtomicU64>("conn")
            .unwrap()
            .load(Ordering::SeqCst),
        7
    );
    assert!(matches!(
        theirs.get_private_resource::<AtomicU64>("conn"),
        Err(ResourceSystemError::NotFound { .. })
    ));

    // A second registration through the same facade is refused.
    assert!(matches!(
        mine.register_private_resource("conn", AtomicU64::new(8)),
        Err(ResourceSystemError::AlreadyRegistered { .. })
    ));
}

#[test]
fn test_shared_resources_cross_facades() {
    let (runtime, resources, _) = facade_for("a@1.0.0#1", "", ConfigStore::empty());
    runtime.register_shared_resource("release", "v42".to_string());
    // Later registration wins silently.
    runtime.register_shared_resource("release", "v43".to_string());

    assert_eq!(*runtime.get_shared_resource::<String>("release").unwrap(), "v43");
    assert_eq!(*resources.get_shared_typed::<String>("release").unwrap(), "v43");

    let listed = runtime.list_resources();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].private);
}

#[tokio::test]
async fn test_emit_event_stamps_identity() {
    let (runtime, _, events) = facade_for("demo@1.0.0#9", "", ConfigStore::empty());
    let seen: Arc<Mutex<Vec<BusEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    events
        .add_listener(
            "capture",
            EventFilter::new(),
            listener_fn(move |event| {
                seen_clone
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(event.clone());
            }),
            EventKind::ResourceCreated.default_bus(),
        )
        .unwrap();
    events.start_all();

    let mut metadata = HashMap::new();
    metadata.insert("resource".to_string(), "cache-conn".into());
    runtime.emit_event(EventKind::ResourceCreated, metadata).unwrap();

    wait_until(|| !seen.lock().unwrap_or_else(PoisonError::into_inner).is_empty()).await;
    let captured = seen.lock().unwrap_or_else(PoisonError::into_inner)[0].clone();
    assert_eq!(captured.plugin_id, "demo@1.0.0#9");
    assert_eq!(captured.source, "demo");
    assert_eq!(captured.kind, EventKind::ResourceCreated);
    assert!(captured.timestamp > 0);
    assert_eq!(captured.metadata["resource"], "cache-conn");

    assert_eq!(runtime.event_metrics().published, 1);
    assert_eq!(runtime.bus_status().len(), 8);
}
