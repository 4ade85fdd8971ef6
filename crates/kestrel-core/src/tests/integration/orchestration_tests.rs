//! Cross-subsystem scenarios exercising the manager, registry, buses, and
//! facade together through realistic plugin implementations.
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::config::ConfigStore;
use crate::event::{BusKind, EventBusManager, EventFilter, EventKind, listener_fn};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::{Plugin, PluginFactory, PluginManager, PluginState};
use crate::resource::ResourceRegistry;
use crate::runtime::PluginRuntime;
use crate::tests::common::wait_until;

/// Registers a shared counter resource and bumps it on startup.
#[derive(Clone)]
struct ProducerPlugin;

#[async_trait]
impl Plugin for ProducerPlugin {
    fn name(&self) -> &str {
        "producer"
    }

    fn version(&self) -> &str {
        "0.3.1"
    }

    fn description(&self) -> &str {
        "publishes a shared request counter"
    }

    fn weight(&self) -> i32 {
        10
    }

    fn config_prefix(&self) -> &str {
        "kestrel.plugins.producer"
    }

    async fn initialize_resources(
        &self,
        runtime: &PluginRuntime,
    ) -> Result<(), PluginSystemError> {
        runtime.register_shared_resource("requests", AtomicU64::new(0));
        runtime
            .register_private_resource("scratch", Mutex::new(Vec::<u8>::new()))
            .map_err(|e| PluginSystemError::InternalError(e.to_string()))?;
        runtime
            .emit_event_with(EventKind::ResourceCreated, |e| {
                e.with_metadata("name", "requests")
            })
            .map_err(|e| PluginSystemError::InternalError(e.to_string()))?;
        Ok(())
    }

    async fn startup_tasks(&self) -> Result<(), PluginSystemError> {
        Ok(())
    }

    async fn cleanup_tasks(&self) -> Result<(), PluginSystemError> {
        Ok(())
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Depends on the producer (conditionally, from its own configuration) and
/// consumes the shared counter during initialization.
#[derive(Clone)]
struct ConsumerPlugin {
    observed: Arc<Mutex<Option<u64>>>,
}

#[async_trait]
impl Plugin for ConsumerPlugin {
    fn name(&self) -> &str {
        "consumer"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn weight(&self) -> i32 {
        5
    }

    fn config_prefix(&self) -> &str {
        "kestrel.plugins.consumer"
    }

    fn depends_on(&self, config: &ConfigStore) -> Vec<String> {
        // The dependency is conditional on this plugin's own settings.
        match config.section("kestrel.plugins.consumer.use_producer") {
            Some(v) if v.as_bool() == Some(false) => Vec::new(),
            _ => vec!["producer".to_string()],
        }
    }

    async fn initialize_resources(
        &self,
        runtime: &PluginRuntime,
    ) -> Result<(), PluginSystemError> {
        // The producer loaded first, so its shared resource must exist.
        let counter = runtime
            .get_shared_resource::<AtomicU64>("requests")
            .map_err(|e| PluginSystemError::InternalError(e.to_string()))?;
        counter.fetch_add(1, Ordering::SeqCst);
        *self.observed.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(counter.load(Ordering::SeqCst));
        Ok(())
    }

    async fn startup_tasks(&self) -> Result<(), PluginSystemError> {
        Ok(())
    }

    async fn cleanup_tasks(&self) -> Result<(), PluginSystemError> {
        Ok(())
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

fn orchestrated_manager(config: ConfigStore) -> (Arc<PluginManager>, Arc<EventBusManager>, Arc<Mutex<Option<u64>>>) {
    let observed = Arc::new(Mutex::new(None));
    let mut factory = PluginFactory::new();
    // Registration order intentionally puts the dependent first; ordering
    // must come from the dependency graph, not registration order.
    let consumer = ConsumerPlugin {
        observed: Arc::clone(&observed),
    };
    factory
        .register("consumer", "kestrel.plugins.consumer", move || {
            Box::new(consumer.clone())
        })
        .unwrap();
    factory
        .register("producer", "kestrel.plugins.producer", || {
            Box::new(ProducerPlugin)
        })
        .unwrap();

    let events = Arc::new(EventBusManager::with_defaults());
    let manager = Arc::new(PluginManager::new(
        factory,
        Arc::new(config),
        Arc::new(ResourceRegistry::new()),
        Arc::clone(&events),
    ));
    (manager, events, observed)
}

fn configured() -> ConfigStore {
    ConfigStore::from_json_str(
        r#"{"kestrel": {"plugins": {"producer": {}, "consumer": {}}}}"#,
    )
    .unwrap()
}

#[tokio::test]
async fn test_resources_flow_across_ordered_plugins() {
    let (manager, events, observed) = orchestrated_manager(configured());
    events.start_all();

    let lifecycle_names: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let names_clone = Arc::clone(&lifecycle_names);
    events
        .add_listener(
            "lifecycle-probe",
            EventFilter::new().with_kind(EventKind::PluginStarted),
            listener_fn(move |event| {
                if let Some(name) = event.metadata.get("plugin").and_then(|v| v.as_str()) {
                    names_clone
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(name.to_string());
                }
            }),
            BusKind::Plugin,
        )
        .unwrap();

    manager.prepare().await.unwrap();
    manager.load_plugins().await.unwrap();

    // Producer (weight 10) loads before consumer despite consumer's lower
    // weight, because of the dependency edge.
    assert_eq!(manager.load_order().await, vec!["producer", "consumer"]);
    assert_eq!(*observed.lock().unwrap_or_else(PoisonError::into_inner), Some(1));

    // Lifecycle events carried the plugin names in publish order.
    wait_until(|| {
        lifecycle_names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
            == 2
    })
    .await;
    assert_eq!(
        *lifecycle_names.lock().unwrap_or_else(PoisonError::into_inner),
        vec!["producer".to_string(), "consumer".to_string()]
    );

    // One shared and one private resource are registered; stopping the
    // producer later reclaims the private one.
    let stats = manager.resource_stats();
    assert_eq!(stats.shared, 1);
    assert_eq!(stats.private, 1);
}

#[tokio::test]
async fn test_stop_conflict_then_orderly_stop() {
    let (manager, _, _) = orchestrated_manager(configured());
    manager.prepare().await.unwrap();
    manager.load_plugins().await.unwrap();

    // Producer is still depended upon by the active consumer.
    let err = manager.stop_plugin("producer").await.unwrap_err();
    assert!(matches!(
        err,
        PluginSystemError::StillDependedUpon { .. }
    ));

    manager.stop_plugin("consumer").await.unwrap();
    manager.stop_plugin("producer").await.unwrap();
    assert_eq!(
        manager.plugin_state("producer").await,
        Some(PluginState::Stopped)
    );
    // The producer's private resource was reclaimed; the shared counter
    // outlives its registering plugin.
    let stats = manager.resource_stats();
    assert_eq!(stats.private, 0);
    assert_eq!(stats.shared, 1);
}

#[tokio::test]
async fn test_conditional_dependency_disabled_by_config() {
    let config = ConfigStore::from_json_str(
        r#"{"kestrel": {"plugins": {"producer": {}, "consumer": {"use_producer": false}}}}"#,
    )
    .unwrap();
    let (manager, _, _) = orchestrated_manager(config);
    manager.prepare().await.unwrap();

    // Without the dependency edge, plain weight ordering applies and the
    // consumer (weight 5) would initialize first — which must now fail
    // gracefully inside the consumer because the shared resource is absent.
    let err = manager.load_plugins().await.unwrap_err();
    assert!(err.to_string().contains("consumer"));
    assert_eq!(manager.load_order().await, vec!["consumer", "producer"]);
}
