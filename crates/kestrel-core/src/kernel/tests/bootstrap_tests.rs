use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ConfigStore;
use crate::event::{BusKind, EventFilter, EventKind, listener_fn};
use crate::kernel::bootstrap::Application;
use crate::kernel::error::Error;
use crate::plugin_system::{PluginFactory, PluginState};
use crate::tests::common::{CallLog, TestPlugin, wait_until};

fn factory_with(templates: Vec<TestPlugin>) -> PluginFactory {
    use crate::plugin_system::Plugin;
    let mut factory = PluginFactory::new();
    for template in templates {
        let name = template.name().to_string();
        let prefix = template.config_prefix().to_string();
        factory
            .register(&name, &prefix, move || Box::new(template.clone()))
            .unwrap();
    }
    factory
}

#[tokio::test]
async fn test_start_drives_plugins_and_emits_system_start() {
    let log = CallLog::new();
    let factory = factory_with(vec![
        TestPlugin::new("a", log.clone()).with_weight(10),
        TestPlugin::new("b", log.clone()).with_weight(20),
    ]);
    let mut app = Application::new(ConfigStore::empty(), factory);

    let system_starts = Arc::new(AtomicU64::new(0));
    let count = Arc::clone(&system_starts);
    app.events()
        .add_listener(
            "boot-probe",
            EventFilter::new().with_kind(EventKind::SystemStart),
            listener_fn(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            }),
            BusKind::System,
        )
        .unwrap();

    app.start().await.unwrap();
    assert!(app.is_started());

    let states = app.plugin_manager().plugin_states().await;
    assert_eq!(states["a"], PluginState::Active);
    assert_eq!(states["b"], PluginState::Active);
    wait_until(|| system_starts.load(Ordering::SeqCst) == 1).await;

    // Double start is refused.
    assert!(matches!(
        app.start().await,
        Err(Error::KernelLifecycleError { .. })
    ));

    app.shutdown().await.unwrap();
    assert!(!app.is_started());
    let states = app.plugin_manager().plugin_states().await;
    assert_eq!(states["a"], PluginState::Stopped);
    assert_eq!(states["b"], PluginState::Stopped);
    // Buses are closed last, after plugins stopped.
    assert!(app.events().bus(BusKind::System).is_closed());

    // Shutdown of a stopped application is a no-op.
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_plugin_failure_aborts_startup_and_rolls_back() {
    let log = CallLog::new();
    let factory = factory_with(vec![
        TestPlugin::new("good", log.clone()).with_weight(10),
        TestPlugin::new("broken", log.clone()).with_weight(20).failing_start(),
    ]);
    let mut app = Application::new(ConfigStore::empty(), factory);

    let err = app.start().await.unwrap_err();
    match err {
        Error::KernelLifecycleError { component, message, .. } => {
            assert_eq!(component, "PluginManager");
            assert!(message.contains("broken"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!app.is_started());

    // The good plugin was rolled back and already-started components were
    // stopped again, closing the buses.
    assert_eq!(
        app.plugin_manager().plugin_state("good").await,
        Some(PluginState::Stopped)
    );
    assert!(app.events().bus(BusKind::Plugin).is_closed());
}

#[tokio::test]
async fn test_health_interval_from_config() {
    let config = ConfigStore::from_json_str(
        r#"{"kestrel": {"health": {"interval_ms": 50}}}"#,
    )
    .unwrap();
    let log = CallLog::new();
    let factory = factory_with(vec![TestPlugin::new("watched", log.clone())]);
    let mut app = Application::new(config, factory);

    app.start().await.unwrap();
    wait_until(|| app.health().latest().is_some()).await;
    assert!(app.health().latest().unwrap().healthy);
    app.shutdown().await.unwrap();
}
