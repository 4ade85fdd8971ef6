use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::ConfigStore;
use crate::event::{BusKind, EventBusManager, EventFilter, EventKind, listener_fn};
use crate::health::{HealthAggregator, HealthReport, PluginHealth, SystemHealth};
use crate::plugin_system::{Plugin, PluginFactory, PluginManager};
use crate::resource::ResourceRegistry;
use crate::tests::common::{CallLog, TestPlugin, wait_until};

fn report(healthy: bool, message: &str) -> HealthReport {
    let mut report = HealthReport::default();
    if !healthy {
        report.mark_unhealthy(message);
    }
    report
}

fn plugin_health(name: &str, healthy: bool, message: &str) -> PluginHealth {
    PluginHealth {
        name: name.to_string(),
        instance_id: format!("{name}@1.0.0#1"),
        report: report(healthy, message),
    }
}

#[test]
fn test_system_health_verdict() {
    let all_good = SystemHealth::from_reports(vec![
        plugin_health("a", true, ""),
        plugin_health("b", true, ""),
    ]);
    assert!(all_good.healthy);
    assert!(all_good.unhealthy_plugins().is_empty());

    let degraded = SystemHealth::from_reports(vec![
        plugin_health("a", true, ""),
        plugin_health("b", false, "connection pool exhausted"),
    ]);
    assert!(!degraded.healthy);
    let failing = degraded.unhealthy_plugins();
    assert_eq!(failing.len(), 1);
    assert_eq!(failing[0].name, "b");
    assert_eq!(failing[0].report.message, "connection pool exhausted");
}

#[test]
fn test_empty_system_is_healthy() {
    assert!(SystemHealth::from_reports(Vec::new()).healthy);
}

async fn aggregator_with_plugin(template: TestPlugin) -> (HealthAggregator, Arc<EventBusManager>) {
    let mut factory = PluginFactory::new();
    let name = template.name().to_string();
    factory
        .register(&name, "", move || Box::new(template.clone()))
        .unwrap();
    let events = Arc::new(EventBusManager::with_defaults());
    let manager = Arc::new(PluginManager::new(
        factory,
        Arc::new(ConfigStore::empty()),
        Arc::new(ResourceRegistry::new()),
        Arc::clone(&events),
    ));
    manager.prepare().await.unwrap();
    manager.load_plugins().await.unwrap();
    let aggregator = HealthAggregator::new(manager, Arc::clone(&events), Duration::from_secs(60));
    (aggregator, events)
}

#[tokio::test]
async fn test_check_now_folds_plugin_reports() {
    let log = CallLog::new();
    let template = TestPlugin::new("shaky", log.clone());
    let toggle = template.health_toggle();
    let (aggregator, _) = aggregator_with_plugin(template).await;

    let health = aggregator.check_now().await;
    assert!(health.healthy);
    assert_eq!(health.plugins.len(), 1);
    assert!(aggregator.latest().unwrap().healthy);

    toggle.store(true, Ordering::Release);
    let health = aggregator.check_now().await;
    assert!(!health.healthy);
    let failing = health.unhealthy_plugins();
    assert_eq!(failing[0].name, "shaky");
    assert_eq!(failing[0].report.message, "induced unhealthy state");
    assert!(!aggregator.latest().unwrap().healthy);
}

#[tokio::test]
async fn test_verdict_events_reach_health_bus() {
    let log = CallLog::new();
    let template = TestPlugin::new("watched", log.clone());
    let toggle = template.health_toggle();
    let (aggregator, events) = aggregator_with_plugin(template).await;

    let ok_count = Arc::new(AtomicU64::new(0));
    let critical_count = Arc::new(AtomicU64::new(0));
    let ok_clone = Arc::clone(&ok_count);
    events
        .add_listener(
            "on-ok",
            EventFilter::new().with_kind(EventKind::HealthOk),
            listener_fn(move |_| {
                ok_clone.fetch_add(1, Ordering::SeqCst);
            }),
            BusKind::Health,
        )
        .unwrap();
    let critical_clone = Arc::clone(&critical_count);
    events
        .add_listener(
            "on-critical",
            EventFilter::new().with_kind(EventKind::HealthCritical),
            listener_fn(move |event| {
                assert!(event.metadata.contains_key("failing"));
                critical_clone.fetch_add(1, Ordering::SeqCst);
            }),
            BusKind::Health,
        )
        .unwrap();
    events.start_all();

    aggregator.check_now().await;
    wait_until(|| ok_count.load(Ordering::SeqCst) == 1).await;

    toggle.store(true, Ordering::Release);
    aggregator.check_now().await;
    wait_until(|| critical_count.load(Ordering::SeqCst) == 1).await;
}

#[tokio::test]
async fn test_polling_task_lifecycle() {
    let log = CallLog::new();
    let template = TestPlugin::new("polled", log.clone());
    let mut factory = PluginFactory::new();
    factory
        .register("polled", "", move || Box::new(template.clone()))
        .unwrap();
    let events = Arc::new(EventBusManager::with_defaults());
    let manager = Arc::new(PluginManager::new(
        factory,
        Arc::new(ConfigStore::empty()),
        Arc::new(ResourceRegistry::new()),
        Arc::clone(&events),
    ));
    manager.prepare().await.unwrap();
    manager.load_plugins().await.unwrap();

    let aggregator =
        HealthAggregator::new(manager, events, Duration::from_millis(50));
    aggregator.start_polling();
    wait_until(|| aggregator.latest().is_some()).await;
    aggregator.stop_polling();
    // Stopping twice is harmless.
    aggregator.stop_polling();
}
