//! Built-in demo plugin: registers a shared beat counter and ticks it on a
//! configurable interval, emitting a metrics event per beat.
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::task::JoinHandle;

use kestrel_core::health::HealthReport;
use kestrel_core::plugin_system::{Plugin, PluginSystemError};
use kestrel_core::runtime::PluginRuntime;
use kestrel_core::event::EventKind;

pub const SHARED_COUNTER: &str = "heartbeat.count";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct HeartbeatSettings {
    interval_ms: u64,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self { interval_ms: 1_000 }
    }
}

#[derive(Default)]
struct Inner {
    runtime: Option<PluginRuntime>,
    settings: HeartbeatSettings,
    task: Option<JoinHandle<()>>,
}

/// Demo plugin exercising the full five-hook contract.
#[derive(Default)]
pub struct HeartbeatPlugin {
    inner: Mutex<Inner>,
}

#[async_trait]
impl Plugin for HeartbeatPlugin {
    fn name(&self) -> &str {
        "heartbeat"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "emits a periodic beat and publishes a shared counter"
    }

    fn weight(&self) -> i32 {
        50
    }

    fn config_prefix(&self) -> &str {
        "kestrel.plugins.heartbeat"
    }

    async fn initialize_resources(
        &self,
        runtime: &PluginRuntime,
    ) -> Result<(), PluginSystemError> {
        let settings: HeartbeatSettings = match runtime.config_section() {
            Some(_) => runtime
                .scan_config()
                .map_err(|e| PluginSystemError::InternalError(e.to_string()))?,
            None => HeartbeatSettings::default(),
        };
        runtime.register_shared_resource(SHARED_COUNTER, AtomicU64::new(0));

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.runtime = Some(runtime.clone());
        inner.settings = settings;
        Ok(())
    }

    async fn startup_tasks(&self) -> Result<(), PluginSystemError> {
        let (runtime, interval) = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let runtime = inner
                .runtime
                .clone()
                .ok_or_else(|| PluginSystemError::InternalError("runtime not set".into()))?;
            (runtime, Duration::from_millis(inner.settings.interval_ms.max(10)))
        };
        let counter = runtime
            .get_shared_resource::<AtomicU64>(SHARED_COUNTER)
            .map_err(|e| PluginSystemError::InternalError(e.to_string()))?;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let beat = counter.fetch_add(1, Ordering::Relaxed) + 1;
                let result = runtime.emit_event_with(EventKind::MetricsSnapshot, |e| {
                    e.with_category("heartbeat").with_metadata("beat", beat)
                });
                if let Err(e) = result {
                    log::debug!("heartbeat event publish failed: {}", e);
                    break;
                }
            }
        });
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .task = Some(task);
        log::info!("heartbeat ticking every {:?}", interval);
        Ok(())
    }

    async fn cleanup_tasks(&self) -> Result<(), PluginSystemError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = inner.task.take() {
            task.abort();
        }
        inner.runtime = None;
        Ok(())
    }

    fn check_health(&self, report: &mut HealthReport) -> Result<(), PluginSystemError> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match &inner.task {
            Some(task) if !task.is_finished() => {
                report.set_detail("interval_ms", inner.settings.interval_ms.to_string());
            }
            _ => report.mark_unhealthy("heartbeat task is not running"),
        }
        Ok(())
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
