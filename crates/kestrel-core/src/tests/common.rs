//! Shared fixtures for unit and integration tests.
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ConfigStore;
use crate::health::HealthReport;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::Plugin;
use crate::runtime::PluginRuntime;

/// Shared, ordered record of lifecycle hook invocations across plugins.
#[derive(Default)]
pub struct CallLog(Mutex<Vec<String>>);

impl CallLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Configurable plugin double: records hook invocations in a shared
/// [`CallLog`] and can be told to fail, panic, or hang in specific hooks.
#[derive(Clone)]
pub struct TestPlugin {
    name: String,
    weight: i32,
    config_prefix: String,
    deps: Vec<String>,
    fail_init: bool,
    fail_start: bool,
    fail_stop: bool,
    panic_start: bool,
    hang_start: bool,
    unhealthy: Arc<AtomicBool>,
    log: Arc<CallLog>,
}

impl TestPlugin {
    pub fn new(name: &str, log: Arc<CallLog>) -> Self {
        Self {
            name: name.to_string(),
            weight: 100,
            config_prefix: String::new(),
            deps: Vec::new(),
            fail_init: false,
            fail_start: false,
            fail_stop: false,
            panic_start: false,
            hang_start: false,
            unhealthy: Arc::new(AtomicBool::new(false)),
            log,
        }
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.config_prefix = prefix.to_string();
        self
    }

    pub fn with_deps(mut self, deps: &[&str]) -> Self {
        self.deps = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn panicking_start(mut self) -> Self {
        self.panic_start = true;
        self
    }

    pub fn hanging_start(mut self) -> Self {
        self.hang_start = true;
        self
    }

    /// Handle for flipping the reported health after creation; shared with
    /// every clone the factory produces.
    pub fn health_toggle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.unhealthy)
    }
}

#[async_trait]
impl Plugin for TestPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn weight(&self) -> i32 {
        self.weight
    }

    fn config_prefix(&self) -> &str {
        &self.config_prefix
    }

    fn depends_on(&self, _config: &ConfigStore) -> Vec<String> {
        self.deps.clone()
    }

    async fn initialize_resources(
        &self,
        _runtime: &PluginRuntime,
    ) -> Result<(), PluginSystemError> {
        self.log.record(format!("init:{}", self.name));
        if self.fail_init {
            return Err(PluginSystemError::InternalError("induced init failure".into()));
        }
        Ok(())
    }

    async fn startup_tasks(&self) -> Result<(), PluginSystemError> {
        self.log.record(format!("start:{}", self.name));
        if self.panic_start {
            panic!("induced start panic");
        }
        if self.hang_start {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_start {
            return Err(PluginSystemError::InternalError("induced start failure".into()));
        }
        Ok(())
    }

    async fn cleanup_tasks(&self) -> Result<(), PluginSystemError> {
        self.log.record(format!("stop:{}", self.name));
        if self.fail_stop {
            return Err(PluginSystemError::InternalError("induced stop failure".into()));
        }
        Ok(())
    }

    async fn configure(&self, _new_config: &Value) -> Result<(), PluginSystemError> {
        self.log.record(format!("configure:{}", self.name));
        Ok(())
    }

    fn check_health(&self, report: &mut HealthReport) -> Result<(), PluginSystemError> {
        if self.unhealthy.load(Ordering::Acquire) {
            report.mark_unhealthy("induced unhealthy state");
        }
        Ok(())
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Poll until `cond` holds or the deadline passes; panics on timeout.
pub async fn wait_until<F: Fn() -> bool>(cond: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached within deadline");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
