use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ConfigStore;
use crate::health::HealthReport;
use crate::plugin_system::error::PluginSystemError;
use crate::runtime::PluginRuntime;

/// Core contract implemented by every plugin.
///
/// Metadata methods are pure and cheap; the manager calls them once to
/// build the plugin's descriptor. The lifecycle hooks are driven
/// exclusively by the manager, strictly sequentially across plugins, each
/// under a configured time budget. Hooks report failure by returning an
/// error — a panic inside a hook is contained by the manager and treated as
/// a failure of that hook, never a process crash.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique display name. Two plugins may not register under one name.
    fn name(&self) -> &str;

    /// Semantic version of the plugin (semver).
    fn version(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Ordering hint among mutually-independent plugins; lower loads first.
    fn weight(&self) -> i32 {
        100
    }

    /// Dot-separated configuration prefix locating this plugin's settings.
    fn config_prefix(&self) -> &str;

    /// Names of plugins that must be active before this one.
    ///
    /// Evaluated at load time against the whole configuration store, so a
    /// plugin may make dependencies conditional on its own settings (e.g.
    /// require a TLS provider only when TLS is enabled).
    fn depends_on(&self, _config: &ConfigStore) -> Vec<String> {
        Vec::new()
    }

    /// Scan configuration and register resources through the runtime
    /// facade. The facade is scoped to this plugin's identity and remains
    /// valid until the plugin stops.
    async fn initialize_resources(
        &self,
        runtime: &PluginRuntime,
    ) -> Result<(), PluginSystemError>;

    /// Begin the plugin's main functionality: open listeners, establish
    /// external connections. Called only after successful initialization.
    async fn startup_tasks(&self) -> Result<(), PluginSystemError>;

    /// Gracefully release connections and background work. Called in
    /// reverse start order during shutdown.
    async fn cleanup_tasks(&self) -> Result<(), PluginSystemError>;

    /// Apply a configuration update at runtime. Optional hot-reload hook.
    async fn configure(&self, _new_config: &Value) -> Result<(), PluginSystemError> {
        Ok(())
    }

    /// Fill in a health report. Optional; the default reports healthy.
    fn check_health(&self, _report: &mut HealthReport) -> Result<(), PluginSystemError> {
        Ok(())
    }

    /// Upcast for typed lookup through the manager. Implementations return
    /// `self`.
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}
