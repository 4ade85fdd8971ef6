use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::{ConfigStore, LifecycleTimeouts};
use crate::event::{BusEvent, EventBusManager, EventKind, EventPriority};
use crate::health::{HealthReport, PluginHealth};
use crate::kernel::component::KernelComponent;
use crate::kernel::error::Result as KernelResult;
use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::dependency::{LoadOrderInput, resolve_load_order};
use crate::plugin_system::error::{LifecycleHook, PluginSystemError};
use crate::plugin_system::factory::PluginFactory;
use crate::plugin_system::state::PluginState;
use crate::plugin_system::traits::Plugin;
use crate::resource::{ResourceInfo, ResourceRegistry, ResourceStats};
use crate::runtime::PluginRuntime;

struct PluginEntry {
    plugin: Arc<dyn Plugin>,
    descriptor: PluginDescriptor,
    state: PluginState,
    /// Dependency names, evaluated against configuration at load time.
    dependencies: Vec<String>,
    runtime: Option<Arc<PluginRuntime>>,
    last_error: Option<String>,
    health_failures: u32,
}

/// The orchestrator: owns every instantiated plugin and drives each through
/// its lifecycle state machine in a deterministic, dependency-respecting
/// order.
///
/// The lifecycle drive is strictly sequential — one plugin's initialize and
/// start complete before the next begins — while the event buses deliver
/// concurrently. Every hook runs under a configured time budget inside a
/// guarded task, so a hook that hangs, errors, or panics fails that plugin
/// without crashing the process.
pub struct PluginManager {
    factory: PluginFactory,
    config: Arc<ConfigStore>,
    resources: Arc<ResourceRegistry>,
    events: Arc<EventBusManager>,
    timeouts: LifecycleTimeouts,
    plugins: Mutex<HashMap<String, PluginEntry>>,
    load_order: Mutex<Vec<String>>,
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("registered", &self.factory.len())
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl PluginManager {
    pub fn new(
        factory: PluginFactory,
        config: Arc<ConfigStore>,
        resources: Arc<ResourceRegistry>,
        events: Arc<EventBusManager>,
    ) -> Self {
        let timeouts = LifecycleTimeouts::from_config(&config);
        Self {
            factory,
            config,
            resources,
            events,
            timeouts,
            plugins: Mutex::new(HashMap::new()),
            load_order: Mutex::new(Vec::new()),
        }
    }

    pub fn factory(&self) -> &PluginFactory {
        &self.factory
    }

    pub fn resources(&self) -> &Arc<ResourceRegistry> {
        &self.resources
    }

    pub fn events(&self) -> &Arc<EventBusManager> {
        &self.events
    }

    /// Instantiate every registered plugin whose configuration prefix is
    /// present in the configuration. Returns the prepared names in
    /// registration order. Idempotent: already-prepared plugins are
    /// skipped.
    pub async fn prepare(&self) -> std::result::Result<Vec<String>, PluginSystemError> {
        let mut prepared = Vec::new();
        let mut plugins = self.plugins.lock().await;
        for name in self.factory.registered_names() {
            if plugins.contains_key(&name) {
                continue;
            }
            let prefix = self.factory.config_prefix_of(&name).unwrap_or_default();
            if !self.config.has_prefix(prefix) {
                log::debug!(
                    "plugin '{}' not configured (prefix '{}'), skipping",
                    name,
                    prefix
                );
                continue;
            }
            let plugin: Arc<dyn Plugin> = Arc::from(self.factory.create(&name)?);
            if plugin.name() != name {
                return Err(PluginSystemError::RegistrationError {
                    plugin: name.clone(),
                    message: format!(
                        "constructor produced a plugin named '{}'",
                        plugin.name()
                    ),
                });
            }
            let descriptor = PluginDescriptor::for_plugin(plugin.as_ref())?;
            log::info!("prepared plugin '{}' ({})", name, descriptor.instance_id());
            plugins.insert(
                name.clone(),
                PluginEntry {
                    plugin,
                    descriptor,
                    state: PluginState::Registered,
                    dependencies: Vec::new(),
                    runtime: None,
                    last_error: None,
                    health_failures: 0,
                },
            );
            prepared.push(name);
        }
        Ok(prepared)
    }

    /// Evaluate each plugin's dependencies against the configuration and
    /// compute the load order. Missing and cyclic dependencies are fatal.
    async fn resolve_order(&self) -> std::result::Result<Vec<String>, PluginSystemError> {
        let mut inputs = Vec::new();
        {
            let mut plugins = self.plugins.lock().await;
            for (name, entry) in plugins.iter_mut() {
                let dependencies = entry.plugin.depends_on(&self.config);
                entry.dependencies = dependencies.clone();
                inputs.push(LoadOrderInput {
                    name: name.clone(),
                    weight: entry.descriptor.weight(),
                    registration_order: self
                        .factory
                        .registration_order(name)
                        .unwrap_or(usize::MAX),
                    dependencies,
                });
            }
        }
        let order = resolve_load_order(&inputs)?;
        *self.load_order.lock().await = order.clone();
        Ok(order)
    }

    /// Compute the load order without driving any lifecycle hook. Useful
    /// for configuration validation.
    pub async fn plan_load_order(&self) -> std::result::Result<Vec<String>, PluginSystemError> {
        self.resolve_order().await
    }

    /// Drive every prepared plugin through initialize and start, in
    /// dependency order. Fail-fast: the first failure marks that plugin
    /// `Failed`, stops every already-active plugin in reverse order, and
    /// surfaces an error naming the plugin and hook.
    pub async fn load_plugins(&self) -> std::result::Result<(), PluginSystemError> {
        let order = self.resolve_order().await?;
        log::info!("plugin load order: {}", order.join(", "));
        for name in &order {
            if let Err(e) = self.initialize_plugin(name).await {
                self.rollback_active().await;
                return Err(e);
            }
            if let Err(e) = self.start_plugin(name).await {
                self.rollback_active().await;
                return Err(e);
            }
        }
        Ok(())
    }

    async fn initialize_plugin(&self, name: &str) -> std::result::Result<(), PluginSystemError> {
        let (plugin, descriptor) = self
            .begin_transition(name, PluginState::Initializing, EventKind::PluginInitializing)
            .await?;
        let runtime = Arc::new(PluginRuntime::new(
            descriptor.name(),
            descriptor.instance_id(),
            descriptor.config_prefix(),
            Arc::clone(&self.config),
            Arc::clone(&self.resources),
            Arc::clone(&self.events),
        ));
        {
            let mut plugins = self.plugins.lock().await;
            if let Some(entry) = plugins.get_mut(name) {
                entry.runtime = Some(Arc::clone(&runtime));
            }
        }
        let hook_plugin = Arc::clone(&plugin);
        let result = run_guarded(
            name,
            LifecycleHook::InitializeResources,
            self.timeouts.init,
            async move { hook_plugin.initialize_resources(&runtime).await },
        )
        .await;
        match result {
            Ok(()) => {
                self.complete_transition(name, PluginState::Initialized, EventKind::PluginInitialized)
                    .await;
                Ok(())
            }
            Err(e) => {
                self.fail_plugin(name, &e).await;
                Err(e)
            }
        }
    }

    async fn start_plugin(&self, name: &str) -> std::result::Result<(), PluginSystemError> {
        let (plugin, _) = self
            .begin_transition(name, PluginState::Starting, EventKind::PluginStarting)
            .await?;
        let result = run_guarded(
            name,
            LifecycleHook::StartupTasks,
            self.timeouts.start,
            async move { plugin.startup_tasks().await },
        )
        .await;
        match result {
            Ok(()) => {
                self.complete_transition(name, PluginState::Active, EventKind::PluginStarted)
                    .await;
                log::info!("plugin '{}' active", name);
                Ok(())
            }
            Err(e) => {
                self.fail_plugin(name, &e).await;
                Err(e)
            }
        }
    }

    /// Stop every already-active plugin in reverse load order. Best-effort:
    /// used both for startup rollback and as part of shutdown.
    async fn rollback_active(&self) {
        let order = self.load_order.lock().await.clone();
        for name in order.iter().rev() {
            let is_active = {
                let plugins = self.plugins.lock().await;
                plugins
                    .get(name)
                    .map(|e| e.state == PluginState::Active)
                    .unwrap_or(false)
            };
            if is_active {
                if let Err(e) = self.stop_plugin_unchecked(name).await {
                    log::error!("rollback stop of plugin '{}' failed: {}", name, e);
                }
            }
        }
    }

    /// Stop one plugin, refusing while another active plugin depends on it.
    pub async fn stop_plugin(&self, name: &str) -> std::result::Result<(), PluginSystemError> {
        {
            let plugins = self.plugins.lock().await;
            let entry = plugins
                .get(name)
                .ok_or_else(|| PluginSystemError::UnknownPlugin(name.to_string()))?;
            if entry.state != PluginState::Active {
                return Err(PluginSystemError::NotActive {
                    plugin: name.to_string(),
                    state: entry.state,
                });
            }
            let mut dependents: Vec<String> = plugins
                .iter()
                .filter(|(other, e)| {
                    other.as_str() != name
                        && e.state == PluginState::Active
                        && e.dependencies.iter().any(|d| d == name)
                })
                .map(|(other, _)| other.clone())
                .collect();
            if !dependents.is_empty() {
                dependents.sort();
                return Err(PluginSystemError::StillDependedUpon {
                    plugin: name.to_string(),
                    dependents,
                });
            }
        }
        self.stop_plugin_unchecked(name).await
    }

    async fn stop_plugin_unchecked(&self, name: &str) -> std::result::Result<(), PluginSystemError> {
        let (plugin, descriptor) = self
            .begin_transition(name, PluginState::Stopping, EventKind::PluginStopping)
            .await?;
        let result = run_guarded(
            name,
            LifecycleHook::CleanupTasks,
            self.timeouts.stop,
            async move { plugin.cleanup_tasks().await },
        )
        .await;
        // Private resources are reclaimed whether or not cleanup succeeded.
        let removed = self.resources.cleanup_plugin(descriptor.instance_id());
        if removed > 0 {
            log::debug!("reclaimed {} private resource(s) from '{}'", removed, name);
        }
        match result {
            Ok(()) => {
                {
                    let mut plugins = self.plugins.lock().await;
                    if let Some(entry) = plugins.get_mut(name) {
                        entry.runtime = None;
                    }
                }
                self.complete_transition(name, PluginState::Stopped, EventKind::PluginStopped)
                    .await;
                log::info!("plugin '{}' stopped", name);
                Ok(())
            }
            Err(e) => {
                self.fail_plugin(name, &e).await;
                Err(e)
            }
        }
    }

    /// Stop all plugins in strict reverse start order. Teardown is
    /// best-effort: a plugin that fails to stop is logged and never blocks
    /// the remaining plugins.
    pub async fn unload_plugins(&self) {
        let order = self.load_order.lock().await.clone();
        for name in order.iter().rev() {
            let (state, instance_id) = {
                let plugins = self.plugins.lock().await;
                match plugins.get(name) {
                    Some(e) => (Some(e.state), e.descriptor.instance_id().to_string()),
                    None => (None, String::new()),
                }
            };
            match state {
                Some(PluginState::Active) => {
                    if let Err(e) = self.stop_plugin_unchecked(name).await {
                        log::error!("failed to stop plugin '{}': {}", name, e);
                    }
                }
                Some(PluginState::Initialized) | Some(PluginState::Failed) => {
                    // Never reached active; reclaim whatever it registered.
                    let removed = self.resources.cleanup_plugin(&instance_id);
                    if removed > 0 {
                        log::debug!(
                            "reclaimed {} private resource(s) from non-active plugin '{}'",
                            removed,
                            name
                        );
                    }
                }
                _ => {}
            }
        }
    }

    /// Typed-erased lookup of a prepared plugin.
    pub async fn get_plugin(
        &self,
        name: &str,
    ) -> std::result::Result<Arc<dyn Plugin>, PluginSystemError> {
        let plugins = self.plugins.lock().await;
        plugins
            .get(name)
            .map(|e| Arc::clone(&e.plugin))
            .ok_or_else(|| PluginSystemError::UnknownPlugin(name.to_string()))
    }

    /// Typed lookup returning the concrete plugin type, with an explicit
    /// mismatch error instead of a panic-on-mismatch cast.
    pub async fn get_plugin_as<T: Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> std::result::Result<Arc<T>, PluginSystemError> {
        let plugin = self.get_plugin(name).await?;
        plugin
            .as_any_arc()
            .downcast::<T>()
            .map_err(|_| PluginSystemError::TypeMismatch {
                plugin: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Hot-reload passthrough to an active plugin's `configure` hook.
    pub async fn configure_plugin(
        &self,
        name: &str,
        new_config: Value,
    ) -> std::result::Result<(), PluginSystemError> {
        let (plugin, descriptor) = {
            let plugins = self.plugins.lock().await;
            let entry = plugins
                .get(name)
                .ok_or_else(|| PluginSystemError::UnknownPlugin(name.to_string()))?;
            if entry.state != PluginState::Active {
                return Err(PluginSystemError::NotActive {
                    plugin: name.to_string(),
                    state: entry.state,
                });
            }
            (Arc::clone(&entry.plugin), entry.descriptor.clone())
        };
        run_guarded(name, LifecycleHook::Configure, self.timeouts.init, async move {
            plugin.configure(&new_config).await
        })
        .await?;
        self.emit_plugin_event(EventKind::ConfigApplied, &descriptor, None);
        Ok(())
    }

    /// Run every active plugin's health hook, containing panics and
    /// maintaining consecutive-failure counts. Consumed by the health
    /// aggregator.
    pub async fn check_health_all(&self) -> Vec<PluginHealth> {
        let targets: Vec<(String, String, Arc<dyn Plugin>)> = {
            let plugins = self.plugins.lock().await;
            plugins
                .iter()
                .filter(|(_, e)| e.state == PluginState::Active)
                .map(|(name, e)| {
                    (
                        name.clone(),
                        e.descriptor.instance_id().to_string(),
                        Arc::clone(&e.plugin),
                    )
                })
                .collect()
        };
        let mut results = Vec::new();
        for (name, instance_id, plugin) in targets {
            let mut report = HealthReport::default();
            let outcome =
                std::panic::catch_unwind(AssertUnwindSafe(|| plugin.check_health(&mut report)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => report.mark_unhealthy(e.to_string()),
                Err(_) => report.mark_unhealthy("health check panicked"),
            }
            report.consecutive_failures = {
                let mut plugins = self.plugins.lock().await;
                match plugins.get_mut(&name) {
                    Some(entry) => {
                        entry.health_failures = if report.healthy {
                            0
                        } else {
                            entry.health_failures.saturating_add(1)
                        };
                        entry.health_failures
                    }
                    None => u32::from(!report.healthy),
                }
            };
            results.push(PluginHealth {
                name,
                instance_id,
                report,
            });
        }
        results.sort_by(|a, b| a.name.cmp(&b.name));
        results
    }

    pub async fn plugin_state(&self, name: &str) -> Option<PluginState> {
        self.plugins.lock().await.get(name).map(|e| e.state)
    }

    /// The facade handed to a plugin at initialize time, present while the
    /// plugin is live. Useful for host-side diagnostics.
    pub async fn plugin_runtime(&self, name: &str) -> Option<Arc<PluginRuntime>> {
        self.plugins
            .lock()
            .await
            .get(name)
            .and_then(|e| e.runtime.clone())
    }

    pub async fn plugin_states(&self) -> HashMap<String, PluginState> {
        self.plugins
            .lock()
            .await
            .iter()
            .map(|(name, e)| (name.clone(), e.state))
            .collect()
    }

    /// The captured error of a failed plugin, if any.
    pub async fn last_error(&self, name: &str) -> Option<String> {
        self.plugins
            .lock()
            .await
            .get(name)
            .and_then(|e| e.last_error.clone())
    }

    pub async fn load_order(&self) -> Vec<String> {
        self.load_order.lock().await.clone()
    }

    pub async fn descriptors(&self) -> Vec<PluginDescriptor> {
        let plugins = self.plugins.lock().await;
        let mut descriptors: Vec<PluginDescriptor> =
            plugins.values().map(|e| e.descriptor.clone()).collect();
        descriptors.sort_by(|a, b| a.name().cmp(b.name()));
        descriptors
    }

    pub fn resource_stats(&self) -> ResourceStats {
        self.resources.stats()
    }

    pub fn list_resources(&self) -> Vec<ResourceInfo> {
        self.resources.list()
    }

    async fn begin_transition(
        &self,
        name: &str,
        next: PluginState,
        kind: EventKind,
    ) -> std::result::Result<(Arc<dyn Plugin>, PluginDescriptor), PluginSystemError> {
        let (plugin, descriptor) = {
            let mut plugins = self.plugins.lock().await;
            let entry = plugins
                .get_mut(name)
                .ok_or_else(|| PluginSystemError::UnknownPlugin(name.to_string()))?;
            if !entry.state.can_transition_to(next) {
                return Err(PluginSystemError::InvalidTransition {
                    plugin: name.to_string(),
                    from: entry.state,
                    to: next,
                });
            }
            entry.state = next;
            (Arc::clone(&entry.plugin), entry.descriptor.clone())
        };
        self.emit_plugin_event(kind, &descriptor, None);
        Ok((plugin, descriptor))
    }

    async fn complete_transition(&self, name: &str, next: PluginState, kind: EventKind) {
        let descriptor = {
            let mut plugins = self.plugins.lock().await;
            match plugins.get_mut(name) {
                Some(entry) => {
                    entry.state = next;
                    entry.descriptor.clone()
                }
                None => return,
            }
        };
        self.emit_plugin_event(kind, &descriptor, None);
    }

    async fn fail_plugin(&self, name: &str, error: &PluginSystemError) {
        let descriptor = {
            let mut plugins = self.plugins.lock().await;
            match plugins.get_mut(name) {
                Some(entry) => {
                    entry.state = PluginState::Failed;
                    entry.last_error = Some(error.to_string());
                    entry.descriptor.clone()
                }
                None => return,
            }
        };
        log::error!("plugin '{}' failed: {}", name, error);
        self.emit_plugin_event(EventKind::PluginFailed, &descriptor, Some(&error.to_string()));
    }

    fn emit_plugin_event(&self, kind: EventKind, descriptor: &PluginDescriptor, error: Option<&str>) {
        let mut event = BusEvent::new(kind, descriptor.instance_id(), "plugin-manager")
            .with_category("lifecycle")
            .with_metadata("plugin", descriptor.name())
            .with_metadata("version", descriptor.version().to_string());
        if let Some(error) = error {
            event = event
                .with_priority(EventPriority::High)
                .with_status("failed")
                .with_error(error);
        }
        if let Err(e) = self.events.publish(event) {
            log::debug!("lifecycle event publish failed: {}", e);
        }
    }
}

/// Run one lifecycle hook inside its own task under a time budget. A hook
/// that returns an error, exceeds the budget, or panics yields a
/// [`PluginSystemError`] naming the plugin and hook; the panic never
/// propagates.
async fn run_guarded<F>(
    plugin: &str,
    hook: LifecycleHook,
    timeout: Duration,
    fut: F,
) -> std::result::Result<(), PluginSystemError>
where
    F: Future<Output = std::result::Result<(), PluginSystemError>> + Send + 'static,
{
    let mut task = tokio::spawn(fut);
    match tokio::time::timeout(timeout, &mut task).await {
        Err(_) => {
            task.abort();
            Err(PluginSystemError::LifecycleTimeout {
                plugin: plugin.to_string(),
                hook,
                timeout_ms: timeout.as_millis() as u64,
            })
        }
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(e))) => Err(PluginSystemError::LifecycleError {
            plugin: plugin.to_string(),
            hook,
            message: e.to_string(),
        }),
        Ok(Err(join_error)) => {
            if join_error.is_panic() {
                let payload = join_error.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic payload".to_string());
                Err(PluginSystemError::LifecyclePanic {
                    plugin: plugin.to_string(),
                    hook,
                    message,
                })
            } else {
                Err(PluginSystemError::InternalError(format!(
                    "hook task for plugin '{}' was cancelled",
                    plugin
                )))
            }
        }
    }
}

#[async_trait]
impl KernelComponent for PluginManager {
    fn name(&self) -> &'static str {
        "PluginManager"
    }

    async fn initialize(&self) -> KernelResult<()> {
        let prepared = self.prepare().await?;
        log::info!("prepared {} plugin(s)", prepared.len());
        Ok(())
    }

    async fn start(&self) -> KernelResult<()> {
        self.load_plugins().await?;
        Ok(())
    }

    async fn stop(&self) -> KernelResult<()> {
        self.unload_plugins().await;
        Ok(())
    }
}
