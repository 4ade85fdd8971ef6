use std::sync::Arc;
use std::time::Duration;

use crate::config::ConfigStore;
use crate::event::{BusEvent, EventBusManager, EventKind, EventPriority, bus_configs_from};
use crate::health::HealthAggregator;
use crate::kernel::component::KernelComponent;
use crate::kernel::constants;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::plugin_system::{PluginFactory, PluginManager};
use crate::resource::ResourceRegistry;

/// Application assembly and lifecycle.
///
/// Builds the event buses, resource registry, plugin manager, and health
/// aggregator from a configuration store plus a populated factory, then
/// drives them through initialize and start in order. Startup is fail-fast
/// with rollback of already-started components; shutdown runs in reverse
/// order and is best-effort, with the event system closed last so shutdown
/// events still flow.
pub struct Application {
    config: Arc<ConfigStore>,
    events: Arc<EventBusManager>,
    plugin_manager: Arc<PluginManager>,
    health: Arc<HealthAggregator>,
    components: Vec<Arc<dyn KernelComponent>>,
    started: bool,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("started", &self.started)
            .field("components", &self.components.len())
            .finish_non_exhaustive()
    }
}

impl Application {
    /// Assemble an application from configuration and a factory populated
    /// by the hosting code. Registration must be complete before this call;
    /// nothing registers plugins afterwards.
    pub fn new(config: ConfigStore, factory: PluginFactory) -> Self {
        log::info!("initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);

        let config = Arc::new(config);
        let events = Arc::new(EventBusManager::new(bus_configs_from(&config)));
        let resources = Arc::new(ResourceRegistry::new());
        let plugin_manager = Arc::new(PluginManager::new(
            factory,
            Arc::clone(&config),
            resources,
            Arc::clone(&events),
        ));
        let health_interval = config
            .get_u64("kestrel.health.interval_ms")
            .unwrap_or(constants::DEFAULT_HEALTH_INTERVAL_MS);
        let health = Arc::new(HealthAggregator::new(
            Arc::clone(&plugin_manager),
            Arc::clone(&events),
            Duration::from_millis(health_interval),
        ));

        // Drive order: buses first so lifecycle events flow, plugins next,
        // health last. Shutdown reverses this, closing the buses last.
        let components: Vec<Arc<dyn KernelComponent>> = vec![
            Arc::clone(&events) as Arc<dyn KernelComponent>,
            Arc::clone(&plugin_manager) as Arc<dyn KernelComponent>,
            Arc::clone(&health) as Arc<dyn KernelComponent>,
        ];

        Self {
            config,
            events,
            plugin_manager,
            health,
            components,
            started: false,
        }
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBusManager> {
        &self.events
    }

    pub fn plugin_manager(&self) -> &Arc<PluginManager> {
        &self.plugin_manager
    }

    pub fn health(&self) -> &Arc<HealthAggregator> {
        &self.health
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Initialize and start every component in order. Fail-fast: a failure
    /// stops the already-started components in reverse order before the
    /// error is surfaced.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Start,
                component: "Application".to_string(),
                message: "already started".to_string(),
                source: None,
            });
        }

        for component in &self.components {
            log::info!("initializing component: {}", component.name());
            if let Err(e) = component.initialize().await {
                return Err(self.abort_startup(KernelLifecyclePhase::Initialize, component.name(), e));
            }
        }

        let mut started = Vec::new();
        for component in &self.components {
            log::info!("starting component: {}", component.name());
            if let Err(e) = component.start().await {
                for prior in started.into_iter().rev() {
                    self.stop_component(prior).await;
                }
                return Err(self.abort_startup(KernelLifecyclePhase::Start, component.name(), e));
            }
            started.push(Arc::clone(component));
        }

        self.started = true;
        let event = BusEvent::new(EventKind::SystemStart, "", constants::APP_NAME)
            .with_category("system")
            .with_priority(EventPriority::Critical);
        if let Err(e) = self.events.publish(event) {
            log::debug!("system start event publish failed: {}", e);
        }
        log::info!("application started");
        Ok(())
    }

    /// Stop every component in reverse order. Best-effort: a component that
    /// fails to stop is logged and never blocks the remaining components.
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.started {
            return Ok(());
        }
        let event = BusEvent::new(EventKind::SystemShutdown, "", constants::APP_NAME)
            .with_category("system")
            .with_priority(EventPriority::Critical);
        if let Err(e) = self.events.publish(event) {
            log::debug!("system shutdown event publish failed: {}", e);
        }

        for component in self.components.iter().rev() {
            self.stop_component(Arc::clone(component)).await;
        }
        self.started = false;
        log::info!("application shut down");
        Ok(())
    }

    async fn stop_component(&self, component: Arc<dyn KernelComponent>) {
        log::info!("stopping component: {}", component.name());
        if let Err(e) = component.stop().await {
            log::error!("component '{}' failed to stop: {}", component.name(), e);
        }
    }

    fn abort_startup(
        &self,
        phase: KernelLifecyclePhase,
        component: &str,
        source: Error,
    ) -> Error {
        log::error!("startup aborted during {} of '{}': {}", phase, component, source);
        Error::KernelLifecycleError {
            phase,
            component: component.to_string(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}
