use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::event::{BusEvent, EventBusManager, EventKind, EventPriority};
use crate::health::report::SystemHealth;
use crate::kernel::component::KernelComponent;
use crate::kernel::error::Result;
use crate::plugin_system::PluginManager;

/// Folds per-plugin health reports into one process-wide verdict.
///
/// Polls on a fixed interval once started, caching the latest snapshot for
/// external monitoring adapters to scrape; `check_now` gives the same fold
/// on demand.
pub struct HealthAggregator {
    manager: Arc<PluginManager>,
    events: Arc<EventBusManager>,
    interval: Duration,
    latest: Arc<RwLock<Option<SystemHealth>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthAggregator")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl HealthAggregator {
    pub fn new(
        manager: Arc<PluginManager>,
        events: Arc<EventBusManager>,
        interval: Duration,
    ) -> Self {
        Self {
            manager,
            events,
            interval,
            latest: Arc::new(RwLock::new(None)),
            task: Mutex::new(None),
        }
    }

    /// Poll every plugin once and publish the verdict on the health bus.
    pub async fn check_now(&self) -> SystemHealth {
        Self::poll(&self.manager, &self.events, &self.latest).await
    }

    /// The most recent verdict, either from the periodic task or from
    /// `check_now`.
    pub fn latest(&self) -> Option<SystemHealth> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn poll(
        manager: &Arc<PluginManager>,
        events: &Arc<EventBusManager>,
        latest: &Arc<RwLock<Option<SystemHealth>>>,
    ) -> SystemHealth {
        let reports = manager.check_health_all().await;
        let health = SystemHealth::from_reports(reports);

        let event = if health.healthy {
            BusEvent::new(EventKind::HealthOk, "", "health-aggregator")
                .with_category("health")
                .with_status("healthy")
        } else {
            let failing: Vec<String> = health
                .unhealthy_plugins()
                .iter()
                .map(|p| format!("{}: {}", p.name, p.report.message))
                .collect();
            BusEvent::new(EventKind::HealthCritical, "", "health-aggregator")
                .with_category("health")
                .with_status("unhealthy")
                .with_priority(EventPriority::High)
                .with_metadata("failing", failing.join("; "))
        };
        if let Err(e) = events.publish(event) {
            log::debug!("health event publish failed: {}", e);
        }

        *latest.write().unwrap_or_else(PoisonError::into_inner) = Some(health.clone());
        health
    }

    /// Spawn the periodic polling task. Idempotent.
    pub fn start_polling(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }
        let manager = Arc::clone(&self.manager);
        let events = Arc::clone(&self.events);
        let latest = Arc::clone(&self.latest);
        let interval = self.interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so plugins have a
            // chance to finish starting.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let health = Self::poll(&manager, &events, &latest).await;
                if !health.healthy {
                    log::warn!(
                        "system unhealthy: {} plugin(s) degraded",
                        health.unhealthy_plugins().len()
                    );
                }
            }
        }));
    }

    /// Abort the periodic polling task. Idempotent.
    pub fn stop_polling(&self) {
        if let Some(task) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

#[async_trait]
impl KernelComponent for HealthAggregator {
    fn name(&self) -> &'static str {
        "HealthAggregator"
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.start_polling();
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stop_polling();
        Ok(())
    }
}
