use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::error::EventSystemError;
use crate::event::filter::EventFilter;
use crate::event::metrics::{BusMetrics, MetricsSnapshot};
use crate::event::types::{BusEvent, BusKind};

/// Why an event never reached the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The bounded queue was full at publish time.
    QueueFull,
    /// The token-bucket throttle had no allowance left.
    Throttled,
    /// The bus is configured as disabled.
    Disabled,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::QueueFull => f.write_str("queue full"),
            DropReason::Throttled => f.write_str("throttled"),
            DropReason::Disabled => f.write_str("bus disabled"),
        }
    }
}

/// Callback invoked (asynchronously when possible) whenever a publish is
/// dropped. Receives the dropped event and the reason.
pub type ErrorCallback = Arc<dyn Fn(&BusEvent, DropReason) + Send + Sync>;

/// Token-bucket throttle settings for one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Sustained allowance, events per second.
    pub rate_per_sec: u32,
    /// Instantaneous burst allowance.
    pub burst: u32,
}

/// Per-bus settings.
#[derive(Clone)]
pub struct BusConfig {
    /// Bounded queue capacity. Publishes beyond this are dropped, never
    /// queued unboundedly.
    pub capacity: usize,
    /// A disabled bus counts every publish as dropped.
    pub enabled: bool,
    pub throttle: Option<ThrottleConfig>,
    /// How many delivered events to retain for diagnostics; 0 disables
    /// history.
    pub history_size: usize,
    /// How long `close` waits for in-flight deliveries before aborting the
    /// pump task.
    pub shutdown_grace: Duration,
    pub error_callback: Option<ErrorCallback>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            enabled: true,
            throttle: None,
            history_size: 256,
            shutdown_grace: Duration::from_secs(5),
            error_callback: None,
        }
    }
}

impl fmt::Debug for BusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusConfig")
            .field("capacity", &self.capacity)
            .field("enabled", &self.enabled)
            .field("throttle", &self.throttle)
            .field("history_size", &self.history_size)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("error_callback", &self.error_callback.is_some())
            .finish()
    }
}

/// Handler invoked for each matching event on a bus.
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(&self, event: &BusEvent) -> Result<(), EventSystemError>;
}

struct FnListener<F>(F);

#[async_trait]
impl<F> EventListener for FnListener<F>
where
    F: Fn(&BusEvent) + Send + Sync,
{
    async fn on_event(&self, event: &BusEvent) -> Result<(), EventSystemError> {
        (self.0)(event);
        Ok(())
    }
}

/// Wrap an infallible closure as an [`EventListener`].
pub fn listener_fn<F>(f: F) -> Arc<dyn EventListener>
where
    F: Fn(&BusEvent) + Send + Sync + 'static,
{
    Arc::new(FnListener(f))
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    rate: f64,
    burst: f64,
}

impl TokenBucket {
    fn new(config: ThrottleConfig) -> Self {
        Self {
            tokens: config.burst as f64,
            last_refill: Instant::now(),
            rate: config.rate_per_sec as f64,
            burst: config.burst as f64,
        }
    }

    fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

struct ListenerEntry {
    id: String,
    filter: EventFilter,
    handler: Arc<dyn EventListener>,
    active: AtomicBool,
}

/// Point-in-time view of one bus for health and dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct BusStatus {
    pub kind: BusKind,
    pub healthy: bool,
    pub queue_depth: usize,
    pub subscribers: usize,
    pub closed: bool,
}

/// One independent logical event channel.
///
/// Publishing is non-blocking: an event either lands on the bounded queue
/// or is dropped with a counter increment and an error-callback
/// notification. A single pump task drains the queue in publish order and
/// invokes each matching active listener sequentially, so per-listener
/// delivery order equals publish order. A listener that errors or panics is
/// isolated and never stops delivery to other listeners or later events.
pub struct EventBus {
    kind: BusKind,
    config: BusConfig,
    sender: RwLock<Option<mpsc::Sender<BusEvent>>>,
    receiver: Mutex<Option<mpsc::Receiver<BusEvent>>>,
    listeners: RwLock<Vec<ListenerEntry>>,
    throttle: Option<Mutex<TokenBucket>>,
    history: Mutex<VecDeque<BusEvent>>,
    metrics: BusMetrics,
    depth: AtomicUsize,
    closed: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("kind", &self.kind)
            .field("queue_depth", &self.depth.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(kind: BusKind, config: BusConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let throttle = config.throttle.map(|t| Mutex::new(TokenBucket::new(t)));
        Self {
            kind,
            config,
            sender: RwLock::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            listeners: RwLock::new(Vec::new()),
            throttle,
            history: Mutex::new(VecDeque::new()),
            metrics: BusMetrics::default(),
            depth: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            pump: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> BusKind {
        self.kind
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Enqueue an event. Never blocks the publisher: a full queue or an
    /// exhausted throttle drops the event (counted, callback notified) and
    /// still returns `Ok`. Publishing on a closed bus is a loud error.
    pub fn publish(&self, event: BusEvent) -> Result<(), EventSystemError> {
        if self.closed.load(Ordering::Acquire) {
            self.metrics.record_dropped();
            return Err(EventSystemError::BusClosed(self.kind));
        }
        if !self.config.enabled {
            self.metrics.record_dropped();
            self.notify_drop(event, DropReason::Disabled);
            return Ok(());
        }
        if let Some(throttle) = &self.throttle {
            let allowed = throttle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .try_acquire();
            if !allowed {
                self.metrics.record_throttled();
                self.notify_drop(event, DropReason::Throttled);
                return Ok(());
            }
        }

        let sender = self
            .sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sender) = sender else {
            self.metrics.record_dropped();
            return Err(EventSystemError::BusClosed(self.kind));
        };
        match sender.try_send(event) {
            Ok(()) => {
                self.depth.fetch_add(1, Ordering::AcqRel);
                self.metrics.record_published();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.metrics.record_dropped();
                self.notify_drop(event, DropReason::QueueFull);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.record_dropped();
                Err(EventSystemError::BusClosed(self.kind))
            }
        }
    }

    fn notify_drop(&self, event: BusEvent, reason: DropReason) {
        log::debug!(
            "event '{}' dropped on bus '{}': {}",
            event.kind,
            self.kind,
            reason
        );
        if let Some(callback) = &self.config.error_callback {
            let callback = Arc::clone(callback);
            // Callbacks run off the publisher's path when a runtime is
            // available; outside a runtime they run inline.
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move { callback(&event, reason) });
                }
                Err(_) => callback(&event, reason),
            }
        }
    }

    /// Register a named listener. Duplicate ids on the same bus are
    /// rejected.
    pub fn add_listener(
        &self,
        id: impl Into<String>,
        filter: EventFilter,
        handler: Arc<dyn EventListener>,
    ) -> Result<(), EventSystemError> {
        let id = id.into();
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        if listeners.iter().any(|l| l.id == id) {
            return Err(EventSystemError::DuplicateListener { id, bus: self.kind });
        }
        listeners.push(ListenerEntry {
            id,
            filter,
            handler,
            active: AtomicBool::new(true),
        });
        Ok(())
    }

    /// Deregister a listener by id. Idempotent; returns whether a listener
    /// was removed.
    pub fn remove_listener(&self, id: &str) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() < before
    }

    /// Toggle a listener without removing it.
    pub fn set_listener_active(&self, id: &str, active: bool) -> Result<(), EventSystemError> {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        match listeners.iter().find(|l| l.id == id) {
            Some(entry) => {
                entry.active.store(active, Ordering::Release);
                Ok(())
            }
            None => Err(EventSystemError::UnknownListener {
                id: id.to_string(),
                bus: self.kind,
            }),
        }
    }

    pub fn has_listener(&self, id: &str) -> bool {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|l| l.id == id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Start the pump task. Events published before `start` stay queued and
    /// are delivered once the pump runs. Calling `start` twice is a no-op.
    pub fn start(self: &Arc<Self>) {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut receiver) = receiver else {
            return;
        };
        let bus = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                bus.depth.fetch_sub(1, Ordering::AcqRel);
                bus.deliver(&event).await;
                bus.metrics.record_processed();
                bus.remember(event);
            }
            log::debug!("event bus '{}' pump drained and exited", bus.kind);
        });
        *self.pump.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    async fn deliver(&self, event: &BusEvent) {
        // Snapshot matching handlers so the listener lock is not held
        // across handler awaits.
        let targets: Vec<(String, Arc<dyn EventListener>)> = {
            let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            listeners
                .iter()
                .filter(|l| l.active.load(Ordering::Acquire) && l.filter.matches(event))
                .map(|l| (l.id.clone(), Arc::clone(&l.handler)))
                .collect()
        };
        for (id, handler) in targets {
            match AssertUnwindSafe(handler.on_event(event)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.metrics.record_failed();
                    log::warn!(
                        "listener '{}' failed handling '{}' on bus '{}': {}",
                        id,
                        event.kind,
                        self.kind,
                        e
                    );
                }
                Err(_) => {
                    self.metrics.record_failed();
                    log::error!(
                        "listener '{}' panicked handling '{}' on bus '{}'",
                        id,
                        event.kind,
                        self.kind
                    );
                }
            }
        }
    }

    fn remember(&self, event: BusEvent) {
        if self.config.history_size == 0 {
            return;
        }
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if history.len() == self.config.history_size {
            history.pop_front();
        }
        history.push_back(event);
    }

    /// Delivered events matching the filter, oldest first, bounded by the
    /// configured history size.
    pub fn history(&self, filter: &EventFilter) -> Vec<BusEvent> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// Stop intake, drain in-flight deliveries up to the grace period, then
    /// abort the pump. Subsequent publishes fail loudly. Idempotent.
    pub async fn close(&self, grace: Duration) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Dropping the sender lets the pump drain the queue and exit.
        self.sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let pump = self.pump.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut pump) = pump {
            if tokio::time::timeout(grace, &mut pump).await.is_err() {
                log::warn!(
                    "event bus '{}' close timed out after {:?}, aborting pump",
                    self.kind,
                    grace
                );
                pump.abort();
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// A bus is healthy while it is open, enabled, and below 80% queue
    /// usage.
    pub fn is_healthy(&self) -> bool {
        if self.closed.load(Ordering::Acquire) || !self.config.enabled {
            return false;
        }
        let capacity = self.config.capacity.max(1);
        self.queue_depth() * 100 / capacity < 80
    }

    pub fn status(&self) -> BusStatus {
        BusStatus {
            kind: self.kind,
            healthy: self.is_healthy(),
            queue_depth: self.queue_depth(),
            subscribers: self.subscriber_count(),
            closed: self.is_closed(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
