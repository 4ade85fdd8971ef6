use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::event::unix_timestamp;
use crate::resource::error::ResourceSystemError;

/// A type-erased resource value.
pub type ResourceValue = Arc<dyn Any + Send + Sync>;

/// Observability snapshot of one registry entry.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceInfo {
    pub name: String,
    /// Concrete Rust type of the stored value.
    pub type_name: &'static str,
    /// Owning plugin instance id; `None` for shared resources.
    pub owner: Option<String>,
    pub private: bool,
    /// Approximate in-memory size of the value itself, in bytes.
    pub size_hint: u64,
    /// Unix timestamp of registration.
    pub created_at: i64,
}

/// Aggregate counts for diagnostics endpoints.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceStats {
    pub total: usize,
    pub shared: usize,
    pub private: usize,
    /// Private resource count per owning plugin instance id.
    pub per_plugin: HashMap<String, usize>,
}

struct ResourceEntry {
    value: ResourceValue,
    info: ResourceInfo,
}

#[derive(Default)]
struct RegistryInner {
    shared: HashMap<String, ResourceEntry>,
    // Keyed by (owning plugin instance id, resource name).
    private: HashMap<(String, String), ResourceEntry>,
}

/// Concurrency-safe store of named values shared between plugins.
///
/// A *private* resource belongs to exactly one plugin: registering the same
/// (owner, name) pair twice is an error, and the owner never changes. A
/// *shared* resource is visible to every plugin and is silently overwritten
/// on re-registration (counters and similar values are expected to be
/// updated in place).
///
/// All state sits behind one registry-wide reader/writer lock; reads take
/// the shared side so listener-heavy traffic is not serialized.
#[derive(Default)]
pub struct ResourceRegistry {
    inner: RwLock<RegistryInner>,
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ResourceRegistry")
            .field("shared", &inner.shared.len())
            .field("private", &inner.private.len())
            .finish()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource owned by one plugin. Fails if that owner already
    /// registered the name; the owner of an existing entry never changes.
    pub fn register_private<T: Send + Sync + 'static>(
        &self,
        plugin_id: &str,
        name: &str,
        value: T,
    ) -> Result<(), ResourceSystemError> {
        self.register_private_arc(plugin_id, name, Arc::new(value))
    }

    /// Like [`register_private`](Self::register_private) for values already
    /// behind an `Arc`.
    pub fn register_private_arc<T: Send + Sync + 'static>(
        &self,
        plugin_id: &str,
        name: &str,
        value: Arc<T>,
    ) -> Result<(), ResourceSystemError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let key = (plugin_id.to_string(), name.to_string());
        if inner.private.contains_key(&key) {
            return Err(ResourceSystemError::AlreadyRegistered {
                plugin_id: plugin_id.to_string(),
                name: name.to_string(),
            });
        }
        inner.private.insert(key, make_entry(name, Some(plugin_id), value));
        Ok(())
    }

    /// Register (or silently replace) a resource visible to every plugin.
    pub fn register_shared<T: Send + Sync + 'static>(&self, name: &str, value: T) {
        self.register_shared_arc(name, Arc::new(value));
    }

    /// Like [`register_shared`](Self::register_shared) for values already
    /// behind an `Arc`.
    pub fn register_shared_arc<T: Send + Sync + 'static>(&self, name: &str, value: Arc<T>) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner
            .shared
            .insert(name.to_string(), make_entry(name, None, value));
    }

    pub fn get_shared(&self, name: &str) -> Result<ResourceValue, ResourceSystemError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .shared
            .get(name)
            .map(|e| Arc::clone(&e.value))
            .ok_or_else(|| ResourceSystemError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn get_private(
        &self,
        plugin_id: &str,
        name: &str,
    ) -> Result<ResourceValue, ResourceSystemError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .private
            .get(&(plugin_id.to_string(), name.to_string()))
            .map(|e| Arc::clone(&e.value))
            .ok_or_else(|| ResourceSystemError::NotFound {
                name: name.to_string(),
            })
    }

    /// Typed shared lookup with an explicit mismatch error, never a panic.
    pub fn get_shared_typed<T: Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, ResourceSystemError> {
        let (value, actual) = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            let entry = inner
                .shared
                .get(name)
                .ok_or_else(|| ResourceSystemError::NotFound {
                    name: name.to_string(),
                })?;
            (Arc::clone(&entry.value), entry.info.type_name)
        };
        downcast(name, value, actual)
    }

    /// Typed private lookup with an explicit mismatch error, never a panic.
    pub fn get_private_typed<T: Send + Sync + 'static>(
        &self,
        plugin_id: &str,
        name: &str,
    ) -> Result<Arc<T>, ResourceSystemError> {
        let (value, actual) = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            let entry = inner
                .private
                .get(&(plugin_id.to_string(), name.to_string()))
                .ok_or_else(|| ResourceSystemError::NotFound {
                    name: name.to_string(),
                })?;
            (Arc::clone(&entry.value), entry.info.type_name)
        };
        downcast(name, value, actual)
    }

    /// Diagnostics lookup across both visibilities: shared entries first,
    /// then any plugin's private entry with that name. Intended for the
    /// manager's statistics, not for cross-plugin consumption.
    pub fn get_any(&self, name: &str) -> Option<ResourceValue> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = inner.shared.get(name) {
            return Some(Arc::clone(&entry.value));
        }
        inner
            .private
            .iter()
            .find(|((_, n), _)| n == name)
            .map(|(_, e)| Arc::clone(&e.value))
    }

    /// Remove a shared resource. Idempotent; returns whether it existed.
    pub fn remove_shared(&self, name: &str) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.shared.remove(name).is_some()
    }

    /// Drop every private resource owned by one plugin. Returns how many
    /// entries were removed.
    pub fn cleanup_plugin(&self, plugin_id: &str) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = inner.private.len();
        inner.private.retain(|(owner, _), _| owner != plugin_id);
        before - inner.private.len()
    }

    /// Snapshot of every entry for observability.
    pub fn list(&self) -> Vec<ResourceInfo> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut infos: Vec<ResourceInfo> = inner
            .shared
            .values()
            .chain(inner.private.values())
            .map(|e| e.info.clone())
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn stats(&self) -> ResourceStats {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut per_plugin: HashMap<String, usize> = HashMap::new();
        for (owner, _) in inner.private.keys() {
            *per_plugin.entry(owner.clone()).or_default() += 1;
        }
        ResourceStats {
            total: inner.shared.len() + inner.private.len(),
            shared: inner.shared.len(),
            private: inner.private.len(),
            per_plugin,
        }
    }
}

fn make_entry<T: Send + Sync + 'static>(
    name: &str,
    owner: Option<&str>,
    value: Arc<T>,
) -> ResourceEntry {
    let info = ResourceInfo {
        name: name.to_string(),
        type_name: std::any::type_name::<T>(),
        owner: owner.map(str::to_string),
        private: owner.is_some(),
        size_hint: std::mem::size_of::<T>() as u64,
        created_at: unix_timestamp(),
    };
    ResourceEntry {
        value: value as ResourceValue,
        info,
    }
}

fn downcast<T: Send + Sync + 'static>(
    name: &str,
    value: ResourceValue,
    actual: &'static str,
) -> Result<Arc<T>, ResourceSystemError> {
    value
        .downcast::<T>()
        .map_err(|_| ResourceSystemError::TypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
            actual,
        })
}
