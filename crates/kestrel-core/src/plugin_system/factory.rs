use std::collections::HashMap;
use std::fmt;

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::Plugin;

/// Constructor stored per registered plugin.
pub type PluginConstructor = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

struct Registration {
    config_prefix: String,
    order: usize,
    constructor: PluginConstructor,
}

/// Registry mapping plugin name to configuration prefix and constructor.
///
/// Pure metadata: registrations accumulate before orchestration starts and
/// the factory has no runtime behavior beyond lookup and creation. It is an
/// explicit object owned by the assembling code — there is no process-wide
/// factory, and nothing registers itself as an import side effect.
#[derive(Default)]
pub struct PluginFactory {
    registrations: HashMap<String, Registration>,
    next_order: usize,
}

impl fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginFactory")
            .field("registered", &self.registrations.len())
            .finish_non_exhaustive()
    }
}

impl PluginFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin constructor under a unique name.
    ///
    /// A duplicate name is a loud failure: silently shadowing a plugin with
    /// the same identity is how misassembled hosts lose functionality.
    pub fn register<F>(
        &mut self,
        name: &str,
        config_prefix: &str,
        constructor: F,
    ) -> Result<(), PluginSystemError>
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        if self.registrations.contains_key(name) {
            return Err(PluginSystemError::RegistrationError {
                plugin: name.to_string(),
                message: "already registered".to_string(),
            });
        }
        let order = self.next_order;
        self.next_order += 1;
        self.registrations.insert(
            name.to_string(),
            Registration {
                config_prefix: config_prefix.to_string(),
                order,
                constructor: Box::new(constructor),
            },
        );
        Ok(())
    }

    /// Remove a registration. Idempotent.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.registrations.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registrations.contains_key(name)
    }

    /// Instantiate a fresh plugin via its stored constructor.
    pub fn create(&self, name: &str) -> Result<Box<dyn Plugin>, PluginSystemError> {
        let registration = self
            .registrations
            .get(name)
            .ok_or_else(|| PluginSystemError::UnknownPlugin(name.to_string()))?;
        Ok((registration.constructor)())
    }

    /// The configuration-prefix to plugin-names mapping, letting the
    /// manager discover which plugins are configured without invoking any
    /// constructor. Names within one prefix keep registration order.
    pub fn registration_table(&self) -> HashMap<String, Vec<String>> {
        let mut table: HashMap<String, Vec<(usize, String)>> = HashMap::new();
        for (name, registration) in &self.registrations {
            table
                .entry(registration.config_prefix.clone())
                .or_default()
                .push((registration.order, name.clone()));
        }
        table
            .into_iter()
            .map(|(prefix, mut names)| {
                names.sort_by_key(|(order, _)| *order);
                (prefix, names.into_iter().map(|(_, name)| name).collect())
            })
            .collect()
    }

    /// Position of a plugin in registration order, used as the final
    /// ordering tie-break.
    pub fn registration_order(&self, name: &str) -> Option<usize> {
        self.registrations.get(name).map(|r| r.order)
    }

    /// The configuration prefix a plugin was registered with.
    pub fn config_prefix_of(&self, name: &str) -> Option<&str> {
        self.registrations.get(name).map(|r| r.config_prefix.as_str())
    }

    /// All registered names, in registration order.
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<(usize, String)> = self
            .registrations
            .iter()
            .map(|(name, r)| (r.order, name.clone()))
            .collect();
        names.sort_by_key(|(order, _)| *order);
        names.into_iter().map(|(_, name)| name).collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
