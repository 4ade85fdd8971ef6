use std::sync::atomic::{AtomicU64, Ordering};

use semver::Version;
use serde::Serialize;

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::Plugin;

// Process-wide sequence backing instance-id uniqueness.
static INSTANCE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Immutable identity metadata for one plugin instance.
///
/// Built once when the manager instantiates the plugin; the derived
/// `instance_id` is unique for the process lifetime even if the same plugin
/// is created more than once.
#[derive(Debug, Clone, Serialize)]
pub struct PluginDescriptor {
    name: String,
    version: Version,
    description: String,
    weight: i32,
    config_prefix: String,
    instance_id: String,
}

impl PluginDescriptor {
    /// Derive a descriptor from a plugin's metadata methods. Fails if the
    /// declared version is not valid semver.
    pub fn for_plugin(plugin: &dyn Plugin) -> Result<Self, PluginSystemError> {
        let name = plugin.name().to_string();
        let version =
            Version::parse(plugin.version()).map_err(|source| PluginSystemError::VersionParse {
                plugin: name.clone(),
                source,
            })?;
        let seq = INSTANCE_SEQ.fetch_add(1, Ordering::Relaxed);
        let instance_id = format!("{}@{}#{}", name, version, seq);
        Ok(Self {
            name,
            version,
            description: plugin.description().to_string(),
            weight: plugin.weight(),
            config_prefix: plugin.config_prefix().to_string(),
            instance_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn config_prefix(&self) -> &str {
        &self.config_prefix
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}
