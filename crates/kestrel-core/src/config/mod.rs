//! # Kestrel Core Configuration
//!
//! Provides the [`ConfigStore`]: an immutable, process-wide configuration
//! value loaded once at bootstrap. Plugins never see the whole store; the
//! runtime facade hands each plugin a view scoped to its own configuration
//! prefix.
//!
//! Supported formats are JSON, and (behind the default `toml-config` /
//! `yaml-config` features) TOML and YAML, selected by file extension.
pub mod error;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::error::ConfigSystemError;
use crate::kernel::constants;

/// Immutable configuration store with dot-separated prefix lookup.
///
/// The store is backed by a single [`serde_json::Value`] tree regardless of
/// the on-disk format, so prefix navigation and typed scanning behave the
/// same for TOML, YAML, and JSON inputs.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    root: Value,
}

impl ConfigStore {
    /// Create an empty store. Useful for tests and for hosts that configure
    /// everything programmatically.
    pub fn empty() -> Self {
        Self { root: Value::Null }
    }

    /// Build a store from an already-parsed JSON value.
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Load a configuration file, choosing the parser by file extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigSystemError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigSystemError::Io {
            source,
            path: path.to_path_buf(),
            operation: "read".to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            #[cfg(feature = "toml-config")]
            Some("toml") => Self::from_toml_str(&content),
            #[cfg(feature = "yaml-config")]
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Err(ConfigSystemError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Parse a JSON document into a store.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigSystemError> {
        let root = serde_json::from_str(content).map_err(|e| ConfigSystemError::Parse {
            format: "JSON".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { root })
    }

    /// Parse a TOML document into a store.
    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigSystemError> {
        let root = toml::from_str(content).map_err(|e| ConfigSystemError::Parse {
            format: "TOML".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { root })
    }

    /// Parse a YAML document into a store.
    #[cfg(feature = "yaml-config")]
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigSystemError> {
        let root = serde_yaml::from_str(content).map_err(|e| ConfigSystemError::Parse {
            format: "YAML".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { root })
    }

    /// Look up the subtree at a dot-separated prefix, e.g.
    /// `"kestrel.plugins.redis"`. An empty prefix addresses the root.
    pub fn section(&self, prefix: &str) -> Option<&Value> {
        if prefix.is_empty() {
            return Some(&self.root);
        }
        let mut current = &self.root;
        for segment in prefix.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Whether the prefix resolves to a configured section. An empty prefix
    /// counts as configured, so plugins without settings are still prepared.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        prefix.is_empty() || self.section(prefix).is_some()
    }

    /// Deserialize the subtree at `prefix` into a typed target.
    pub fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<T, ConfigSystemError> {
        let section = self
            .section(prefix)
            .ok_or_else(|| ConfigSystemError::MissingSection {
                prefix: prefix.to_string(),
            })?;
        serde_json::from_value(section.clone()).map_err(|source| ConfigSystemError::Deserialize {
            prefix: prefix.to_string(),
            source,
        })
    }

    /// Read an integer leaf value, if present and integral.
    pub fn get_u64(&self, prefix: &str) -> Option<u64> {
        self.section(prefix).and_then(Value::as_u64)
    }
}

/// Per-hook time budgets applied by the plugin manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTimeouts {
    pub init: Duration,
    pub start: Duration,
    pub stop: Duration,
}

impl Default for LifecycleTimeouts {
    fn default() -> Self {
        Self {
            init: Duration::from_millis(constants::DEFAULT_INIT_TIMEOUT_MS),
            start: Duration::from_millis(constants::DEFAULT_START_TIMEOUT_MS),
            stop: Duration::from_millis(constants::DEFAULT_STOP_TIMEOUT_MS),
        }
    }
}

impl LifecycleTimeouts {
    /// Scan timeouts from `kestrel.lifecycle.{init,start,stop}_timeout_ms`,
    /// clamping each to a sane operational range.
    pub fn from_config(config: &ConfigStore) -> Self {
        let defaults = Self::default();
        Self {
            init: clamped_ms(
                config.get_u64("kestrel.lifecycle.init_timeout_ms"),
                defaults.init,
                60_000,
            ),
            start: clamped_ms(
                config.get_u64("kestrel.lifecycle.start_timeout_ms"),
                defaults.start,
                60_000,
            ),
            stop: clamped_ms(
                config.get_u64("kestrel.lifecycle.stop_timeout_ms"),
                defaults.stop,
                120_000,
            ),
        }
    }
}

fn clamped_ms(configured: Option<u64>, default: Duration, max_ms: u64) -> Duration {
    match configured {
        Some(ms) => {
            let clamped = ms.clamp(1_000, max_ms);
            if clamped != ms {
                log::warn!(
                    "lifecycle timeout {}ms outside [1000, {}]ms, using {}ms",
                    ms,
                    max_ms,
                    clamped
                );
            }
            Duration::from_millis(clamped)
        }
        None => default,
    }
}
