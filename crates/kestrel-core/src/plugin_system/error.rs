//! # Kestrel Core Plugin System Errors
//!
//! Defines error types specific to the plugin system.
//!
//! This module includes [`PluginSystemError`], the primary enum covering
//! registration conflicts, unknown-plugin lookups, lifecycle hook failures
//! (including timeouts and contained panics), dependency resolution
//! problems, and typed-lookup mismatches.
use std::fmt;

use thiserror::Error;

use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::state::PluginState;

/// The lifecycle hook a failure occurred in, for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleHook {
    InitializeResources,
    StartupTasks,
    CleanupTasks,
    Configure,
    CheckHealth,
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleHook::InitializeResources => "initialize_resources",
            LifecycleHook::StartupTasks => "startup_tasks",
            LifecycleHook::CleanupTasks => "cleanup_tasks",
            LifecycleHook::Configure => "configure",
            LifecycleHook::CheckHealth => "check_health",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PluginSystemError {
    #[error("Plugin registration error for '{plugin}': {message}")]
    RegistrationError { plugin: String, message: String },

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("Plugin '{plugin}' hook '{hook}' failed: {message}")]
    LifecycleError {
        plugin: String,
        hook: LifecycleHook,
        message: String,
    },

    #[error("Plugin '{plugin}' hook '{hook}' timed out after {timeout_ms}ms")]
    LifecycleTimeout {
        plugin: String,
        hook: LifecycleHook,
        timeout_ms: u64,
    },

    #[error("Plugin '{plugin}' hook '{hook}' panicked: {message}")]
    LifecyclePanic {
        plugin: String,
        hook: LifecycleHook,
        message: String,
    },

    #[error("Dependency resolution failed: {0}")]
    DependencyResolution(#[from] DependencyError),

    #[error("Cannot stop plugin '{plugin}': still depended upon by {}", .dependents.join(", "))]
    StillDependedUpon {
        plugin: String,
        dependents: Vec<String>,
    },

    #[error("Invalid state transition for plugin '{plugin}': {from} -> {to}")]
    InvalidTransition {
        plugin: String,
        from: PluginState,
        to: PluginState,
    },

    #[error("Plugin '{plugin}' is not active (state: {state})")]
    NotActive { plugin: String, state: PluginState },

    #[error("Plugin '{plugin}' has unexpected type (expected {expected})")]
    TypeMismatch {
        plugin: String,
        expected: &'static str,
    },

    #[error("Invalid version for plugin '{plugin}': {source}")]
    VersionParse {
        plugin: String,
        #[source]
        source: semver::Error,
    },

    #[error("Internal plugin system error: {0}")]
    InternalError(String),
}
