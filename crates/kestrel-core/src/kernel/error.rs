//! # Kestrel Core Kernel Errors
//!
//! Defines [`Error`], the top-level error type folding every subsystem's
//! error, plus [`KernelLifecycleError`](Error::KernelLifecycleError) for
//! failures during application bootstrap, start, and shutdown phases.
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::config::error::ConfigSystemError;
use crate::event::error::EventSystemError;
use crate::plugin_system::error::PluginSystemError;
use crate::resource::error::ResourceSystemError;

/// Top-level error type for the Kestrel runtime.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed plugin system error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Specific, typed event system error
    #[error("Event system error: {0}")]
    EventSystem(#[from] EventSystemError),

    /// Specific, typed resource registry error
    #[error("Resource system error: {0}")]
    ResourceSystem(#[from] ResourceSystemError),

    /// Specific, typed configuration error
    #[error("Configuration error: {0}")]
    ConfigSystem(#[from] ConfigSystemError),

    /// Error occurring during a specific kernel lifecycle phase.
    #[error("Kernel lifecycle error during {phase} ({component}): {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        component: String,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// A phase in the application's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("Bootstrap")]
    Bootstrap,
    #[error("Initialize")]
    Initialize,
    #[error("Start")]
    Start,
    #[error("Shutdown")]
    Shutdown,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
