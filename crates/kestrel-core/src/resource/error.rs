//! # Kestrel Core Resource Registry Errors
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceSystemError {
    #[error("Private resource '{name}' already registered by plugin '{plugin_id}'")]
    AlreadyRegistered { plugin_id: String, name: String },

    #[error("Resource not found: {name}")]
    NotFound { name: String },

    #[error("Resource '{name}' has type {actual}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}
