//! # Kestrel Core Configuration Errors
//!
//! Defines error types specific to the Kestrel configuration store, covering
//! file loading, format detection, parsing, and typed section scanning.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigSystemError {
    #[error("I/O error during '{operation}' on '{path}': {source}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
        operation: String,
    },

    #[error("Failed to parse {format} configuration: {message}")]
    Parse { format: String, message: String },

    #[error("Unknown or unsupported configuration format for path: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Configuration section not found for prefix '{prefix}'")]
    MissingSection { prefix: String },

    #[error("Failed to deserialize configuration at prefix '{prefix}': {source}")]
    Deserialize {
        prefix: String,
        #[source]
        source: serde_json::Error,
    },
}
