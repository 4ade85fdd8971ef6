//! # Kestrel Core Resource Registry
//!
//! A concurrency-safe store of named values exchanged between plugins,
//! split into per-plugin *private* entries and process-wide *shared*
//! entries. The registry is the only structure mutated concurrently by
//! multiple plugins; every access goes through its lock.
pub mod error;
pub mod registry;

pub use error::ResourceSystemError;
pub use registry::{ResourceInfo, ResourceRegistry, ResourceStats, ResourceValue};

#[cfg(test)]
mod tests;
