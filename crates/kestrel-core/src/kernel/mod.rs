//! # Kestrel Core Kernel
//!
//! Application assembly and the component lifecycle contract.
pub mod bootstrap;
pub mod component;
pub mod constants;
pub mod error;

pub use bootstrap::Application;
pub use component::KernelComponent;
pub use error::{Error, KernelLifecyclePhase, Result};

#[cfg(test)]
mod tests;
