use std::fmt::Debug;

use async_trait::async_trait;

use crate::kernel::error::Result;

/// Core lifecycle trait for kernel components.
///
/// The application drives `initialize` then `start` on every component in
/// construction order, and `stop` in reverse order at shutdown. Components
/// are explicit objects owned by the application — there is no process-wide
/// registry to look them up from.
#[async_trait]
pub trait KernelComponent: Send + Sync + Debug {
    fn name(&self) -> &'static str;
    async fn initialize(&self) -> Result<()>;
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}
