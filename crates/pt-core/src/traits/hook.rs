//! Hook dispatch trait

use async_trait::async_trait;

use crate::error::HookError;
use crate::hook::LifecycleEvent;

/// Fires lifecycle events at whatever is listening
#[async_trait]
pub trait HookDispatcher: Send + Sync {
    /// Dispatch one event; an error aborts the caller only for fatal events
    async fn dispatch(&self, event: &LifecycleEvent<'_>) -> Result<(), HookError>;
}
