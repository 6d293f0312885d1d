//! Direction drivers
//!
//! A [`TunnelDriver`] supplies the direction-specific half of a supervisor:
//! how to find a target and how to open a tunnel to it. Everything else
//! (readiness timeout, retry loop, hooks, interruption) lives in
//! [`crate::Supervisor`] and is shared by both directions.

use async_trait::async_trait;
use std::fmt;

use pt_core::config::TunnelDefinition;
use pt_core::{Direction, TunnelError};

/// Direction-specific target resolution and tunnel establishment
#[async_trait]
pub trait TunnelDriver: Send + Sync + 'static {
    /// What a successful selection yields
    type Target: fmt::Display + Send + Sync + 'static;

    /// Direction this driver serves
    const DIRECTION: Direction;

    /// Resolve the target for one attempt
    ///
    /// `Ok(None)` means nothing matches right now.
    async fn resolve_target(
        &self,
        definition: &TunnelDefinition,
    ) -> Result<Option<Self::Target>, TunnelError>;

    /// Open a tunnel to `target`
    ///
    /// The returned session owns every resource of the tunnel and releases
    /// them when dropped, even if it is never closed explicitly.
    async fn establish(
        &self,
        definition: &TunnelDefinition,
        target: &Self::Target,
    ) -> Result<Box<dyn TunnelSession>, TunnelError>;
}

/// One opened tunnel
#[async_trait]
pub trait TunnelSession: Send {
    /// Resolve once the tunnel carries traffic, or with the error that
    /// prevented it
    async fn wait_ready(&mut self) -> Result<(), TunnelError>;

    /// Resolve with the error that ended the tunnel
    async fn wait_failure(&mut self) -> TunnelError;

    /// Release every resource. Idempotent.
    async fn close(&mut self);

    /// Short description for log messages
    fn describe(&self) -> String;
}
