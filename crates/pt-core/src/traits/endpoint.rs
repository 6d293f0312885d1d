//! Tunnel endpoint traits
//!
//! These are the boundaries to the transport layer. Forward tunnels are
//! opaque handles with a readiness signal; reverse tunnels are an exec
//! stream into the container plus a multiplexer speaking the tunnel protocol
//! over it.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::{Arch, ReversePortMapping};
use crate::types::{PodRef, PortPair, SelectedTarget};

/// Argument that starts the helper in tunnel mode
pub const HELPER_TUNNEL_COMMAND: &str = "tunnel";

/// A running forward tunnel
#[async_trait]
pub trait ForwardTunnel: Send + Sync {
    /// Carry traffic until the tunnel dies or is closed
    ///
    /// Returns the error that ended the tunnel. Spawned on its own task by
    /// the supervisor.
    async fn run(&self) -> anyhow::Result<()>;

    /// Stop the tunnel and release its sockets. Must be idempotent.
    fn close(&self);
}

/// An opened, not yet ready, forward tunnel
pub struct ForwardHandle {
    /// The tunnel itself
    pub tunnel: Arc<dyn ForwardTunnel>,
    /// Fires once the local listeners accept connections
    pub ready: oneshot::Receiver<()>,
}

/// Opens cluster-native port forwards
#[async_trait]
pub trait ForwardEndpointProvider: Send + Sync {
    /// Open a port forward to `pod` for every pair
    async fn open_forward(&self, pod: &PodRef, ports: &[PortPair])
        -> anyhow::Result<ForwardHandle>;
}

/// Places the helper binary into a container
#[async_trait]
pub trait HelperInjector: Send + Sync {
    /// Make sure the helper exists in the target container
    ///
    /// Idempotent: checks before copying, safe to call for every attempt.
    async fn ensure_helper(&self, target: &SelectedTarget, arch: Option<Arch>)
        -> anyhow::Result<()>;

    /// Path of the helper inside the container
    fn helper_path(&self) -> &str;
}

/// Runs a process in a container and pumps its stdio
#[async_trait]
pub trait ExecStreamer: Send + Sync {
    /// Run `command` in the target container
    ///
    /// Bytes read from `io` go to the process' stdin, its stdout is written
    /// back to `io`. Returns when the process exits, the transport drops or
    /// `cancel` fires; only the first two are errors.
    async fn stream(
        &self,
        target: &SelectedTarget,
        command: Vec<String>,
        io: DuplexStream,
        cancel: CancellationToken,
    ) -> anyhow::Result<()>;
}

/// Speaks the reverse tunnel protocol over a duplex byte stream
#[async_trait]
pub trait ReverseMultiplexer: Send + Sync {
    /// Serve `mappings` over the stream until `close` fires or the protocol fails
    async fn run_reverse(
        &self,
        reader: ReadHalf<DuplexStream>,
        writer: WriteHalf<DuplexStream>,
        mappings: Vec<ReversePortMapping>,
        close: CancellationToken,
        pod: &PodRef,
    ) -> anyhow::Result<()>;
}
