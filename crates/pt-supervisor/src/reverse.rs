//! Reverse tunnels: a container port reaches a local port
//!
//! The helper binary is injected into the container and started over an
//! exec stream. The stream is bridged to an in-memory duplex whose other end
//! is handed, split into halves, to the multiplexer that speaks the tunnel
//! protocol.

use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pt_core::config::{ReversePortMapping, TunnelDefinition};
use pt_core::traits::{
    ExecStreamer, HelperInjector, ReverseMultiplexer, TargetSelector, HELPER_TUNNEL_COMMAND,
};
use pt_core::{Direction, SelectedTarget, TunnelError};

use crate::driver::{TunnelDriver, TunnelSession};
use crate::options::SelectionDefaults;

/// Buffer size of the in-memory duplex between exec stream and multiplexer
const STREAM_BUFFER: usize = 64 * 1024;

/// How long the transport tasks may take to wind down after cancellation
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Driver for reverse tunnels
pub struct ReverseDriver {
    selector: Arc<dyn TargetSelector>,
    injector: Arc<dyn HelperInjector>,
    streamer: Arc<dyn ExecStreamer>,
    multiplexer: Arc<dyn ReverseMultiplexer>,
    selection: SelectionDefaults,
}

impl ReverseDriver {
    pub fn new(
        selector: Arc<dyn TargetSelector>,
        injector: Arc<dyn HelperInjector>,
        streamer: Arc<dyn ExecStreamer>,
        multiplexer: Arc<dyn ReverseMultiplexer>,
        selection: SelectionDefaults,
    ) -> Self {
        Self {
            selector,
            injector,
            streamer,
            multiplexer,
            selection,
        }
    }
}

#[async_trait]
impl TunnelDriver for ReverseDriver {
    type Target = SelectedTarget;

    const DIRECTION: Direction = Direction::Reverse;

    async fn resolve_target(
        &self,
        definition: &TunnelDefinition,
    ) -> Result<Option<SelectedTarget>, TunnelError> {
        let options = self.selection.options_for(definition, Self::DIRECTION)?;
        let target = self
            .selector
            .select_container(&options)
            .await
            .map_err(TunnelError::TargetResolution)?;
        Ok(Some(target))
    }

    async fn establish(
        &self,
        definition: &TunnelDefinition,
        target: &SelectedTarget,
    ) -> Result<Box<dyn TunnelSession>, TunnelError> {
        self.injector
            .ensure_helper(target, definition.arch)
            .await
            .map_err(TunnelError::HelperInjection)?;

        let command = vec![
            self.injector.helper_path().to_string(),
            HELPER_TUNNEL_COMMAND.to_string(),
        ];
        let (local, remote) = tokio::io::duplex(STREAM_BUFFER);
        let (reader, writer) = tokio::io::split(local);
        let cancel = CancellationToken::new();
        let (failure_tx, failure) = mpsc::channel(2);

        let transport = {
            let streamer = Arc::clone(&self.streamer);
            let target = target.clone();
            let cancel = cancel.clone();
            let failure_tx = failure_tx.clone();
            tokio::spawn(async move {
                let result = streamer.stream(&target, command, remote, cancel.clone()).await;
                if cancel.is_cancelled() {
                    return;
                }
                let error = match result {
                    Ok(()) => anyhow!("exec stream closed"),
                    Err(e) => e,
                };
                let _ = failure_tx
                    .send(error.context(format!("connection lost to pod {}", target.pod)))
                    .await;
            })
        };

        let mappings = definition.reverse_ports.clone();
        let multiplexer = {
            let multiplexer = Arc::clone(&self.multiplexer);
            let pod = target.pod.clone();
            let mappings = mappings.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let result = multiplexer
                    .run_reverse(reader, writer, mappings, cancel.clone(), &pod)
                    .await;
                if cancel.is_cancelled() {
                    return;
                }
                let error = match result {
                    Ok(()) => anyhow!("reverse tunnel closed"),
                    Err(e) => e,
                };
                let _ = failure_tx.send(error.context("reverse tunnel protocol")).await;
            })
        };

        Ok(Box::new(ReverseSession {
            target: target.clone(),
            mappings,
            cancel,
            failure,
            tasks: vec![transport, multiplexer],
        }))
    }
}

/// A running reverse tunnel: exec transport plus multiplexer
struct ReverseSession {
    target: SelectedTarget,
    mappings: Vec<ReversePortMapping>,
    cancel: CancellationToken,
    failure: mpsc::Receiver<anyhow::Error>,
    tasks: Vec<JoinHandle<()>>,
}

#[async_trait]
impl TunnelSession for ReverseSession {
    /// Ready as soon as both tasks are spawned
    ///
    /// The helper has no readiness handshake. A stream that dies right after
    /// startup is reported by `wait_failure` and goes through the restart
    /// loop like any later failure.
    async fn wait_ready(&mut self) -> Result<(), TunnelError> {
        Ok(())
    }

    async fn wait_failure(&mut self) -> TunnelError {
        let error = self
            .failure
            .recv()
            .await
            .unwrap_or_else(|| anyhow!("reverse tunnel tasks ended"));
        TunnelError::Runtime(error)
    }

    async fn close(&mut self) {
        self.cancel.cancel();
        for mut task in self.tasks.drain(..) {
            if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
                tracing::debug!("Reverse tunnel task for {} did not stop, aborting", self.target);
                task.abort();
            }
        }
    }

    fn describe(&self) -> String {
        let mappings: Vec<String> = self.mappings.iter().map(|m| m.to_string()).collect();
        format!("{} ({})", self.target, mappings.join(", "))
    }
}

impl Drop for ReverseSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
