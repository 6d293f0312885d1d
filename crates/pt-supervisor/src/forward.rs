//! Forward tunnels: a local port reaches a container port

use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use pt_core::config::TunnelDefinition;
use pt_core::port::is_port_free;
use pt_core::traits::{ForwardEndpointProvider, ForwardHandle, ForwardTunnel, TargetSelector};
use pt_core::{Direction, PodRef, PortPair, TunnelError};

use crate::driver::{TunnelDriver, TunnelSession};
use crate::options::SelectionDefaults;

/// How long a closed tunnel may take to wind down before its task is aborted
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Driver for forward tunnels
pub struct ForwardDriver {
    selector: Arc<dyn TargetSelector>,
    provider: Arc<dyn ForwardEndpointProvider>,
    selection: SelectionDefaults,
}

impl ForwardDriver {
    pub fn new(
        selector: Arc<dyn TargetSelector>,
        provider: Arc<dyn ForwardEndpointProvider>,
        selection: SelectionDefaults,
    ) -> Self {
        Self {
            selector,
            provider,
            selection,
        }
    }
}

#[async_trait]
impl TunnelDriver for ForwardDriver {
    type Target = PodRef;

    const DIRECTION: Direction = Direction::Forward;

    async fn resolve_target(
        &self,
        definition: &TunnelDefinition,
    ) -> Result<Option<PodRef>, TunnelError> {
        let options = self.selection.options_for(definition, Self::DIRECTION)?;
        self.selector
            .select_pod(&options)
            .await
            .map_err(TunnelError::TargetResolution)
    }

    async fn establish(
        &self,
        definition: &TunnelDefinition,
        pod: &PodRef,
    ) -> Result<Box<dyn TunnelSession>, TunnelError> {
        let ports = definition.resolve_ports()?;

        for pair in &ports {
            if !is_port_free(pair.local) {
                tracing::warn!(
                    "Seems like port {} is already in use. Is another application using that port?",
                    pair.local
                );
            }
        }

        let ForwardHandle { tunnel, ready } = self
            .provider
            .open_forward(pod, &ports)
            .await
            .map_err(TunnelError::Establish)?;

        let (failure_tx, failure) = mpsc::channel(1);
        let runner = Arc::clone(&tunnel);
        let task = tokio::spawn(async move {
            let error = match runner.run().await {
                Ok(()) => anyhow!("port forwarding ended unexpectedly"),
                Err(e) => e,
            };
            let _ = failure_tx.send(error).await;
        });

        Ok(Box::new(ForwardSession {
            pod: pod.clone(),
            ports,
            tunnel,
            ready: Some(ready),
            failure,
            task: Some(task),
        }))
    }
}

/// An opened forward tunnel and the task running it
struct ForwardSession {
    pod: PodRef,
    ports: Vec<PortPair>,
    tunnel: Arc<dyn ForwardTunnel>,
    ready: Option<oneshot::Receiver<()>>,
    failure: mpsc::Receiver<anyhow::Error>,
    task: Option<JoinHandle<()>>,
}

enum Readiness {
    Ready,
    Failed(anyhow::Error),
    SignalDropped,
}

#[async_trait]
impl TunnelSession for ForwardSession {
    async fn wait_ready(&mut self) -> Result<(), TunnelError> {
        let Some(ready) = self.ready.take() else {
            return Ok(());
        };

        let readiness = tokio::select! {
            biased;
            Some(error) = self.failure.recv() => Readiness::Failed(error),
            signal = ready => match signal {
                Ok(()) => Readiness::Ready,
                Err(_) => Readiness::SignalDropped,
            },
        };

        let error = match readiness {
            Readiness::Ready => return Ok(()),
            Readiness::Failed(error) => error,
            // The provider gave up on readiness; the run task reports why
            Readiness::SignalDropped => self
                .failure
                .recv()
                .await
                .unwrap_or_else(|| anyhow!("port forwarding ended before it was ready")),
        };
        Err(TunnelError::Establish(error.context("forward ports")))
    }

    async fn wait_failure(&mut self) -> TunnelError {
        let error = self
            .failure
            .recv()
            .await
            .unwrap_or_else(|| anyhow!("port forwarding task ended"));
        TunnelError::Runtime(error.context(format!("lost connection to pod {}", self.pod)))
    }

    async fn close(&mut self) {
        self.tunnel.close();
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
                tracing::debug!("Port forwarding for {} did not stop, aborting", self.pod);
                task.abort();
            }
        }
    }

    fn describe(&self) -> String {
        let ports: Vec<String> = self.ports.iter().map(|p| p.to_string()).collect();
        format!("{} ({})", self.pod, ports.join(", "))
    }
}

impl Drop for ForwardSession {
    fn drop(&mut self) {
        self.tunnel.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
