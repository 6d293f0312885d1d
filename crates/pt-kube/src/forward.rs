//! Forward tunnels via `kubectl port-forward`

use anyhow::{bail, Context};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use pt_core::traits::{ForwardEndpointProvider, ForwardHandle, ForwardTunnel};
use pt_core::{PodRef, PortPair};

use crate::kubectl::Kubectl;
use crate::process::collect_stderr;

/// Line prefix kubectl prints once a local listener is up
const READY_PREFIX: &str = "Forwarding from";

/// Opens forward tunnels by spawning `kubectl port-forward`
#[derive(Debug, Clone)]
pub struct KubectlPortForwarder {
    kubectl: Kubectl,
}

impl KubectlPortForwarder {
    pub fn new(kubectl: Kubectl) -> Self {
        Self { kubectl }
    }
}

/// Arguments for `kubectl port-forward`
///
/// kubectl takes one address list for all ports, so every distinct bind
/// address of the pairs is listened on for every port.
pub fn port_forward_args(pod: &PodRef, ports: &[PortPair]) -> Vec<String> {
    let mut addresses: Vec<&str> = Vec::new();
    for pair in ports {
        if !addresses.contains(&pair.bind_address.as_str()) {
            addresses.push(&pair.bind_address);
        }
    }

    let mut args = vec![
        "port-forward".to_string(),
        "-n".to_string(),
        pod.namespace.clone(),
        format!("pod/{}", pod.name),
        "--address".to_string(),
        addresses.join(","),
    ];
    args.extend(ports.iter().map(|pair| pair.to_string()));
    args
}

#[async_trait]
impl ForwardEndpointProvider for KubectlPortForwarder {
    async fn open_forward(&self, pod: &PodRef, ports: &[PortPair]) -> anyhow::Result<ForwardHandle> {
        let args = port_forward_args(pod, ports);
        tracing::debug!("Running kubectl {}", args.join(" "));

        let child = self
            .kubectl
            .command()
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("start {}", self.kubectl.binary().display()))?;

        let (ready_tx, ready) = oneshot::channel();
        let tunnel = KubectlForwardTunnel {
            pod: pod.clone(),
            child: Mutex::new(Some(child)),
            ready: std::sync::Mutex::new(Some(ready_tx)),
            cancel: CancellationToken::new(),
        };

        Ok(ForwardHandle {
            tunnel: Arc::new(tunnel),
            ready,
        })
    }
}

/// A running `kubectl port-forward` process
pub struct KubectlForwardTunnel {
    pod: PodRef,
    child: Mutex<Option<Child>>,
    ready: std::sync::Mutex<Option<oneshot::Sender<()>>>,
    cancel: CancellationToken,
}

impl KubectlForwardTunnel {
    fn take_ready(&self) -> Option<oneshot::Sender<()>> {
        self.ready.lock().ok().and_then(|mut ready| ready.take())
    }
}

#[async_trait]
impl ForwardTunnel for KubectlForwardTunnel {
    async fn run(&self) -> anyhow::Result<()> {
        let mut child = self
            .child
            .lock()
            .await
            .take()
            .context("port-forward is already running")?;
        let stdout = child.stdout.take().context("port-forward stdout not captured")?;
        let stderr = child.stderr.take().map(collect_stderr);
        let mut ready = self.take_ready();

        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Ok(());
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        tracing::debug!("[{}] {}", self.pod, line);
                        if line.starts_with(READY_PREFIX) {
                            if let Some(ready) = ready.take() {
                                let _ = ready.send(());
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!("Reading port-forward output failed: {}", e);
                        break;
                    }
                },
            }
        }

        let status = tokio::select! {
            _ = self.cancel.cancelled() => {
                let _ = child.kill().await;
                return Ok(());
            }
            status = child.wait() => status.context("wait for kubectl port-forward")?,
        };

        let stderr = match stderr {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        match stderr.trim() {
            "" => bail!("kubectl port-forward exited with {}", status),
            message => bail!("kubectl port-forward exited with {}: {}", status, message),
        }
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}
