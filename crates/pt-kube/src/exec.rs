//! Exec streams via `kubectl exec -i`

use anyhow::Context;
use async_trait::async_trait;
use std::process::Stdio;

use tokio::io::DuplexStream;
use tokio_util::sync::CancellationToken;

use pt_core::traits::ExecStreamer;
use pt_core::SelectedTarget;

use crate::kubectl::{exec_args, Kubectl};
use crate::process::pump;

/// Streams a container process' stdio over `kubectl exec -i`
#[derive(Debug, Clone)]
pub struct KubectlExecStreamer {
    kubectl: Kubectl,
}

impl KubectlExecStreamer {
    pub fn new(kubectl: Kubectl) -> Self {
        Self { kubectl }
    }
}

#[async_trait]
impl ExecStreamer for KubectlExecStreamer {
    async fn stream(
        &self,
        target: &SelectedTarget,
        command: Vec<String>,
        io: DuplexStream,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let args = exec_args(target, true, &command);
        tracing::debug!("Running kubectl {}", args.join(" "));

        let child = self
            .kubectl
            .command()
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("start {}", self.kubectl.binary().display()))?;

        let (input, output) = tokio::io::split(io);
        pump(child, input, output, cancel, "kubectl exec").await
    }
}
