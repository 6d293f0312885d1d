//! Reverse tunnel protocol delegated to a local program

use anyhow::Context;
use async_trait::async_trait;
use std::process::Stdio;

use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use pt_core::config::{MultiplexerConfig, ReversePortMapping};
use pt_core::traits::ReverseMultiplexer;
use pt_core::PodRef;

use crate::process::pump;

/// Namespace of the target pod, exported to the multiplexer
pub const NAMESPACE_ENV: &str = "PODTUNNEL_NAMESPACE";
/// Name of the target pod, exported to the multiplexer
pub const POD_ENV: &str = "PODTUNNEL_POD";

/// Runs a configured program that speaks the tunnel protocol on its stdio
///
/// The program's stdout is fed to the helper in the container and the
/// helper's output is written to the program's stdin. Mappings are passed
/// as `--map=[bind:]remote:local` arguments.
#[derive(Debug, Clone)]
pub struct CommandMultiplexer {
    config: MultiplexerConfig,
}

impl CommandMultiplexer {
    pub fn new(config: MultiplexerConfig) -> Self {
        Self { config }
    }

    fn command(&self, mappings: &[ReversePortMapping], pod: &PodRef) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .args(mappings.iter().map(|mapping| format!("--map={}", mapping)))
            .env(NAMESPACE_ENV, &pod.namespace)
            .env(POD_ENV, &pod.name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ReverseMultiplexer for CommandMultiplexer {
    async fn run_reverse(
        &self,
        reader: ReadHalf<DuplexStream>,
        writer: WriteHalf<DuplexStream>,
        mappings: Vec<ReversePortMapping>,
        close: CancellationToken,
        pod: &PodRef,
    ) -> anyhow::Result<()> {
        let child = self
            .command(&mappings, pod)
            .spawn()
            .with_context(|| format!("start multiplexer {}", self.config.command))?;

        pump(child, reader, writer, close, &self.config.command).await
    }
}
