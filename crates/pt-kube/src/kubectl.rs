//! Thin wrapper around the kubectl binary

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

use pt_core::config::KubeConfig;
use pt_core::{SelectedTarget, SessionCache};

/// Timeout for one-shot kubectl commands (listing, copying, checking)
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from running kubectl
#[derive(Error, Debug)]
pub enum KubectlError {
    /// The binary could not be started
    #[error("Failed to run {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The command did not finish in time
    #[error("kubectl {command} timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// kubectl exited with an error
    #[error("kubectl {command} failed: {stderr}")]
    Failed { command: String, stderr: String },

    /// kubectl output could not be parsed
    #[error("Failed to parse kubectl output: {0}")]
    Parse(#[from] serde_json::Error),
}

impl KubectlError {
    /// Whether the error means the cluster itself is unreachable
    pub fn is_cluster_not_connected(&self) -> bool {
        match self {
            KubectlError::Failed { stderr, .. } => {
                let stderr = stderr.to_lowercase();
                stderr.contains("connection refused")
                    || stderr.contains("no configuration has been provided")
                    || stderr.contains("dial tcp")
                    || stderr.contains("unable to connect to the server")
            }
            _ => false,
        }
    }
}

/// Runs kubectl against one context
#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: PathBuf,
    context: Option<String>,
}

impl Kubectl {
    pub fn new(binary: impl Into<PathBuf>, context: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            context,
        }
    }

    /// kubectl from the config, bound to the run's kube context
    pub fn from_config(config: &KubeConfig, cache: &SessionCache) -> Self {
        Self::new(config.kubectl.clone(), cache.kube_context.clone())
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }

    /// A command with the context applied; killed when dropped
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(context) = &self.context {
            cmd.arg("--context").arg(context);
        }
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    /// Run to completion and return stdout
    pub async fn output<I, S>(&self, args: I) -> Result<String, KubectlError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<S> = args.into_iter().collect();
        let command = describe(&args);

        let mut cmd = self.command();
        cmd.args(&args);

        let output = match timeout(COMMAND_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(KubectlError::Spawn {
                    binary: self.binary.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(KubectlError::Timeout {
                    command,
                    timeout: COMMAND_TIMEOUT,
                })
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(KubectlError::Failed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Run to completion and report whether it exited successfully
    pub async fn succeeds<I, S>(&self, args: I) -> Result<bool, KubectlError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        match self.output(args).await {
            Ok(_) => Ok(true),
            Err(KubectlError::Failed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Arguments for `kubectl exec` into `target`
pub fn exec_args(target: &SelectedTarget, interactive: bool, command: &[String]) -> Vec<String> {
    let mut args = vec!["exec".to_string()];
    if interactive {
        args.push("-i".to_string());
    }
    args.extend([
        "-n".to_string(),
        target.pod.namespace.clone(),
        target.pod.name.clone(),
    ]);
    if let Some(container) = &target.container {
        args.extend(["-c".to_string(), container.clone()]);
    }
    args.push("--".to_string());
    args.extend(command.iter().cloned());
    args
}

fn describe<S: AsRef<OsStr>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| arg.as_ref().to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Executable script standing in for kubectl
#[cfg(all(test, unix))]
pub(crate) fn fake_kubectl(dir: &std::path::Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("kubectl");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
