//! Cluster access configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the injected helper lives inside the container
pub const DEFAULT_HELPER_CONTAINER_PATH: &str = "/tmp/podtunnel-helper";

/// How podtunnel talks to the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubeConfig {
    /// kubectl executable
    pub kubectl: PathBuf,

    /// Kube context to use (defaults to the current context)
    pub context: Option<String>,

    /// Namespace for definitions that do not name one
    pub namespace: Option<String>,

    /// Local directory holding `podtunnel-helper-<arch>` binaries
    pub helper_dir: PathBuf,

    /// Path the helper is copied to inside the container
    pub helper_container_path: String,

    /// Local program speaking the reverse tunnel protocol on stdin/stdout
    pub multiplexer: Option<MultiplexerConfig>,
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            kubectl: PathBuf::from("kubectl"),
            context: None,
            namespace: None,
            helper_dir: super::default_config_dir().join("helpers"),
            helper_container_path: DEFAULT_HELPER_CONTAINER_PATH.to_string(),
            multiplexer: None,
        }
    }
}

/// External reverse multiplexer program
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiplexerConfig {
    /// Program to run
    pub command: String,
    /// Arguments placed before the `--map` flags
    pub args: Vec<String>,
}
