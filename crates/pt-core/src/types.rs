//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a pod in the cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PodRef {
    /// Namespace the pod lives in
    pub namespace: String,
    /// Pod name
    pub name: String,
}

impl PodRef {
    /// Create a new pod reference
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Result of target selection, valid for a single session attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedTarget {
    /// Selected pod
    pub pod: PodRef,
    /// Selected container, set for container-scoped selection
    pub container: Option<String>,
}

impl SelectedTarget {
    /// Target a whole pod
    pub fn pod(pod: PodRef) -> Self {
        Self {
            pod,
            container: None,
        }
    }

    /// Target a specific container of a pod
    pub fn container(pod: PodRef, container: impl Into<String>) -> Self {
        Self {
            pod,
            container: Some(container.into()),
        }
    }
}

impl fmt::Display for SelectedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.container {
            Some(container) => write!(f, "{}/{}", self.pod, container),
            None => write!(f, "{}", self.pod),
        }
    }
}

/// Direction of a tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Remote container port reachable through a local port
    Forward,
    /// Local port reachable from inside the remote container
    Reverse,
}

impl Direction {
    /// Name used in hook event identifiers
    pub fn event_name(&self) -> &'static str {
        match self {
            Direction::Forward => "portForwarding",
            Direction::Reverse => "reversePortForwarding",
        }
    }

    /// Human-readable label for log messages
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Forward => "port forwarding",
            Direction::Reverse => "reverse port forwarding",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// A fully resolved forward port pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortPair {
    /// Local port to listen on
    pub local: u16,
    /// Container port traffic is sent to
    pub remote: u16,
    /// Local address to bind
    pub bind_address: String,
}

impl fmt::Display for PortPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.local, self.remote)
    }
}

/// Per-run state shared read-only by every session
///
/// Carries what was last known about the cluster connection so that
/// sessions started later in the run resolve targets against the same
/// context. Sessions never mutate it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCache {
    /// Last-known kube context
    pub kube_context: Option<String>,
    /// Namespace used when a definition does not name one
    pub default_namespace: Option<String>,
}
