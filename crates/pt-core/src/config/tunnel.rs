//! Tunnel definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ConfigError;
use crate::types::{Direction, PortPair};

/// Address forward tunnels bind to when a mapping does not name one
pub const DEFAULT_BIND_ADDRESS: &str = "localhost";

/// One configured tunnel: which workload to reach and which ports to carry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelDefinition {
    /// Unique name, used in hook event names and logs
    pub name: String,

    /// Label selector used to find the target pod
    pub label_selector: BTreeMap<String, String>,

    /// Namespace of the target pod (falls back to the run's default)
    pub namespace: Option<String>,

    /// Image the target container must run, literal or `image(name)`
    pub image_selector: Option<String>,

    /// Container to reach (reverse tunnels only)
    pub container_name: Option<String>,

    /// Helper binary variant to inject (reverse tunnels only)
    pub arch: Option<Arch>,

    /// Forward mappings, local port to container port
    pub ports: Vec<PortMapping>,

    /// Reverse mappings, passed to the multiplexer unchanged
    pub reverse_ports: Vec<ReversePortMapping>,
}

impl TunnelDefinition {
    /// Create an empty definition with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether this definition carries any mapping for `direction`
    pub fn has_mappings(&self, direction: Direction) -> bool {
        match direction {
            Direction::Forward => !self.ports.is_empty(),
            Direction::Reverse => !self.reverse_ports.is_empty(),
        }
    }

    /// Label selector in `key=value,key=value` form
    pub fn label_selector_string(&self) -> String {
        self.label_selector
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Resolve every forward mapping, in order
    pub fn resolve_ports(&self) -> Result<Vec<PortPair>, ConfigError> {
        self.ports
            .iter()
            .enumerate()
            .map(|(index, mapping)| mapping.resolve(&self.name, index))
            .collect()
    }
}

/// A forward port mapping as written in the config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortMapping {
    /// Local port (required)
    pub local_port: Option<u16>,
    /// Container port, defaults to the local port
    pub remote_port: Option<u16>,
    /// Local bind address, defaults to `localhost`
    pub bind_address: Option<String>,
}

impl PortMapping {
    /// Mapping with only a local port
    pub fn local(port: u16) -> Self {
        Self {
            local_port: Some(port),
            ..Default::default()
        }
    }

    /// Apply the defaults and validate the ports
    ///
    /// `definition` and `index` only feed the error message.
    pub fn resolve(&self, definition: &str, index: usize) -> Result<PortPair, ConfigError> {
        let local = self.local_port.ok_or_else(|| ConfigError::MissingLocalPort {
            definition: definition.to_string(),
            index,
        })?;
        let remote = self.remote_port.unwrap_or(local);

        for port in [local, remote] {
            if port == 0 {
                return Err(ConfigError::InvalidPort {
                    definition: definition.to_string(),
                    index,
                    port,
                });
            }
        }

        let bind_address = match self.bind_address.as_deref() {
            Some(address) if !address.is_empty() => address.to_string(),
            _ => DEFAULT_BIND_ADDRESS.to_string(),
        };

        Ok(PortPair {
            local,
            remote,
            bind_address,
        })
    }
}

/// A reverse port mapping, interpreted by the multiplexer only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReversePortMapping {
    /// Local port traffic is delivered to
    pub local_port: Option<u16>,
    /// Port opened inside the container
    pub remote_port: Option<u16>,
    /// Address to bind inside the container
    pub bind_address: Option<String>,
}

impl fmt::Display for ReversePortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local = self.local_port.map(|p| p.to_string()).unwrap_or_default();
        let remote = self
            .remote_port
            .or(self.local_port)
            .map(|p| p.to_string())
            .unwrap_or_default();
        match self.bind_address.as_deref() {
            Some(address) if !address.is_empty() => write!(f, "{}:{}:{}", address, remote, local),
            _ => write!(f, "{}:{}", remote, local),
        }
    }
}

/// Helper binary variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    #[default]
    Amd64,
    Arm64,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::Amd64 => write!(f, "amd64"),
            Arch::Arm64 => write!(f, "arm64"),
        }
    }
}
