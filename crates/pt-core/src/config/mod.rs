//! Configuration management for podtunnel

mod hooks;
mod kube;
pub mod serde_utils;
mod supervisor;
mod tunnel;

pub use hooks::HookConfig;
pub use kube::{KubeConfig, MultiplexerConfig, DEFAULT_HELPER_CONTAINER_PATH};
pub use supervisor::SupervisorConfig;
pub use tunnel::{Arch, PortMapping, ReversePortMapping, TunnelDefinition, DEFAULT_BIND_ADDRESS};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ConfigError;
use crate::types::SessionCache;

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("podtunnel")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("podtunnel.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// The development session configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    /// Tunnel definitions, started in this order
    pub tunnels: Vec<TunnelDefinition>,

    /// Named images that `image(name)` selectors resolve against
    pub images: BTreeMap<String, String>,

    /// Lifecycle hooks
    pub hooks: Vec<HookConfig>,

    /// Supervisor timings
    pub supervisor: SupervisorConfig,

    /// Cluster access
    pub kube: KubeConfig,
}

impl DevConfig {
    /// Check everything that can be checked without a cluster
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();

        for definition in &self.tunnels {
            if definition.name.is_empty() {
                return Err(ConfigError::Invalid(
                    "tunnel definition without a name".to_string(),
                ));
            }
            if !names.insert(definition.name.as_str()) {
                return Err(ConfigError::DuplicateName(definition.name.clone()));
            }
            if definition.label_selector.is_empty() && definition.image_selector.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "tunnel '{}' needs a label_selector or an image_selector",
                    definition.name
                )));
            }

            definition.resolve_ports()?;

            for (index, mapping) in definition.reverse_ports.iter().enumerate() {
                if mapping.local_port.is_none() {
                    return Err(ConfigError::MissingLocalPort {
                        definition: definition.name.clone(),
                        index,
                    });
                }
            }

            if let Some(selector) = &definition.image_selector {
                resolve_image_selector(selector, &self.images)?;
            }
        }

        Ok(())
    }

    /// Definitions as shared handles, in configured order
    pub fn definitions(&self) -> Vec<Arc<TunnelDefinition>> {
        self.tunnels.iter().cloned().map(Arc::new).collect()
    }

    /// Read-only per-run state derived from this config
    pub fn session_cache(&self) -> SessionCache {
        SessionCache {
            kube_context: self.kube.context.clone(),
            default_namespace: self.kube.namespace.clone(),
        }
    }
}

/// Resolve an image selector value
///
/// `image(name)` names an entry of the `images` table; anything else is used
/// as a literal image reference.
pub fn resolve_image_selector(
    value: &str,
    images: &BTreeMap<String, String>,
) -> Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Invalid("empty image selector".to_string()));
    }

    match value
        .strip_prefix("image(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(name) => images
            .get(name.trim())
            .cloned()
            .ok_or_else(|| ConfigError::UnknownImage(name.trim().to_string())),
        None => Ok(value.to_string()),
    }
}
