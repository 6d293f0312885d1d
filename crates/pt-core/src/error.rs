//! Core error types for podtunnel

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that end a single tunnel attempt
///
/// Whether an error is fatal depends on where it surfaces: during the first
/// setup of a definition every variant aborts the run, once a session has
/// been established everything except configuration errors is retried.
#[derive(Error, Debug)]
pub enum TunnelError {
    /// The definition itself is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The target selector failed to produce a pod or container
    #[error("Error selecting pod: {0:#}")]
    TargetResolution(anyhow::Error),

    /// The helper binary could not be placed in the target container
    #[error("Error injecting helper: {0:#}")]
    HelperInjection(anyhow::Error),

    /// The tunnel endpoint could not be opened
    #[error("Error starting port forwarding: {0:#}")]
    Establish(anyhow::Error),

    /// The tunnel was opened but never signalled readiness
    #[error("Timeout waiting for port forwarding to start (waited {0:?})")]
    ReadinessTimeout(Duration),

    /// An established tunnel died
    #[error("{0:#}")]
    Runtime(anyhow::Error),

    /// A fatal lifecycle hook failed
    #[error("Hook error: {0}")]
    Hook(#[from] HookError),
}

impl TunnelError {
    /// Short machine-readable classification, used in hook payloads
    pub fn kind(&self) -> &'static str {
        match self {
            TunnelError::Config(_) => "config",
            TunnelError::TargetResolution(_) => "target_resolution",
            TunnelError::HelperInjection(_) => "helper_injection",
            TunnelError::Establish(_) => "establish",
            TunnelError::ReadinessTimeout(_) => "readiness_timeout",
            TunnelError::Runtime(_) => "runtime",
            TunnelError::Hook(_) => "hook",
        }
    }

    /// Configuration errors are never retried, not even in steady state
    pub fn is_config(&self) -> bool {
        matches!(self, TunnelError::Config(_))
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A port mapping without a local port
    #[error("port is not defined in portmapping {index} of '{definition}'")]
    MissingLocalPort { definition: String, index: usize },

    /// Port 0 is never a valid mapping
    #[error("invalid port {port} in portmapping {index} of '{definition}'")]
    InvalidPort {
        definition: String,
        index: usize,
        port: u16,
    },

    /// `image(name)` references an image that is not configured
    #[error("Unknown image reference '{0}'")]
    UnknownImage(String),

    /// Two tunnel definitions share a name
    #[error("Duplicate tunnel definition name '{0}'")]
    DuplicateName(String),
}

/// Errors raised while dispatching lifecycle hooks
#[derive(Error, Debug)]
pub enum HookError {
    /// A hook command ran and reported failure
    #[error("hook '{command}' for event {event} failed: {reason}")]
    Failed {
        event: String,
        command: String,
        reason: String,
    },

    /// A hook command could not be started
    #[error("hook '{command}' for event {event} could not be started: {source}")]
    Spawn {
        event: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Any other dispatcher failure
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_timeout_message() {
        let err = TunnelError::ReadinessTimeout(Duration::from_secs(20));
        assert!(err
            .to_string()
            .starts_with("Timeout waiting for port forwarding to start"));
        assert_eq!(err.kind(), "readiness_timeout");
    }

    #[test]
    fn test_target_resolution_keeps_context_chain() {
        let source = anyhow::anyhow!("connection refused").context("list pods");
        let err = TunnelError::TargetResolution(source);
        assert_eq!(
            err.to_string(),
            "Error selecting pod: list pods: connection refused"
        );
    }

    #[test]
    fn test_config_errors_are_flagged() {
        let err: TunnelError = ConfigError::MissingLocalPort {
            definition: "api".to_string(),
            index: 1,
        }
        .into();
        assert!(err.is_config());
        assert_eq!(
            err.to_string(),
            "Configuration error: port is not defined in portmapping 1 of 'api'"
        );
    }
}
