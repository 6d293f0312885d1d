//! pt-core: Core abstractions and configuration for podtunnel
//!
//! This crate provides the tunnel definitions, error types, lifecycle hook
//! events and the collaborator traits (target selection, tunnel endpoints,
//! hook dispatch) shared by the supervisor, the kubectl adapters and the CLI.

pub mod config;
pub mod error;
pub mod hook;
pub mod port;
pub mod traits;
pub mod types;

pub use error::{ConfigError, HookError, TunnelError};
pub use types::{Direction, PodRef, PortPair, SelectedTarget, SessionCache};
