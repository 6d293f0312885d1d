//! pt-kube: kubectl-backed collaborators for podtunnel
//!
//! Every cluster interaction goes through the `kubectl` binary:
//! - pod and container selection (`get pods -o json`)
//! - forward tunnels (`port-forward`)
//! - helper injection (`exec` + `cp`)
//! - reverse tunnel transport (`exec -i`)
//!
//! The reverse tunnel protocol itself is spoken by an external program, see
//! [`CommandMultiplexer`].

pub mod exec;
pub mod forward;
pub mod inject;
pub mod kubectl;
pub mod multiplexer;
pub mod pod;
mod process;
pub mod selector;

pub use exec::KubectlExecStreamer;
pub use forward::{KubectlForwardTunnel, KubectlPortForwarder};
pub use inject::KubectlHelperInjector;
pub use kubectl::{Kubectl, KubectlError};
pub use multiplexer::CommandMultiplexer;
pub use selector::KubectlSelector;
