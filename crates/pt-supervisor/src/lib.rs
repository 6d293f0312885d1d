//! pt-supervisor: Tunnel supervisors for podtunnel
//!
//! A [`Supervisor`] keeps one tunnel definition connected: it selects a
//! target, opens the tunnel, waits for readiness and reconnects with a fixed
//! delay whenever the tunnel dies, until the shared interrupt fires. The
//! direction-specific parts live in [`ForwardDriver`] and [`ReverseDriver`].
//! A [`SessionSet`] starts one supervisor per definition.

pub mod backoff;
pub mod driver;
pub mod forward;
pub mod options;
pub mod orchestrator;
pub mod reverse;
pub mod state;
pub mod supervisor;

pub use backoff::RetryPolicy;
pub use driver::{TunnelDriver, TunnelSession};
pub use forward::ForwardDriver;
pub use options::SelectionDefaults;
pub use orchestrator::SessionSet;
pub use reverse::ReverseDriver;
pub use state::SessionState;
pub use supervisor::{SessionHandle, Supervisor};
