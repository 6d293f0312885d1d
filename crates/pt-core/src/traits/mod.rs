//! Collaborator trait definitions

mod endpoint;
mod hook;
mod selector;

pub use endpoint::{
    ExecStreamer, ForwardEndpointProvider, ForwardHandle, ForwardTunnel, HelperInjector,
    ReverseMultiplexer, HELPER_TUNNEL_COMMAND,
};
pub use hook::HookDispatcher;
pub use selector::{SelectionOptions, TargetSelector, WaitingStrategy};
