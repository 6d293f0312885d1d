//! Lifecycle hook events
//!
//! Every supervisor transition that outside tooling may care about is
//! published as a [`LifecycleEvent`]. An event is identified by
//! `<phase>:<direction>` (for example `restart:portForwarding`) and is also
//! published under a per-definition name and a dotted alias so hooks can
//! subscribe as broadly or narrowly as they like.

mod command;

pub use command::CommandHookDispatcher;

use serde_json::json;
use std::fmt;

use crate::config::TunnelDefinition;
use crate::error::TunnelError;
use crate::types::Direction;

/// Lifecycle phase of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Start,
    Error,
    Restart,
    Stop,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::Start => "start",
            HookPhase::Error => "error",
            HookPhase::Restart => "restart",
            HookPhase::Stop => "stop",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase-specific event data
#[derive(Debug, Clone, Copy)]
pub enum EventKind<'a> {
    /// A definition is about to be set up
    Start,
    /// First setup of a definition failed
    Error(&'a TunnelError),
    /// A session failed and is being re-established
    Restart(&'a TunnelError),
    /// A session was interrupted and torn down
    Stop,
}

/// One lifecycle event for one tunnel definition
#[derive(Debug, Clone, Copy)]
pub struct LifecycleEvent<'a> {
    /// Tunnel direction
    pub direction: Direction,
    /// Definition the event is about
    pub definition: &'a TunnelDefinition,
    /// Phase and phase data
    pub kind: EventKind<'a>,
}

impl<'a> LifecycleEvent<'a> {
    pub fn new(direction: Direction, definition: &'a TunnelDefinition, kind: EventKind<'a>) -> Self {
        Self {
            direction,
            definition,
            kind,
        }
    }

    pub fn phase(&self) -> HookPhase {
        match self.kind {
            EventKind::Start => HookPhase::Start,
            EventKind::Error(_) => HookPhase::Error,
            EventKind::Restart(_) => HookPhase::Restart,
            EventKind::Stop => HookPhase::Stop,
        }
    }

    /// The error carried by error and restart events
    pub fn error(&self) -> Option<&'a TunnelError> {
        match self.kind {
            EventKind::Error(error) | EventKind::Restart(error) => Some(error),
            EventKind::Start | EventKind::Stop => None,
        }
    }

    /// Primary event name, e.g. `start:reversePortForwarding`
    pub fn name(&self) -> String {
        format!("{}:{}", self.phase(), self.direction.event_name())
    }

    /// Every name the event is published under
    pub fn names(&self) -> Vec<String> {
        let name = self.name();
        vec![
            format!("{}:{}", name, self.definition.name),
            format!("{}.{}", self.direction.event_name(), self.phase()),
            name,
        ]
    }

    /// JSON payload handed to hooks
    pub fn payload(&self) -> serde_json::Value {
        let config_key = match self.direction {
            Direction::Forward => "port_forwarding_config",
            Direction::Reverse => "reverse_port_forwarding_config",
        };

        let mut payload = json!({
            "event": self.name(),
            "name": self.definition.name,
            config_key: self.definition,
        });

        if let Some(error) = self.error() {
            payload["error"] = json!({
                "kind": error.kind(),
                "message": error.to_string(),
            });
        }

        payload
    }
}
