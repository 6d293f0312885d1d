//! Lifecycle hook configuration

use serde::{Deserialize, Serialize};

/// A command run when one of its events fires
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Event names this hook reacts to, e.g. `restart:portForwarding`,
    /// `start:portForwarding:api` or `portForwarding.stop`
    pub events: Vec<String>,

    /// Program to run
    pub command: String,

    /// Program arguments
    pub args: Vec<String>,
}

impl HookConfig {
    /// Whether any of `names` is one of this hook's events
    pub fn matches<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.events
            .iter()
            .any(|event| names.iter().any(|name| name.as_ref() == event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_any_name() {
        let hook = HookConfig {
            events: vec!["portForwarding.restart".to_string()],
            command: "notify-send".to_string(),
            args: vec![],
        };
        assert!(hook.matches(&["restart:portForwarding", "portForwarding.restart"]));
        assert!(!hook.matches(&["stop:portForwarding"]));
    }
}
