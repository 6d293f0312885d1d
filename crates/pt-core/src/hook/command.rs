//! Hook dispatcher that runs configured commands

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::LifecycleEvent;
use crate::config::HookConfig;
use crate::error::HookError;
use crate::traits::HookDispatcher;

/// Environment variable holding the primary event name
pub const HOOK_EVENT_ENV: &str = "PODTUNNEL_HOOK_EVENT";
/// Environment variable holding the JSON payload
pub const HOOK_PAYLOAD_ENV: &str = "PODTUNNEL_HOOK_PAYLOAD";

/// Runs every configured hook whose event list matches, one after another
///
/// The first failing hook aborts dispatch of that event.
#[derive(Debug, Clone, Default)]
pub struct CommandHookDispatcher {
    hooks: Vec<HookConfig>,
}

impl CommandHookDispatcher {
    pub fn new(hooks: Vec<HookConfig>) -> Self {
        Self { hooks }
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[async_trait]
impl HookDispatcher for CommandHookDispatcher {
    async fn dispatch(&self, event: &LifecycleEvent<'_>) -> Result<(), HookError> {
        let names = event.names();
        let matching: Vec<&HookConfig> = self.hooks.iter().filter(|h| h.matches(&names)).collect();
        if matching.is_empty() {
            return Ok(());
        }

        let name = event.name();
        let payload = event.payload().to_string();

        for hook in matching {
            tracing::debug!(event = %name, command = %hook.command, "Running hook");

            let output = Command::new(&hook.command)
                .args(&hook.args)
                .env(HOOK_EVENT_ENV, &name)
                .env(HOOK_PAYLOAD_ENV, &payload)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|source| HookError::Spawn {
                    event: name.clone(),
                    command: hook.command.clone(),
                    source,
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let reason = match stderr.trim() {
                    "" => output.status.to_string(),
                    message => format!("{}: {}", output.status, message),
                };
                return Err(HookError::Failed {
                    event: name,
                    command: hook.command.clone(),
                    reason,
                });
            }
        }

        Ok(())
    }
}
