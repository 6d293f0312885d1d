//! Target selection traits

use async_trait::async_trait;
use std::time::Duration;

use crate::types::{PodRef, SelectedTarget};

/// How selection waits for a usable candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitingStrategy {
    /// Poll until the newest matching pod is running and ready
    UntilNewestRunning {
        /// Delay between polls
        poll_interval: Duration,
    },
}

/// Options handed to a [`TargetSelector`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOptions {
    /// Label selector in `key=value,...` form (may be empty)
    pub label_selector: String,
    /// Namespace to search (None = selector default)
    pub namespace: Option<String>,
    /// Images a matching container must run
    pub image_selectors: Vec<String>,
    /// Container name filter
    pub container_name: Option<String>,
    /// Waiting strategy
    pub waiting_strategy: WaitingStrategy,
    /// Whether an ambiguous match may be resolved interactively
    pub allow_pick: bool,
    /// Ignore init containers when judging readiness and picking containers
    pub skip_init_containers: bool,
    /// Upper bound on the whole selection
    pub timeout: Duration,
}

/// Resolves selection options to a concrete pod or container
#[async_trait]
pub trait TargetSelector: Send + Sync {
    /// Select a single pod
    ///
    /// `Ok(None)` means nothing matches yet; the caller decides whether to
    /// poll again later.
    async fn select_pod(&self, options: &SelectionOptions) -> anyhow::Result<Option<PodRef>>;

    /// Select a single container of a single pod
    async fn select_container(&self, options: &SelectionOptions)
        -> anyhow::Result<SelectedTarget>;
}
