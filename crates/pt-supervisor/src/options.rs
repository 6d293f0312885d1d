//! Selection options derived from tunnel definitions

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pt_core::config::{resolve_image_selector, DevConfig, TunnelDefinition};
use pt_core::traits::{SelectionOptions, WaitingStrategy};
use pt_core::{ConfigError, Direction, SessionCache};

/// Everything besides the definition that shapes target selection
#[derive(Debug, Clone)]
pub struct SelectionDefaults {
    /// Named images for `image(name)` selectors
    pub images: BTreeMap<String, String>,
    /// Per-run cluster state
    pub cache: Arc<SessionCache>,
    /// Poll interval of the waiting strategy
    pub poll_interval: Duration,
    /// Upper bound on one selection
    pub timeout: Duration,
}

impl Default for SelectionDefaults {
    fn default() -> Self {
        Self {
            images: BTreeMap::new(),
            cache: Arc::new(SessionCache::default()),
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
        }
    }
}

impl SelectionDefaults {
    pub fn from_config(config: &DevConfig) -> Self {
        Self {
            images: config.images.clone(),
            cache: Arc::new(config.session_cache()),
            poll_interval: config.supervisor.selection_poll_interval,
            timeout: config.supervisor.selection_timeout,
        }
    }

    /// Build the options one attempt selects with
    ///
    /// Only reverse tunnels filter by container; a forward tunnel reaches the
    /// pod as a whole.
    pub fn options_for(
        &self,
        definition: &TunnelDefinition,
        direction: Direction,
    ) -> Result<SelectionOptions, ConfigError> {
        let image_selectors = match &definition.image_selector {
            Some(selector) => vec![resolve_image_selector(selector, &self.images)?],
            None => Vec::new(),
        };

        let container_name = match direction {
            Direction::Forward => None,
            Direction::Reverse => definition.container_name.clone(),
        };

        Ok(SelectionOptions {
            label_selector: definition.label_selector_string(),
            namespace: definition
                .namespace
                .clone()
                .or_else(|| self.cache.default_namespace.clone()),
            image_selectors,
            container_name,
            waiting_strategy: WaitingStrategy::UntilNewestRunning {
                poll_interval: self.poll_interval,
            },
            allow_pick: false,
            skip_init_containers: true,
            timeout: self.timeout,
        })
    }
}
