//! Session set orchestration
//!
//! Starts one supervisor per definition, in configured order. Setup is
//! sequential: a fatal error in one definition aborts the run before any
//! later definition opens resources, while supervisors that already started
//! keep running until the interrupt fires.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use pt_core::config::TunnelDefinition;
use pt_core::hook::{EventKind, LifecycleEvent};
use pt_core::traits::HookDispatcher;
use pt_core::TunnelError;

use crate::backoff::RetryPolicy;
use crate::driver::TunnelDriver;
use crate::state::SessionState;
use crate::supervisor::{SessionHandle, Supervisor};

/// All supervisors of one direction in one run
pub struct SessionSet<D: TunnelDriver> {
    driver: Arc<D>,
    hooks: Arc<dyn HookDispatcher>,
    policy: RetryPolicy,
    running: Mutex<Vec<SessionHandle>>,
}

impl<D: TunnelDriver> SessionSet<D> {
    pub fn new(driver: Arc<D>, hooks: Arc<dyn HookDispatcher>, policy: RetryPolicy) -> Self {
        Self {
            driver,
            hooks,
            policy,
            running: Mutex::new(Vec::new()),
        }
    }

    /// Start a supervisor for every definition with mappings in this direction
    ///
    /// Returns the number of supervisors that reached steady state. The
    /// first setup error is returned after the `error` hook ran; if that hook
    /// fails its error is returned instead.
    pub async fn run_all(
        &self,
        definitions: &[Arc<TunnelDefinition>],
        interrupt: &CancellationToken,
    ) -> Result<usize, TunnelError> {
        let mut started = 0;

        for definition in definitions {
            if interrupt.is_cancelled() {
                break;
            }
            if !definition.has_mappings(D::DIRECTION) {
                tracing::debug!(
                    "No {} mappings for {}, skipping",
                    D::DIRECTION,
                    definition.name
                );
                continue;
            }

            let span = tracing::info_span!(
                "tunnel",
                name = %definition.name,
                direction = %D::DIRECTION
            );

            let start = LifecycleEvent::new(D::DIRECTION, definition, EventKind::Start);
            self.hooks.dispatch(&start).instrument(span.clone()).await?;

            let supervisor = Supervisor::new(
                Arc::clone(&self.driver),
                Arc::clone(definition),
                Arc::clone(&self.hooks),
                self.policy,
            )
            .with_span(span.clone());

            match supervisor.start(interrupt.clone()).await {
                Ok(Some(handle)) => {
                    self.running.lock().await.push(handle);
                    started += 1;
                }
                Ok(None) => {}
                Err(error) => {
                    span.in_scope(|| {
                        tracing::error!(
                            "Error starting {} for {}: {}",
                            D::DIRECTION.label(),
                            definition.name,
                            error
                        )
                    });

                    let event =
                        LifecycleEvent::new(D::DIRECTION, definition, EventKind::Error(&error));
                    self.hooks.dispatch(&event).instrument(span).await?;
                    return Err(error);
                }
            }
        }

        Ok(started)
    }

    /// Latest state of every running supervisor
    pub async fn states(&self) -> Vec<(String, SessionState)> {
        self.running
            .lock()
            .await
            .iter()
            .map(|handle| (handle.name().to_string(), handle.state()))
            .collect()
    }

    /// Wait for every running supervisor to tear down
    ///
    /// Only returns once the interrupt has fired (or every supervisor gave
    /// up). Supervisor errors are logged.
    pub async fn wait(&self) {
        let handles: Vec<SessionHandle> = self.running.lock().await.drain(..).collect();
        for handle in handles {
            let name = handle.name().to_string();
            if let Err(e) = handle.join().await {
                tracing::error!("Supervisor for {} ended with an error: {}", name, e);
            }
        }
    }
}
