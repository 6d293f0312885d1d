//! Generic tunnel supervisor
//!
//! Drives one tunnel definition through its lifecycle:
//!
//! ```text
//! Idle -> SelectingTarget -> Establishing -> WaitingReady -> Active
//!                                                  |
//!            +---------------- failure ------------+---- interrupt -> Closed
//!            v
//!         Backoff -> SelectingTarget -> ... -> Settling -> Active
//! ```
//!
//! The first attempt runs on the caller's task so setup errors reach the
//! caller; the steady state runs on a task of its own.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use pt_core::config::TunnelDefinition;
use pt_core::hook::{EventKind, LifecycleEvent};
use pt_core::traits::HookDispatcher;
use pt_core::{Direction, TunnelError};

use crate::backoff::RetryPolicy;
use crate::driver::{TunnelDriver, TunnelSession};
use crate::state::SessionState;

/// Outcome of one reconnect cycle
enum Reconnect {
    /// A new session is ready and has settled
    Ready(Box<dyn TunnelSession>),
    /// The interrupt fired
    Interrupted,
    /// An error that retrying cannot fix
    Fatal(TunnelError),
}

/// Supervises the tunnel of one definition in one direction
pub struct Supervisor<D: TunnelDriver> {
    driver: Arc<D>,
    definition: Arc<TunnelDefinition>,
    hooks: Arc<dyn HookDispatcher>,
    policy: RetryPolicy,
    span: tracing::Span,
    state: watch::Sender<SessionState>,
}

impl<D: TunnelDriver> Supervisor<D> {
    pub fn new(
        driver: Arc<D>,
        definition: Arc<TunnelDefinition>,
        hooks: Arc<dyn HookDispatcher>,
        policy: RetryPolicy,
    ) -> Self {
        let span = tracing::info_span!(
            "tunnel",
            name = %definition.name,
            direction = %D::DIRECTION
        );
        let (state, _) = watch::channel(SessionState::Idle);

        Self {
            driver,
            definition,
            hooks,
            policy,
            span,
            state,
        }
    }

    /// Run inside `span` instead of the default per-definition span
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run the first attempt, then hand the steady state to a background task
    ///
    /// Returns `Ok(None)` when there is nothing to supervise: no target
    /// matched, or `interrupt` fired during setup (in which case `stop` has
    /// already been fired).
    pub async fn start(
        self,
        interrupt: CancellationToken,
    ) -> Result<Option<SessionHandle>, TunnelError> {
        let span = self.span.clone();

        async move {
            let attempt = tokio::select! {
                biased;
                _ = interrupt.cancelled() => None,
                result = self.attempt() => Some(result),
            };

            match attempt {
                None => {
                    self.stop().await;
                    Ok(None)
                }
                Some(Err(error)) => {
                    self.set_state(SessionState::Closed);
                    Err(error)
                }
                Some(Ok(None)) => {
                    tracing::info!(
                        "No pod found for {}, not starting {}",
                        self.definition.name,
                        D::DIRECTION.label()
                    );
                    self.set_state(SessionState::Closed);
                    Ok(None)
                }
                Some(Ok(Some(session))) => {
                    self.set_state(SessionState::Active);

                    let name = self.definition.name.clone();
                    let state = self.state.subscribe();
                    let task_span = self.span.clone();
                    let task = tokio::spawn(
                        self.supervise(session, interrupt).instrument(task_span),
                    );

                    Ok(Some(SessionHandle {
                        name,
                        direction: D::DIRECTION,
                        task,
                        state,
                    }))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Supervise until interrupted
    pub async fn run(self, interrupt: CancellationToken) -> Result<(), TunnelError> {
        match self.start(interrupt).await? {
            Some(handle) => handle.join().await,
            None => Ok(()),
        }
    }

    /// One pass of select, establish, wait for readiness
    ///
    /// A session that fails or times out is closed before returning.
    async fn attempt(&self) -> Result<Option<Box<dyn TunnelSession>>, TunnelError> {
        self.set_state(SessionState::SelectingTarget);
        let Some(target) = self.driver.resolve_target(&self.definition).await? else {
            return Ok(None);
        };
        tracing::debug!(%target, "Selected target");

        self.set_state(SessionState::Establishing);
        let mut session = self.driver.establish(&self.definition, &target).await?;

        self.set_state(SessionState::WaitingReady);
        let ready = tokio::time::timeout(self.policy.readiness_timeout, session.wait_ready()).await;

        match ready {
            Ok(Ok(())) => {
                tracing::info!(
                    "Started {} for {}",
                    D::DIRECTION.label(),
                    session.describe()
                );
                Ok(Some(session))
            }
            Ok(Err(error)) => {
                session.close().await;
                Err(error)
            }
            Err(_) => {
                session.close().await;
                Err(TunnelError::ReadinessTimeout(self.policy.readiness_timeout))
            }
        }
    }

    /// Steady state: wait for failure or interrupt, reconnect on failure
    async fn supervise(
        self,
        mut session: Box<dyn TunnelSession>,
        interrupt: CancellationToken,
    ) -> Result<(), TunnelError> {
        loop {
            let failure = tokio::select! {
                biased;
                _ = interrupt.cancelled() => None,
                error = session.wait_failure() => Some(error),
            };
            session.close().await;

            let Some(error) = failure else {
                self.stop().await;
                return Ok(());
            };

            tracing::warn!(
                "{} for {} restarting, because: {}",
                D::DIRECTION.label(),
                self.definition.name,
                error
            );
            self.fire_logged(EventKind::Restart(&error)).await;

            match self.reconnect(&interrupt).await {
                Reconnect::Ready(next) => session = next,
                Reconnect::Interrupted => {
                    self.stop().await;
                    return Ok(());
                }
                Reconnect::Fatal(error) => {
                    tracing::error!(
                        "Giving up on {} for {}: {}",
                        D::DIRECTION.label(),
                        self.definition.name,
                        error
                    );
                    self.fire_logged(EventKind::Error(&error)).await;
                    self.set_state(SessionState::Closed);
                    return Err(error);
                }
            }
        }
    }

    /// Retry with a fixed delay until an attempt succeeds or `interrupt` fires
    async fn reconnect(&self, interrupt: &CancellationToken) -> Reconnect {
        let retry_secs = self.policy.retry_delay.as_secs();

        loop {
            let attempt = tokio::select! {
                biased;
                _ = interrupt.cancelled() => return Reconnect::Interrupted,
                result = self.attempt() => result,
            };

            match attempt {
                Ok(Some(mut session)) => {
                    self.set_state(SessionState::Settling);
                    let settled = tokio::select! {
                        biased;
                        _ = interrupt.cancelled() => false,
                        _ = tokio::time::sleep(self.policy.settle_delay) => true,
                    };
                    if !settled {
                        session.close().await;
                        return Reconnect::Interrupted;
                    }

                    self.set_state(SessionState::Active);
                    tracing::info!(
                        "Restarted {} for {}",
                        D::DIRECTION.label(),
                        self.definition.name
                    );
                    return Reconnect::Ready(session);
                }
                Ok(None) => {
                    tracing::info!(
                        "No pod found for {}, will try again in {} seconds",
                        self.definition.name,
                        retry_secs
                    );
                }
                Err(error) if error.is_config() => return Reconnect::Fatal(error),
                Err(error) => {
                    self.fire_logged(EventKind::Restart(&error)).await;
                    tracing::error!("Error restarting {}: {}", D::DIRECTION.label(), error);
                    tracing::info!("Will try again in {} seconds", retry_secs);
                }
            }

            self.set_state(SessionState::Backoff);
            tokio::select! {
                biased;
                _ = interrupt.cancelled() => return Reconnect::Interrupted,
                _ = tokio::time::sleep(self.policy.retry_delay) => {}
            }
        }
    }

    async fn stop(&self) {
        tracing::info!(
            "Stopped {} for {}",
            D::DIRECTION.label(),
            self.definition.name
        );
        self.fire_logged(EventKind::Stop).await;
        self.set_state(SessionState::Closed);
    }

    /// Fire a non-fatal event; failures are only logged
    async fn fire_logged(&self, kind: EventKind<'_>) {
        let event = LifecycleEvent::new(D::DIRECTION, &self.definition, kind);
        if let Err(e) = self.hooks.dispatch(&event).await {
            tracing::warn!("Hook for {} failed: {}", event.name(), e);
        }
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::trace!(from = %previous, to = %state, "State change");
        }
    }
}

/// Handle to a running supervisor
pub struct SessionHandle {
    name: String,
    direction: Direction,
    task: JoinHandle<Result<(), TunnelError>>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Name of the supervised definition
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Latest published state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the supervisor has torn everything down
    pub async fn join(self) -> Result<(), TunnelError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(TunnelError::Runtime(anyhow::anyhow!(
                "supervisor task for {} failed: {}",
                self.name,
                e
            ))),
        }
    }
}
