//! Run command implementation

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use pt_core::config::DevConfig;
use pt_core::hook::CommandHookDispatcher;
use pt_core::traits::HookDispatcher;
use pt_core::{ConfigError, Direction};
use pt_kube::{
    CommandMultiplexer, Kubectl, KubectlExecStreamer, KubectlHelperInjector,
    KubectlPortForwarder, KubectlSelector,
};
use pt_supervisor::{ForwardDriver, RetryPolicy, ReverseDriver, SelectionDefaults, SessionSet};

/// Start every configured tunnel and supervise until Ctrl+C
///
/// Forward tunnels are set up before reverse tunnels. A setup error stops
/// the tunnels that already run and is returned.
pub async fn run_command(config: DevConfig) -> Result<()> {
    config.validate()?;

    let definitions = config.definitions();
    let needs_reverse = definitions
        .iter()
        .any(|d| d.has_mappings(Direction::Reverse));

    let selection = SelectionDefaults::from_config(&config);
    let kubectl = Kubectl::from_config(&config.kube, &selection.cache);
    let selector = Arc::new(KubectlSelector::new(kubectl.clone()));
    let hooks: Arc<dyn HookDispatcher> =
        Arc::new(CommandHookDispatcher::new(config.hooks.clone()));

    let forward = SessionSet::new(
        Arc::new(ForwardDriver::new(
            selector.clone(),
            Arc::new(KubectlPortForwarder::new(kubectl.clone())),
            selection.clone(),
        )),
        Arc::clone(&hooks),
        RetryPolicy::for_direction(&config.supervisor, Direction::Forward),
    );

    let reverse = if needs_reverse {
        let multiplexer = config.kube.multiplexer.clone().ok_or_else(|| {
            ConfigError::Invalid(
                "reverse tunnels need [kube.multiplexer] to be configured".to_string(),
            )
        })?;
        Some(SessionSet::new(
            Arc::new(ReverseDriver::new(
                selector,
                Arc::new(KubectlHelperInjector::from_config(
                    kubectl.clone(),
                    &config.kube,
                )),
                Arc::new(KubectlExecStreamer::new(kubectl)),
                Arc::new(CommandMultiplexer::new(multiplexer)),
                selection,
            )),
            hooks,
            RetryPolicy::for_direction(&config.supervisor, Direction::Reverse),
        ))
    } else {
        None
    };

    let interrupt = CancellationToken::new();
    tokio::spawn(shutdown_signal(interrupt.clone()));

    let setup = async {
        let mut started = forward.run_all(&definitions, &interrupt).await?;
        if let Some(reverse) = &reverse {
            started += reverse.run_all(&definitions, &interrupt).await?;
        }
        Ok::<_, pt_core::TunnelError>(started)
    }
    .await;

    let result = match setup {
        Ok(0) if !interrupt.is_cancelled() => {
            tracing::warn!("No tunnels are running");
            Ok(())
        }
        Ok(started) => {
            tracing::info!("{} tunnel(s) running, press Ctrl+C to stop", started);
            for (name, state) in forward.states().await {
                tracing::debug!("Forward tunnel {} is {}", name, state);
            }
            if let Some(reverse) = &reverse {
                for (name, state) in reverse.states().await {
                    tracing::debug!("Reverse tunnel {} is {}", name, state);
                }
            }
            interrupt.cancelled().await;
            Ok(())
        }
        Err(e) => Err(e).context("Failed to start tunnels"),
    };

    interrupt.cancel();
    forward.wait().await;
    if let Some(reverse) = &reverse {
        reverse.wait().await;
    }

    result
}

/// Cancel `interrupt` on Ctrl+C or SIGTERM
async fn shutdown_signal(interrupt: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping tunnels...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, stopping tunnels...");
        }
    }

    interrupt.cancel();
}
