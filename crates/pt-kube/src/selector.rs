//! Pod and container selection via `kubectl get pods`

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use tokio::time::Instant;

use pt_core::traits::{SelectionOptions, TargetSelector, WaitingStrategy};
use pt_core::{PodRef, SelectedTarget};

use crate::kubectl::Kubectl;
use crate::pod::{newest, Pod, PodList};

/// Selects targets by polling `kubectl get pods -o json`
///
/// Manual picking is never offered; when several pods match, the newest
/// one wins.
#[derive(Debug, Clone)]
pub struct KubectlSelector {
    kubectl: Kubectl,
}

impl KubectlSelector {
    pub fn new(kubectl: Kubectl) -> Self {
        Self { kubectl }
    }

    async fn list_pods(&self, options: &SelectionOptions) -> anyhow::Result<Vec<Pod>> {
        let mut args = vec!["get".to_string(), "pods".to_string()];
        if let Some(namespace) = &options.namespace {
            args.extend(["-n".to_string(), namespace.clone()]);
        }
        if !options.label_selector.is_empty() {
            args.extend(["-l".to_string(), options.label_selector.clone()]);
        }
        args.extend(["-o".to_string(), "json".to_string()]);

        let output = self.kubectl.output(&args).await.map_err(|e| {
            if e.is_cluster_not_connected() {
                anyhow!(e).context("cluster is not reachable, check the kube context")
            } else {
                anyhow!(e)
            }
        })?;
        let list: PodList = serde_json::from_str(&output).context("parse pod list")?;
        Ok(list.items)
    }

    /// Poll until the newest matching pod is running
    ///
    /// `Ok(None)` when no pod matched before the timeout; an error when one
    /// matched but never became ready.
    async fn wait_for_pod(&self, options: &SelectionOptions) -> anyhow::Result<Option<Pod>> {
        let WaitingStrategy::UntilNewestRunning { poll_interval } = options.waiting_strategy;
        let deadline = Instant::now() + options.timeout;

        loop {
            let pods = self.list_pods(options).await?;
            let candidate = newest(pods.iter().filter(|pod| pod.matches(options)));

            let waiting_for = match candidate {
                Some(pod) if pod.is_running_ready(options.skip_init_containers) => {
                    return Ok(Some(pod.clone()));
                }
                Some(pod) => {
                    tracing::debug!(
                        "Waiting for pod {} to become ready (phase {})",
                        pod.pod_ref(),
                        pod.status.phase.as_deref().unwrap_or("Unknown")
                    );
                    Some(pod.pod_ref())
                }
                None => {
                    tracing::debug!("No pod matches {}", describe(options));
                    None
                }
            };

            if Instant::now() + poll_interval > deadline {
                return match waiting_for {
                    Some(pod) => Err(anyhow!(
                        "timed out after {:?} waiting for pod {} to become ready",
                        options.timeout,
                        pod
                    )),
                    None => Ok(None),
                };
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[async_trait]
impl TargetSelector for KubectlSelector {
    async fn select_pod(&self, options: &SelectionOptions) -> anyhow::Result<Option<PodRef>> {
        Ok(self.wait_for_pod(options).await?.map(|pod| pod.pod_ref()))
    }

    async fn select_container(&self, options: &SelectionOptions) -> anyhow::Result<SelectedTarget> {
        let Some(pod) = self.wait_for_pod(options).await? else {
            bail!("no pod found matching {}", describe(options));
        };

        let container = pod
            .pick_container(options)
            .ok_or_else(|| anyhow!("pod {} has no matching container", pod.pod_ref()))?;
        Ok(SelectedTarget::container(pod.pod_ref(), container.name.clone()))
    }
}

fn describe(options: &SelectionOptions) -> String {
    let mut parts = Vec::new();
    if !options.label_selector.is_empty() {
        parts.push(format!("labels {}", options.label_selector));
    }
    if !options.image_selectors.is_empty() {
        parts.push(format!("image {}", options.image_selectors.join(" or ")));
    }
    if let Some(container) = &options.container_name {
        parts.push(format!("container {}", container));
    }
    if let Some(namespace) = &options.namespace {
        parts.push(format!("in namespace {}", namespace));
    }
    parts.join(", ")
}
