//! Pod models for `kubectl get pods -o json` and the selection rules on them

use serde::Deserialize;

use pt_core::traits::SelectionOptions;
use pt_core::PodRef;

/// Response of `kubectl get pods -o json`
#[derive(Debug, Deserialize)]
pub struct PodList {
    #[serde(default)]
    pub items: Vec<Pod>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pod {
    pub metadata: PodMetadata,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodMetadata {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    /// RFC 3339 in UTC, as emitted by the API server
    pub creation_timestamp: Option<String>,
    pub deletion_timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
    #[serde(default)]
    pub init_containers: Vec<ContainerSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    pub phase: Option<String>,
    #[serde(default)]
    pub container_statuses: Vec<ContainerStatus>,
    #[serde(default)]
    pub init_container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    #[serde(default)]
    pub ready: bool,
}

impl Pod {
    pub fn pod_ref(&self) -> PodRef {
        PodRef::new(self.metadata.namespace.clone(), self.metadata.name.clone())
    }

    pub fn is_terminating(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    fn containers<'a>(
        &'a self,
        skip_init_containers: bool,
    ) -> impl Iterator<Item = &'a ContainerSpec> + 'a {
        let init: &[ContainerSpec] = if skip_init_containers {
            &[]
        } else {
            &self.spec.init_containers
        };
        self.spec.containers.iter().chain(init.iter())
    }

    /// Whether the pod is a candidate for `options`
    ///
    /// Terminating pods never are. Image and container name filters must
    /// both hold for the same container.
    pub fn matches(&self, options: &SelectionOptions) -> bool {
        if self.is_terminating() {
            return false;
        }
        self.containers(options.skip_init_containers)
            .any(|container| container_matches(container, options))
    }

    /// Running with every (non-init) container ready
    pub fn is_running_ready(&self, skip_init_containers: bool) -> bool {
        if self.status.phase.as_deref() != Some("Running") {
            return false;
        }
        if self.status.container_statuses.is_empty() {
            return false;
        }
        let containers_ready = self.status.container_statuses.iter().all(|s| s.ready);
        let init_ready = skip_init_containers
            || self.status.init_container_statuses.iter().all(|s| s.ready);
        containers_ready && init_ready
    }

    /// The container a reverse tunnel attaches to
    pub fn pick_container(&self, options: &SelectionOptions) -> Option<&ContainerSpec> {
        self.containers(options.skip_init_containers)
            .find(|container| container_matches(container, options))
    }
}

fn container_matches(container: &ContainerSpec, options: &SelectionOptions) -> bool {
    let name_ok = options
        .container_name
        .as_deref()
        .map_or(true, |name| container.name == name);
    let image_ok = options.image_selectors.is_empty()
        || options
            .image_selectors
            .iter()
            .any(|selector| image_matches(selector, &container.image));
    name_ok && image_ok
}

/// The newest pod by creation time
pub fn newest<'a>(pods: impl IntoIterator<Item = &'a Pod>) -> Option<&'a Pod> {
    // RFC 3339 UTC timestamps of equal precision sort lexicographically
    pods.into_iter()
        .max_by(|a, b| a.metadata.creation_timestamp.cmp(&b.metadata.creation_timestamp))
}

/// Whether `image` satisfies `selector`
///
/// A selector without tag or digest matches any tag of the same repository;
/// otherwise the reference must match exactly.
pub fn image_matches(selector: &str, image: &str) -> bool {
    if has_tag_or_digest(selector) {
        selector == image
    } else {
        repository(selector) == repository(image)
    }
}

fn has_tag_or_digest(image: &str) -> bool {
    let last = image.rsplit('/').next().unwrap_or(image);
    image.contains('@') || last.contains(':')
}

fn repository(image: &str) -> &str {
    let image = image.split('@').next().unwrap_or(image);
    let name_start = image.rfind('/').map_or(0, |i| i + 1);
    match image[name_start..].find(':') {
        Some(colon) => &image[..name_start + colon],
        None => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pt_core::traits::WaitingStrategy;
    use std::time::Duration;

    const PODS: &str = r#"{
      "items": [
        {
          "metadata": {"name": "api-old", "namespace": "dev", "creationTimestamp": "2024-05-01T10:00:00Z"},
          "spec": {"containers": [{"name": "server", "image": "registry.local/api:v1"}]},
          "status": {"phase": "Running", "containerStatuses": [{"name": "server", "ready": true}]}
        },
        {
          "metadata": {"name": "api-new", "namespace": "dev", "creationTimestamp": "2024-05-02T10:00:00Z"},
          "spec": {
            "initContainers": [{"name": "migrate", "image": "registry.local/migrate:v2"}],
            "containers": [
              {"name": "sidecar", "image": "envoy:1.29"},
              {"name": "server", "image": "registry.local/api:v2"}
            ]
          },
          "status": {
            "phase": "Pending",
            "initContainerStatuses": [{"name": "migrate", "ready": false}],
            "containerStatuses": [{"name": "sidecar", "ready": true}, {"name": "server", "ready": false}]
          }
        },
        {
          "metadata": {
            "name": "api-leaving", "namespace": "dev",
            "creationTimestamp": "2024-05-03T10:00:00Z",
            "deletionTimestamp": "2024-05-03T11:00:00Z"
          },
          "spec": {"containers": [{"name": "server", "image": "registry.local/api:v2"}]}
        }
      ]
    }"#;

    fn pods() -> Vec<Pod> {
        serde_json::from_str::<PodList>(PODS).unwrap().items
    }

    fn options() -> SelectionOptions {
        SelectionOptions {
            label_selector: "app=api".to_string(),
            namespace: Some("dev".to_string()),
            image_selectors: vec!["registry.local/api".to_string()],
            container_name: None,
            waiting_strategy: WaitingStrategy::UntilNewestRunning {
                poll_interval: Duration::from_secs(2),
            },
            allow_pick: false,
            skip_init_containers: true,
            timeout: Duration::from_secs(120),
        }
    }

    #[test]
    fn test_image_matching() {
        assert!(image_matches("registry.local/api", "registry.local/api:v2"));
        assert!(image_matches("registry.local:5000/api", "registry.local:5000/api:dev"));
        assert!(image_matches("registry.local/api:v2", "registry.local/api:v2"));
        assert!(!image_matches("registry.local/api:v1", "registry.local/api:v2"));
        assert!(!image_matches("registry.local/api", "registry.local/api-worker:v2"));
    }

    #[test]
    fn test_newest_candidate_skips_terminating() {
        let pods = pods();
        let options = options();
        let candidates: Vec<&Pod> = pods.iter().filter(|p| p.matches(&options)).collect();
        assert_eq!(candidates.len(), 2);

        let newest = newest(candidates).unwrap();
        assert_eq!(newest.pod_ref(), PodRef::new("dev", "api-new"));
        assert!(!newest.is_running_ready(true));
    }

    #[test]
    fn test_running_ready() {
        let pods = pods();
        assert!(pods[0].is_running_ready(true));
        assert!(pods[0].is_running_ready(false));
    }

    #[test]
    fn test_pick_container_by_image_and_name() {
        let pods = pods();
        let mut options = options();
        assert_eq!(pods[1].pick_container(&options).unwrap().name, "server");

        options.image_selectors.clear();
        assert_eq!(pods[1].pick_container(&options).unwrap().name, "sidecar");

        options.container_name = Some("migrate".to_string());
        assert!(pods[1].pick_container(&options).is_none());
        options.skip_init_containers = false;
        assert_eq!(pods[1].pick_container(&options).unwrap().name, "migrate");
    }
}
