//! Helper binary injection via `kubectl exec` and `kubectl cp`

use anyhow::{bail, Context};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use pt_core::config::{Arch, KubeConfig};
use pt_core::traits::HelperInjector;
use pt_core::SelectedTarget;

use crate::kubectl::{exec_args, Kubectl};

/// Copies `podtunnel-helper-<arch>` into containers that lack it
///
/// Injections into the same container are serialized, so concurrent
/// supervisors never copy the same binary twice. A target's lock is dropped
/// from the map once nobody holds or waits for it.
pub struct KubectlHelperInjector {
    kubectl: Kubectl,
    helper_dir: PathBuf,
    container_path: String,
    locks: DashMap<SelectedTarget, Arc<Mutex<()>>>,
}

impl KubectlHelperInjector {
    pub fn new(kubectl: Kubectl, helper_dir: PathBuf, container_path: String) -> Self {
        Self {
            kubectl,
            helper_dir,
            container_path,
            locks: DashMap::new(),
        }
    }

    pub fn from_config(kubectl: Kubectl, config: &KubeConfig) -> Self {
        Self::new(
            kubectl,
            config.helper_dir.clone(),
            config.helper_container_path.clone(),
        )
    }

    /// Local path of the helper variant for `arch`
    pub fn local_helper(&self, arch: Arch) -> PathBuf {
        helper_file(&self.helper_dir, arch)
    }

    async fn inject(&self, target: &SelectedTarget, arch: Option<Arch>) -> anyhow::Result<()> {
        if self.helper_present(target).await? {
            tracing::debug!("Helper already present in {}", target);
            return Ok(());
        }

        let local = self.local_helper(arch.unwrap_or_default());
        if !local.exists() {
            bail!("helper binary {} not found", local.display());
        }

        tracing::info!("Injecting helper into {}", target);
        self.copy_helper(target, &local).await
    }

    async fn helper_present(&self, target: &SelectedTarget) -> anyhow::Result<bool> {
        let check = ["test".to_string(), "-x".to_string(), self.container_path.clone()];
        Ok(self
            .kubectl
            .succeeds(exec_args(target, false, &check))
            .await?)
    }

    async fn copy_helper(&self, target: &SelectedTarget, local: &Path) -> anyhow::Result<()> {
        let mut args = vec![
            "cp".to_string(),
            local.display().to_string(),
            format!(
                "{}/{}:{}",
                target.pod.namespace, target.pod.name, self.container_path
            ),
        ];
        if let Some(container) = &target.container {
            args.extend(["-c".to_string(), container.clone()]);
        }
        self.kubectl
            .output(&args)
            .await
            .with_context(|| format!("copy helper into {}", target))?;

        let chmod = [
            "chmod".to_string(),
            "+x".to_string(),
            self.container_path.clone(),
        ];
        self.kubectl
            .output(exec_args(target, false, &chmod))
            .await
            .with_context(|| format!("make helper executable in {}", target))?;
        Ok(())
    }
}

#[async_trait]
impl HelperInjector for KubectlHelperInjector {
    async fn ensure_helper(&self, target: &SelectedTarget, arch: Option<Arch>) -> anyhow::Result<()> {
        let lock = self.locks.entry(target.clone()).or_default().value().clone();
        let result = {
            let _guard = lock.lock().await;
            self.inject(target, arch).await
        };

        drop(lock);
        self.locks
            .remove_if(target, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    fn helper_path(&self) -> &str {
        &self.container_path
    }
}

fn helper_file(dir: &Path, arch: Arch) -> PathBuf {
    dir.join(format!("podtunnel-helper-{}", arch))
}
