//! Choosing the pod a target is dumped from

use tracing::debug;

use kubackup_core::config::TargetConfig;
use kubackup_core::{ClusterError, Result};

use crate::client::ClusterClient;
use crate::pod::Pod;

/// Pick a pod among candidates.
///
/// Only running pods with every container ready qualify; among those the
/// first by name wins so that repeated runs hit the same replica.
pub fn select_pod(
    target: &str,
    pods: Vec<Pod>,
    container: Option<&str>,
) -> std::result::Result<Pod, ClusterError> {
    let candidates = pods.len();
    let mut ready: Vec<Pod> = pods.into_iter().filter(Pod::is_ready).collect();
    ready.sort_by(|a, b| a.name.cmp(&b.name));

    let pod = ready
        .into_iter()
        .next()
        .ok_or_else(|| ClusterError::NoRunningPod {
            target: target.to_string(),
            candidates,
        })?;

    check_container(&pod, container)?;
    Ok(pod)
}

fn check_container(pod: &Pod, container: Option<&str>) -> std::result::Result<(), ClusterError> {
    match container {
        Some(name) if !pod.has_container(name) => Err(ClusterError::ContainerNotFound {
            pod: pod.name.clone(),
            container: name.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Resolve the pod for a target; an explicit pod name wins over the selector
pub async fn resolve_pod(client: &dyn ClusterClient, target: &TargetConfig) -> Result<Pod> {
    let container = target.container.as_deref();

    if let Some(name) = &target.pod {
        let pod = client.get_pod(&target.namespace, name).await?;
        if !pod.is_running() {
            return Err(ClusterError::NoRunningPod {
                target: target.name.clone(),
                candidates: 1,
            }
            .into());
        }
        check_container(&pod, container)?;
        debug!(target = %target.name, pod = %pod.name, "using explicit pod");
        return Ok(pod);
    }

    let selector = target.selector.as_deref().ok_or_else(|| {
        kubackup_core::ConfigError::InvalidValue {
            field: format!("targets.{}", target.name),
            message: "either pod or selector is required".to_string(),
        }
    })?;

    let pods = client.list_pods(&target.namespace, selector).await?;
    if pods.is_empty() {
        return Err(ClusterError::NoMatchingPods {
            namespace: target.namespace.clone(),
            selector: selector.to_string(),
        }
        .into());
    }

    let pod = select_pod(&target.name, pods, container)?;
    debug!(target = %target.name, pod = %pod.name, selector, "selected pod");
    Ok(pod)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::{ClusterVersion, ExecOutcome, ExecRequest};
    use async_trait::async_trait;
    use kubackup_core::{BackupKind, KubackupError};
    use std::collections::BTreeMap;
    use std::path::Path;

    pub(crate) fn pod(name: &str, phase: &str, ready: bool) -> Pod {
        Pod {
            name: name.to_string(),
            namespace: "prod".to_string(),
            labels: BTreeMap::new(),
            owners: Vec::new(),
            phase: phase.to_string(),
            containers: vec!["main".to_string()],
            ready_containers: if ready { vec!["main".to_string()] } else { Vec::new() },
            node: None,
            terminating: false,
        }
    }

    struct FakeCluster {
        pods: Vec<Pod>,
    }

    #[async_trait]
    impl ClusterClient for FakeCluster {
        async fn list_pods(&self, _namespace: &str, _selector: &str) -> Result<Vec<Pod>> {
            Ok(self.pods.clone())
        }

        async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
            self.pods
                .iter()
                .find(|p| p.name == name)
                .cloned()
                .ok_or_else(|| {
                    ClusterError::PodNotFound {
                        namespace: namespace.to_string(),
                        name: name.to_string(),
                    }
                    .into()
                })
        }

        async fn exec_to_file(&self, _exec: &ExecRequest, _dest: &Path) -> Result<ExecOutcome> {
            Ok(ExecOutcome::default())
        }

        async fn version(&self) -> Result<ClusterVersion> {
            Ok(ClusterVersion::default())
        }
    }

    #[test]
    fn test_select_first_ready_by_name() {
        let pods = vec![
            pod("db-2", "Running", true),
            pod("db-0", "Pending", false),
            pod("db-1", "Running", true),
        ];
        assert_eq!(select_pod("db", pods, None).unwrap().name, "db-1");
    }

    #[test]
    fn test_select_no_ready_pod() {
        let pods = vec![pod("db-0", "Running", false), pod("db-1", "Failed", false)];
        assert!(matches!(
            select_pod("db", pods, None),
            Err(ClusterError::NoRunningPod { candidates: 2, .. })
        ));
    }

    #[test]
    fn test_select_missing_container() {
        let pods = vec![pod("db-0", "Running", true)];
        assert!(matches!(
            select_pod("db", pods, Some("postgres")),
            Err(ClusterError::ContainerNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_explicit_pod_wins() {
        let cluster = FakeCluster {
            pods: vec![pod("db-0", "Running", true), pod("db-1", "Running", true)],
        };
        let mut target = TargetConfig::new("db", BackupKind::Postgres);
        target.namespace = "prod".to_string();
        target.selector = Some("app=db".to_string());
        target.pod = Some("db-1".to_string());

        let resolved = resolve_pod(&cluster, &target).await.unwrap();
        assert_eq!(resolved.name, "db-1");
    }

    #[tokio::test]
    async fn test_resolve_selector_without_matches() {
        let cluster = FakeCluster { pods: Vec::new() };
        let mut target = TargetConfig::new("db", BackupKind::Postgres);
        target.selector = Some("app=db".to_string());

        let err = resolve_pod(&cluster, &target).await.unwrap_err();
        assert!(matches!(
            err,
            KubackupError::Cluster(ClusterError::NoMatchingPods { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_explicit_pod_not_running() {
        let cluster = FakeCluster {
            pods: vec![pod("db-0", "Pending", false)],
        };
        let mut target = TargetConfig::new("db", BackupKind::Postgres);
        target.pod = Some("db-0".to_string());

        let err = resolve_pod(&cluster, &target).await.unwrap_err();
        assert!(matches!(
            err,
            KubackupError::Cluster(ClusterError::NoRunningPod { .. })
        ));
    }
}
