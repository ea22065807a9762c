//! Pod model parsed from `kubectl get -o json`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kubackup_core::naming::workload_name;
use kubackup_core::{ClusterError, OwnerReference};

/// The parts of a pod kubackup cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pod {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub owners: Vec<OwnerReference>,
    /// `status.phase`, e.g. `Running`
    pub phase: String,
    /// Container names in spec order
    pub containers: Vec<String>,
    /// Names of containers reporting ready
    pub ready_containers: Vec<String>,
    pub node: Option<String>,
    /// Set once the pod has a deletion timestamp
    pub terminating: bool,
}

impl Pod {
    pub fn is_running(&self) -> bool {
        self.phase == "Running" && !self.terminating
    }

    /// Running and every container ready
    pub fn is_ready(&self) -> bool {
        self.is_running()
            && !self.containers.is_empty()
            && self
                .containers
                .iter()
                .all(|c| self.ready_containers.contains(c))
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.containers.iter().any(|c| c == name)
    }

    /// Name of the workload that owns this pod
    pub fn workload_name(&self) -> String {
        workload_name(&self.name, &self.owners, &self.labels)
    }
}

#[derive(Deserialize)]
struct RawPodList {
    #[serde(default)]
    items: Vec<RawPod>,
}

#[derive(Deserialize)]
struct RawPod {
    metadata: RawMetadata,
    #[serde(default)]
    spec: RawSpec,
    #[serde(default)]
    status: RawStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    owner_references: Vec<OwnerReference>,
    #[serde(default)]
    deletion_timestamp: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSpec {
    #[serde(default)]
    containers: Vec<RawContainer>,
    #[serde(default)]
    node_name: Option<String>,
}

#[derive(Deserialize)]
struct RawContainer {
    name: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatus {
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    container_statuses: Vec<RawContainerStatus>,
}

#[derive(Deserialize)]
struct RawContainerStatus {
    name: String,
    #[serde(default)]
    ready: bool,
}

impl From<RawPod> for Pod {
    fn from(raw: RawPod) -> Self {
        Self {
            name: raw.metadata.name,
            namespace: raw.metadata.namespace.unwrap_or_default(),
            labels: raw.metadata.labels,
            owners: raw.metadata.owner_references,
            phase: raw.status.phase.unwrap_or_else(|| "Unknown".to_string()),
            containers: raw.spec.containers.into_iter().map(|c| c.name).collect(),
            ready_containers: raw
                .status
                .container_statuses
                .into_iter()
                .filter(|s| s.ready)
                .map(|s| s.name)
                .collect(),
            node: raw.spec.node_name,
            terminating: raw.metadata.deletion_timestamp.is_some(),
        }
    }
}

/// Parse the output of `kubectl get pods -o json`
pub fn parse_pod_list(json: &str) -> Result<Vec<Pod>, ClusterError> {
    let list: RawPodList = serde_json::from_str(json)
        .map_err(|e| ClusterError::UnexpectedOutput(format!("pod list: {}", e)))?;
    Ok(list.items.into_iter().map(Pod::from).collect())
}

/// Parse the output of `kubectl get pod <name> -o json`
pub fn parse_pod(json: &str) -> Result<Pod, ClusterError> {
    let raw: RawPod = serde_json::from_str(json)
        .map_err(|e| ClusterError::UnexpectedOutput(format!("pod: {}", e)))?;
    Ok(raw.into())
}
