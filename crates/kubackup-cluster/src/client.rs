//! Cluster client trait

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use kubackup_core::Result;

use crate::pod::Pod;

/// A command to run inside a container
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub namespace: String,
    pub pod: String,
    pub container: Option<String>,
    /// Passed to `sh -c`
    pub command: String,
    pub timeout: Duration,
}

/// What an exec produced
#[derive(Debug, Clone, Default)]
pub struct ExecOutcome {
    /// Bytes written to the destination file
    pub bytes: u64,
    /// Captured stderr; dump tools often print progress here
    pub stderr: String,
}

/// Client and server versions reported by the cluster tool
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterVersion {
    pub client: String,
    pub server: Option<String>,
}

/// Access to the cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Pods in `namespace` matching a label selector
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>>;

    /// A single pod by name
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod>;

    /// Run a command in a container, streaming its stdout into `dest`
    async fn exec_to_file(&self, exec: &ExecRequest, dest: &Path) -> Result<ExecOutcome>;

    /// Tool and cluster versions
    async fn version(&self) -> Result<ClusterVersion>;
}
