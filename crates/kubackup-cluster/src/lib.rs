//! kubackup Cluster - kubectl integration
//!
//! Finds the pod behind a backup target and streams a dump out of it:
//! - [`Kubectl`] wraps the `kubectl` CLI behind the [`ClusterClient`] trait
//! - [`select_pod`] / [`resolve_pod`] pick the pod to exec into
//! - [`DumpExecutor`] runs the dump, compresses it and checksums it

pub mod client;
pub mod dump;
pub mod kubectl;
pub mod pod;
pub mod select;

pub use client::{ClusterClient, ClusterVersion, ExecOutcome, ExecRequest};
pub use dump::{DumpArtifact, DumpExecutor};
pub use kubectl::Kubectl;
pub use pod::{parse_pod, parse_pod_list, Pod};
pub use select::{resolve_pod, select_pod};
