//! Kubernetes integration module.
//!
//! This module implements the cluster side of the engine:
//! - [`KubeWorkloadApi`]: [`WorkloadApi`](crate::core::WorkloadApi) over `apps/v1` and `apps/v1beta2`
//! - [`annotations`]: label and annotation keys shared with deployed manifests
//! - [`KubernetesError`]: errors surfaced by cluster operations

pub mod annotations;
pub mod kube_client;
pub mod resources;
pub mod types;
pub mod workload_api;

pub use kube_client::init_kube_client;
pub use types::KubernetesError;
pub use workload_api::KubeWorkloadApi;
