//! Seams between the decision engine and the cluster it acts on

use chrono::DateTime;
use chrono::Utc;
use error_stack::Report;

use super::context::PassContext;
use super::types::{ApiVariant, LabelSelector, Revision, Workload};
use crate::k8s::types::KubernetesError;

/// Cluster operations the engine needs.
///
/// Implementations own request timeouts and must honour the cancellation
/// token of the supplied [`PassContext`].
#[async_trait::async_trait]
pub trait WorkloadApi: Send + Sync {
    /// List ReplicaSets in all namespaces matching `selector`.
    async fn list_revisions(
        &self,
        ctx: &PassContext,
        selector: &LabelSelector,
    ) -> Result<Vec<Revision>, Report<KubernetesError>>;

    /// List every ReplicaSet of one namespace.
    async fn list_revisions_in_namespace(
        &self,
        ctx: &PassContext,
        namespace: &str,
    ) -> Result<Vec<Revision>, Report<KubernetesError>>;

    /// Fetch a single Deployment.
    ///
    /// Returns [`KubernetesError::WorkloadNotFound`] when it does not exist and
    /// [`KubernetesError::GetFailed`] for any other failure.
    async fn get_workload(
        &self,
        ctx: &PassContext,
        variant: ApiVariant,
        namespace: &str,
        name: &str,
    ) -> Result<Workload, Report<KubernetesError>>;

    /// List Deployments in all namespaces matching `selector`.
    async fn list_workloads(
        &self,
        ctx: &PassContext,
        variant: ApiVariant,
        selector: &LabelSelector,
    ) -> Result<Vec<Workload>, Report<KubernetesError>>;

    /// Merge-patch `spec.replicas` and, when `frozen` is set, the frozen template label.
    async fn patch_workload_replicas(
        &self,
        ctx: &PassContext,
        workload: &Workload,
        replicas: i32,
        frozen: Option<bool>,
    ) -> Result<(), Report<KubernetesError>>;
}

/// Trait for getting current time
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
