use std::future::Future;
use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::apps::v1::ReplicaSet;
use kube::api::ListParams;
use kube::api::Patch;
use kube::api::PatchParams;
use kube::Api;
use kube::Client;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::core::context::PassContext;
use crate::core::reconciler::scale_patch;
use crate::core::traits::WorkloadApi;
use crate::core::types::{ApiVariant, LabelSelector, Revision, Workload};
use crate::k8s::resources::{
    revision_from_replica_set, workload_from_deployment, workload_from_legacy, LegacyDeployment,
};
use crate::k8s::types::KubernetesError;

/// Run `request` under the context's cancellation token and `timeout`.
///
/// The outer result carries cancellation and timeout, the inner one the
/// API outcome, so callers can attach their own context.
async fn bounded<T, F>(
    ctx: &PassContext,
    timeout: Duration,
    request: F,
) -> Result<Result<T, kube::Error>, Report<KubernetesError>>
where
    F: Future<Output = Result<T, kube::Error>> + Send,
{
    tokio::select! {
        _ = ctx.cancellation.cancelled() => Err(Report::new(KubernetesError::Cancelled)),
        result = tokio::time::timeout(timeout, request) => {
            result.change_context(KubernetesError::Timeout {
                seconds: timeout.as_secs(),
            })
        }
    }
}

/// Map a failed get to [`KubernetesError::WorkloadNotFound`] on 404, [`KubernetesError::GetFailed`] otherwise.
fn get_error(
    error: kube::Error,
    variant: ApiVariant,
    namespace: &str,
    name: &str,
) -> Report<KubernetesError> {
    match error {
        kube::Error::Api(response) if response.code == 404 => {
            Report::new(KubernetesError::WorkloadNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
        }
        e => {
            error!("Error in getting the deployment: {e}");
            Report::new(e).change_context(KubernetesError::GetFailed {
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: format!("{variant} get request failed"),
            })
        }
    }
}

/// [`WorkloadApi`] backed by a live cluster.
///
/// Every request is bounded by `request_timeout` and abandoned as soon as the
/// pass context is cancelled.
#[derive(Clone)]
pub struct KubeWorkloadApi {
    client: Client,
    request_timeout: Duration,
}

impl KubeWorkloadApi {
    pub fn new(client: Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    async fn list_replica_sets(
        &self,
        ctx: &PassContext,
        api: Api<ReplicaSet>,
        params: ListParams,
        scope: &str,
    ) -> Result<Vec<Revision>, Report<KubernetesError>> {
        let list = bounded(ctx, self.request_timeout, api.list(&params))
            .await?
            .change_context(KubernetesError::ListFailed {
                message: format!("replica sets ({scope})"),
            })
            .inspect_err(|e| error!("Error in listing the replica sets: {e:?}"))?;

        info!(count = list.items.len(), scope, "successfully listed the v1 replica sets");
        Ok(list
            .items
            .into_iter()
            .filter_map(revision_from_replica_set)
            .collect())
    }
}

#[async_trait::async_trait]
impl WorkloadApi for KubeWorkloadApi {
    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, selector = %selector))]
    async fn list_revisions(
        &self,
        ctx: &PassContext,
        selector: &LabelSelector,
    ) -> Result<Vec<Revision>, Report<KubernetesError>> {
        debug!("Start listing labelled replica sets");
        let params = ListParams::default().labels(&selector.to_string());
        self.list_replica_sets(ctx, Api::all(self.client.clone()), params, &selector.to_string())
            .await
    }

    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, namespace = %namespace))]
    async fn list_revisions_in_namespace(
        &self,
        ctx: &PassContext,
        namespace: &str,
    ) -> Result<Vec<Revision>, Report<KubernetesError>> {
        debug!("Start listing namespace replica sets");
        self.list_replica_sets(
            ctx,
            Api::namespaced(self.client.clone(), namespace),
            ListParams::default(),
            namespace,
        )
        .await
    }

    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, variant = %variant, namespace = %namespace, name = %name))]
    async fn get_workload(
        &self,
        ctx: &PassContext,
        variant: ApiVariant,
        namespace: &str,
        name: &str,
    ) -> Result<Workload, Report<KubernetesError>> {
        let result = match variant {
            ApiVariant::Primary => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                bounded(ctx, self.request_timeout, api.get(name))
                    .await?
                    .map(workload_from_deployment)
            }
            ApiVariant::Legacy => {
                let api: Api<LegacyDeployment> = Api::namespaced(self.client.clone(), namespace);
                bounded(ctx, self.request_timeout, api.get(name))
                    .await?
                    .map(workload_from_legacy)
            }
        };

        result.map_err(|e| get_error(e, variant, namespace, name))
    }

    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, variant = %variant, selector = %selector))]
    async fn list_workloads(
        &self,
        ctx: &PassContext,
        variant: ApiVariant,
        selector: &LabelSelector,
    ) -> Result<Vec<Workload>, Report<KubernetesError>> {
        let params = ListParams::default().labels(&selector.to_string());
        let result = match variant {
            ApiVariant::Primary => {
                let api: Api<Deployment> = Api::all(self.client.clone());
                bounded(ctx, self.request_timeout, api.list(&params))
                    .await?
                    .map(|list| list.items.into_iter().map(workload_from_deployment).collect::<Vec<_>>())
            }
            ApiVariant::Legacy => {
                let api: Api<LegacyDeployment> = Api::all(self.client.clone());
                bounded(ctx, self.request_timeout, api.list(&params))
                    .await?
                    .map(|list| list.items.into_iter().map(workload_from_legacy).collect::<Vec<_>>())
            }
        };

        let workloads: Vec<Workload> = result
            .change_context(KubernetesError::ListFailed {
                message: format!("{variant} deployments ({selector})"),
            })
            .inspect_err(|e| error!("Error in listing the deployments: {e:?}"))?;

        info!(count = workloads.len(), "successfully listed the {variant} deployments");
        Ok(workloads)
    }

    #[tracing::instrument(
        skip_all,
        fields(
            request_id = %ctx.request_id,
            variant = %workload.variant,
            deployment_namespace = %workload.namespace,
            deployment_name = %workload.name,
        )
    )]
    async fn patch_workload_replicas(
        &self,
        ctx: &PassContext,
        workload: &Workload,
        replicas: i32,
        frozen: Option<bool>,
    ) -> Result<(), Report<KubernetesError>> {
        let body = scale_patch(replicas, frozen);
        debug!(patch = %body, "Patching deployment");

        let params = PatchParams::default();
        let patch = Patch::Merge(&body);
        let result = match workload.variant {
            ApiVariant::Primary => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), &workload.namespace);
                bounded(ctx, self.request_timeout, api.patch(&workload.name, &params, &patch))
                    .await?
                    .map(|_| ())
            }
            ApiVariant::Legacy => {
                let api: Api<LegacyDeployment> =
                    Api::namespaced(self.client.clone(), &workload.namespace);
                bounded(ctx, self.request_timeout, api.patch(&workload.name, &params, &patch))
                    .await?
                    .map(|_| ())
            }
        };

        result
            .change_context(KubernetesError::PatchFailed {
                namespace: workload.namespace.clone(),
                name: workload.name.clone(),
                message: format!("setting replicas to {replicas}"),
            })
            .inspect_err(|e| error!("Error in scaling deployment replicas: {e:?}"))
    }
}
