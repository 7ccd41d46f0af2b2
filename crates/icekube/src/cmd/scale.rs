use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::core::context::PassContext;
use crate::core::reconciler::ScaleReconciler;
use crate::core::traits::WorkloadApi;
use crate::core::types::{ApiVariant, TargetState};

/// Set the replica count of a single Deployment, bypassing the freeze policy.
pub async fn scale_workload<A: WorkloadApi + ?Sized>(
    api: &A,
    variant: ApiVariant,
    namespace: &str,
    name: &str,
    replicas: i32,
) -> Result<TargetState> {
    let ctx = PassContext::new(CancellationToken::new());
    let workload = api
        .get_workload(&ctx, variant, namespace, name)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get {variant} deployment {namespace}/{name}: {e:?}"))?;

    ScaleReconciler::new(api)
        .scale(&ctx, &workload, replicas)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to scale {variant} deployment {namespace}/{name}: {e:?}"))
}
