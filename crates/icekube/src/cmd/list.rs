use std::io::Write;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::core::context::PassContext;
use crate::core::traits::WorkloadApi;
use crate::core::types::{ApiVariant, LabelSelector, Workload};

/// List the Deployments of `variant` matching `selector`.
pub async fn list_workloads<A: WorkloadApi + ?Sized>(
    api: &A,
    variant: ApiVariant,
    selector: &LabelSelector,
) -> Result<Vec<Workload>> {
    let ctx = PassContext::new(CancellationToken::new());
    api.list_workloads(&ctx, variant, selector)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list {variant} deployments: {e:?}"))
}

/// Print one JSON object per workload.
pub fn write_workloads(mut out: impl Write, workloads: &[Workload]) -> Result<()> {
    for workload in workloads {
        let line = serde_json::to_string(workload).context("serialize workload")?;
        writeln!(out, "{line}").context("write workload")?;
    }
    Ok(())
}
