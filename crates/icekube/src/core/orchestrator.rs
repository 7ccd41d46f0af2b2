use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use error_stack::Report;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::context::PassContext;
use super::policy::evaluate;
use super::reconciler::ScaleReconciler;
use super::resolver::{
    resolve_current_revisions, resolve_most_recent_for_owner, resolve_parked_owners,
};
use super::traits::{TimeSource, WorkloadApi};
use super::types::{ApiVariant, LabelSelector, OwnerKey, PassSummary, Revision};
use crate::k8s::types::KubernetesError;

/// Drives suspend passes over every Deployment matching a label selector.
pub struct Suspender<A, T> {
    api: A,
    clock: T,
    selector: LabelSelector,
}

impl<A: WorkloadApi, T: TimeSource> Suspender<A, T> {
    pub fn new(api: A, clock: T, selector: LabelSelector) -> Self {
        Self {
            api,
            clock,
            selector,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn selector(&self) -> &LabelSelector {
        &self.selector
    }

    /// Run one suspend pass.
    ///
    /// 1. List the opted-in ReplicaSets and resolve the current one per Deployment.
    /// 2. Evaluate each against its own `after-mins` threshold.
    /// 3. For exceeded ones, fetch the owning Deployment and reconcile it.
    /// 4. Thaw sweep: Deployments parked at zero with `frozen=false` get one
    ///    replica back. Their ReplicaSets have no desired replicas, so the
    ///    resolver drops them; they are found among the same labelled
    ///    ReplicaSets instead.
    ///
    /// Workloads are handled one at a time. The first list, get or patch
    /// failure aborts the pass; anything not yet visited is picked up by the
    /// next pass.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::ListFailed`] if listing ReplicaSets fails
    /// - [`KubernetesError::WorkloadNotFound`] / [`KubernetesError::GetFailed`] if an owning Deployment cannot be fetched
    /// - [`KubernetesError::PatchFailed`] if a scale patch is rejected
    /// - [`KubernetesError::Cancelled`] if the context is cancelled mid-pass
    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id, selector = %self.selector))]
    pub async fn run_suspend_pass(
        &self,
        ctx: &PassContext,
    ) -> Result<PassSummary, Report<KubernetesError>> {
        debug!("Start suspend pass");

        let revisions = self.api.list_revisions(ctx, &self.selector).await?;
        info!(count = revisions.len(), "successfully listed the replica sets");

        let parked = resolve_parked_owners(&revisions);
        let current = resolve_current_revisions(revisions);
        let reconciler = ScaleReconciler::new(&self.api);
        let now = self.clock.now();
        let mut summary = PassSummary::default();

        for (owner, revision) in &current {
            ctx.ensure_active()?;

            info!(
                replicaset_name = %revision.name,
                deployment_name = %owner.name,
                deployment_namespace = %owner.namespace,
                replica_count = revision.desired_replicas,
                creation_time = %revision.created_at,
                after_mins_value = revision.after_minutes.as_deref().unwrap_or_default(),
                "evaluating replica set"
            );

            let decision = evaluate(revision.created_at, revision.after_minutes.as_deref(), now);
            summary.evaluated += 1;
            if !decision.exceeded {
                continue;
            }

            info!(
                time_since = decision.elapsed_minutes,
                melt_time = decision.threshold_minutes,
                "Threshold exceeded"
            );

            let workload = self
                .api
                .get_workload(ctx, ApiVariant::Primary, &owner.namespace, &owner.name)
                .await?;
            let target = reconciler
                .reconcile_primary(ctx, &workload, revision, &decision)
                .await?;
            summary.record(target.action);
        }

        self.thaw_sweep(ctx, &reconciler, &parked, &mut summary).await?;

        info!(
            evaluated = summary.evaluated,
            frozen = summary.frozen,
            thawed = summary.thawed,
            unchanged = summary.unchanged,
            "Suspend pass finished"
        );
        Ok(summary)
    }

    /// Thaw parked Deployments whose frozen label was set to `false`.
    ///
    /// Candidates come from the labelled ReplicaSets of step 1: a Deployment
    /// whose ReplicaSets all want zero replicas. Each namespace is listed at
    /// most once per pass.
    async fn thaw_sweep(
        &self,
        ctx: &PassContext,
        reconciler: &ScaleReconciler<'_, A>,
        parked: &BTreeSet<OwnerKey>,
        summary: &mut PassSummary,
    ) -> Result<(), Report<KubernetesError>> {
        let now = self.clock.now();
        let mut namespace_revisions: BTreeMap<String, Vec<Revision>> = BTreeMap::new();

        for owner in parked {
            ctx.ensure_active()?;

            let workload = self
                .api
                .get_workload(ctx, ApiVariant::Primary, &owner.namespace, &owner.name)
                .await?;
            if workload.replicas != 0 || workload.frozen != Some(false) {
                debug!(
                    deployment_name = %owner.name,
                    deployment_namespace = %owner.namespace,
                    replica_count = workload.replicas,
                    frozen = ?workload.frozen,
                    "Deployment stays parked"
                );
                continue;
            }

            let revisions = match namespace_revisions.entry(owner.namespace.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(slot) => slot.insert(
                    self.api
                        .list_revisions_in_namespace(ctx, &owner.namespace)
                        .await?,
                ),
            };
            let revision = match resolve_most_recent_for_owner(revisions, &owner.name) {
                Ok(revision) => revision,
                Err(e) => {
                    warn!(
                        deployment_name = %owner.name,
                        deployment_namespace = %owner.namespace,
                        "Skipping thaw: {e:?}"
                    );
                    continue;
                }
            };

            // The thaw branch ignores the decision; it is only reported.
            let decision = evaluate(revision.created_at, revision.after_minutes.as_deref(), now);
            let target = reconciler
                .reconcile_primary(ctx, &workload, &revision, &decision)
                .await?;
            summary.record(target.action);
        }

        Ok(())
    }
}
