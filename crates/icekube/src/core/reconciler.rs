use error_stack::Report;
use serde_json::json;
use tracing::info;
use tracing::warn;

use super::context::PassContext;
use super::traits::WorkloadApi;
use super::types::{ApiVariant, PolicyDecision, Revision, ScaleAction, TargetState, Workload};
use crate::k8s::annotations::FROZEN_LABEL;
use crate::k8s::types::KubernetesError;

/// Replica count a thawed workload is restored to.
pub const THAW_REPLICAS: i32 = 1;

/// Compute the freeze/thaw transition for an `apps/v1` workload.
///
/// The freeze check runs first, the thaw check second, both against the
/// observed state, so at most one of them fires:
///
/// - replicas != 0, `suspend=true`, threshold exceeded: scale to 0, `frozen=true`
/// - replicas == 0, `frozen=false`: scale to 1
/// - anything else, including replicas == 0 with `frozen=true`: no change
pub fn plan(workload: &Workload, decision: &PolicyDecision) -> TargetState {
    if workload.replicas != 0 && workload.suspend && decision.exceeded {
        return TargetState {
            action: ScaleAction::Freeze,
            replicas: 0,
            frozen: Some(true),
        };
    }

    if workload.replicas == 0 && workload.frozen == Some(false) {
        return TargetState {
            action: ScaleAction::Thaw,
            replicas: THAW_REPLICAS,
            frozen: None,
        };
    }

    TargetState::unchanged(workload.replicas)
}

/// Merge patch body setting `spec.replicas` and optionally the frozen template label.
pub fn scale_patch(replicas: i32, frozen: Option<bool>) -> serde_json::Value {
    match frozen {
        Some(frozen) => json!({
            "spec": {
                "replicas": replicas,
                "template": {
                    "metadata": {
                        "labels": { FROZEN_LABEL: frozen.to_string() }
                    }
                }
            }
        }),
        None => json!({ "spec": { "replicas": replicas } }),
    }
}

/// Applies replica transitions through a [`WorkloadApi`].
///
/// Write failures are returned untouched, there is no retry.
pub struct ScaleReconciler<'a, A: ?Sized> {
    api: &'a A,
}

impl<'a, A: WorkloadApi + ?Sized> ScaleReconciler<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Apply the freeze/thaw policy to an `apps/v1` workload.
    ///
    /// Legacy-variant workloads are left untouched: the policy only covers the
    /// primary schema.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::PatchFailed`] if the patch is rejected
    #[tracing::instrument(
        skip_all,
        fields(
            request_id = %ctx.request_id,
            deployment_namespace = %workload.namespace,
            deployment_name = %workload.name,
            replicaset_name = %revision.name,
        )
    )]
    pub async fn reconcile_primary(
        &self,
        ctx: &PassContext,
        workload: &Workload,
        revision: &Revision,
        decision: &PolicyDecision,
    ) -> Result<TargetState, Report<KubernetesError>> {
        if workload.variant != ApiVariant::Primary {
            warn!(variant = %workload.variant, "freeze policy only applies to apps/v1 deployments");
            return Ok(TargetState::unchanged(workload.replicas));
        }

        let target = plan(workload, decision);
        if target.requires_patch() {
            self.api
                .patch_workload_replicas(ctx, workload, target.replicas, target.frozen)
                .await?;
        }

        info!(
            action = ?target.action,
            desired_count = target.replicas,
            time_since = decision.elapsed_minutes,
            melt_time = decision.threshold_minutes,
            "Reconciled v1 deployment"
        );
        Ok(target)
    }

    /// Set the replica count of an `apps/v1beta2` workload.
    ///
    /// No threshold or label logic is involved; the legacy schema only ever
    /// supported plain scaling.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::PatchFailed`] if the patch is rejected
    #[tracing::instrument(
        skip_all,
        fields(
            request_id = %ctx.request_id,
            deployment_namespace = %workload.namespace,
            deployment_name = %workload.name,
        )
    )]
    pub async fn reconcile_legacy_variant(
        &self,
        ctx: &PassContext,
        workload: &Workload,
        replicas: i32,
    ) -> Result<TargetState, Report<KubernetesError>> {
        self.api
            .patch_workload_replicas(ctx, workload, replicas, None)
            .await?;

        info!(desired_count = replicas, "Successfully scaled the v1beta2 deployment");
        Ok(TargetState {
            action: ScaleAction::Scale,
            replicas,
            frozen: None,
        })
    }

    /// Unconditionally scale a workload of either variant.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::PatchFailed`] if the patch is rejected
    pub async fn scale(
        &self,
        ctx: &PassContext,
        workload: &Workload,
        replicas: i32,
    ) -> Result<TargetState, Report<KubernetesError>> {
        match workload.variant {
            ApiVariant::Legacy => self.reconcile_legacy_variant(ctx, workload, replicas).await,
            ApiVariant::Primary => {
                self.api
                    .patch_workload_replicas(ctx, workload, replicas, None)
                    .await?;
                info!(
                    deployment_namespace = %workload.namespace,
                    deployment_name = %workload.name,
                    desired_count = replicas,
                    "Successfully scaled the v1 deployment"
                );
                Ok(TargetState {
                    action: ScaleAction::Scale,
                    replicas,
                    frozen: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;
    use similar_asserts::assert_eq;
    use test_log::test;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::core::mock::MockWorkloadApi;
    use crate::core::mock::RecordedPatch;
    use crate::core::types::{Owner, DEPLOYMENT_KIND};

    fn workload(replicas: i32, suspend: bool, frozen: Option<bool>) -> Workload {
        Workload {
            namespace: "default".to_string(),
            name: "web".to_string(),
            variant: ApiVariant::Primary,
            replicas,
            suspend,
            frozen,
        }
    }

    fn revision() -> Revision {
        Revision {
            name: "web-7d9f".to_string(),
            namespace: "default".to_string(),
            owner: Some(Owner {
                kind: DEPLOYMENT_KIND.to_string(),
                name: "web".to_string(),
            }),
            revision: 1,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            desired_replicas: 2,
            after_minutes: Some("5".to_string()),
        }
    }

    fn decision(exceeded: bool) -> PolicyDecision {
        PolicyDecision {
            exceeded,
            elapsed_minutes: if exceeded { 10.0 } else { 1.0 },
            threshold_minutes: 5,
        }
    }

    fn ctx() -> PassContext {
        PassContext::with_request_id("test", CancellationToken::new())
    }

    #[test]
    fn plan_freezes_opted_in_running_workload() {
        let target = plan(&workload(3, true, None), &decision(true));
        assert_eq!(
            target,
            TargetState {
                action: ScaleAction::Freeze,
                replicas: 0,
                frozen: Some(true),
            }
        );
    }

    #[test]
    fn plan_never_freezes_without_opt_in() {
        let target = plan(&workload(3, false, None), &decision(true));
        assert_eq!(target, TargetState::unchanged(3));
    }

    #[test]
    fn plan_keeps_running_workload_within_threshold() {
        let target = plan(&workload(2, true, Some(false)), &decision(false));
        assert_eq!(target, TargetState::unchanged(2));
    }

    #[test]
    fn plan_thaws_regardless_of_elapsed_time() {
        for exceeded in [true, false] {
            let target = plan(&workload(0, true, Some(false)), &decision(exceeded));
            assert_eq!(
                target,
                TargetState {
                    action: ScaleAction::Thaw,
                    replicas: 1,
                    frozen: None,
                }
            );
        }
    }

    #[test]
    fn plan_leaves_parked_workload_alone() {
        for exceeded in [true, false] {
            let target = plan(&workload(0, true, Some(true)), &decision(exceeded));
            assert_eq!(target, TargetState::unchanged(0));
        }
    }

    #[test]
    fn plan_ignores_zero_replicas_without_frozen_label() {
        let target = plan(&workload(0, true, None), &decision(true));
        assert_eq!(target, TargetState::unchanged(0));
    }

    #[test]
    fn freeze_patch_shape() {
        assert_eq!(
            scale_patch(0, Some(true)).to_string(),
            r#"{"spec":{"replicas":0,"template":{"metadata":{"labels":{"icekube.kubernetes.io/frozen":"true"}}}}}"#
        );
    }

    #[test]
    fn plain_patch_shape() {
        assert_eq!(scale_patch(1, None).to_string(), r#"{"spec":{"replicas":1}}"#);
    }

    #[test(tokio::test)]
    async fn freeze_is_idempotent() {
        let api = MockWorkloadApi::new();
        api.add_workload(workload(2, true, None));
        let reconciler = ScaleReconciler::new(&api);

        let running = api.workload(ApiVariant::Primary, "default", "web").unwrap();
        let first = reconciler
            .reconcile_primary(&ctx(), &running, &revision(), &decision(true))
            .await
            .unwrap();
        assert_eq!(first.action, ScaleAction::Freeze);

        let observed = api.workload(ApiVariant::Primary, "default", "web").unwrap();
        assert_eq!(observed.replicas, 0);
        assert_eq!(observed.frozen, Some(true));

        let second = reconciler
            .reconcile_primary(&ctx(), &observed, &revision(), &decision(true))
            .await
            .unwrap();
        assert_eq!(second.action, ScaleAction::Unchanged);
        assert_eq!(api.patches().len(), 1);
    }

    #[test(tokio::test)]
    async fn thaw_issues_plain_patch() {
        let api = MockWorkloadApi::new();
        let frozen = workload(0, true, Some(false));
        api.add_workload(frozen.clone());

        let target = ScaleReconciler::new(&api)
            .reconcile_primary(&ctx(), &frozen, &revision(), &decision(false))
            .await
            .unwrap();

        assert_eq!(target.action, ScaleAction::Thaw);
        assert_eq!(
            api.patches(),
            vec![RecordedPatch {
                variant: ApiVariant::Primary,
                namespace: "default".to_string(),
                name: "web".to_string(),
                replicas: 1,
                frozen: None,
            }]
        );
    }

    #[test(tokio::test)]
    async fn patch_failure_is_returned() {
        let api = MockWorkloadApi::new();
        api.add_workload(workload(2, true, None));
        api.fail_patches();

        let err = ScaleReconciler::new(&api)
            .reconcile_primary(&ctx(), &workload(2, true, None), &revision(), &decision(true))
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            KubernetesError::PatchFailed { .. }
        ));
    }

    #[test(tokio::test)]
    async fn primary_policy_skips_legacy_workloads() {
        let api = MockWorkloadApi::new();
        let mut legacy = workload(2, true, None);
        legacy.variant = ApiVariant::Legacy;
        api.add_workload(legacy.clone());

        let target = ScaleReconciler::new(&api)
            .reconcile_primary(&ctx(), &legacy, &revision(), &decision(true))
            .await
            .unwrap();
        assert_eq!(target, TargetState::unchanged(2));
        assert!(api.patches().is_empty());
    }

    #[test(tokio::test)]
    async fn legacy_variant_scales_unconditionally() {
        let api = MockWorkloadApi::new();
        let mut legacy = workload(0, false, Some(true));
        legacy.variant = ApiVariant::Legacy;
        api.add_workload(legacy.clone());

        let target = ScaleReconciler::new(&api)
            .scale(&ctx(), &legacy, 4)
            .await
            .unwrap();
        assert_eq!(target.action, ScaleAction::Scale);

        let observed = api.workload(ApiVariant::Legacy, "default", "web").unwrap();
        assert_eq!(observed.replicas, 4);
        assert_eq!(observed.frozen, Some(true));
    }

    #[test(tokio::test)]
    async fn scale_primary_leaves_labels_alone() {
        let api = MockWorkloadApi::new();
        api.add_workload(workload(0, true, Some(true)));

        let target = ScaleReconciler::new(&api)
            .scale(&ctx(), &workload(0, true, Some(true)), 3)
            .await
            .unwrap();
        assert_eq!(target.replicas, 3);
        assert_eq!(api.patches()[0].frozen, None);
    }
}
