use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Duration;
use chrono::TimeZone;
use chrono::Utc;
use icekube::core::mock::{MockWorkloadApi, RecordedPatch};
use icekube::core::reconciler::scale_patch;
use icekube::core::{
    ApiVariant, LabelSelector, Owner, PassContext, Revision, Suspender, TimeSource, Workload,
    DEPLOYMENT_KIND,
};
use icekube::k8s::annotations::FROZEN_LABEL;
use icekube::k8s::KubernetesError;
use serde_json::json;
use similar_asserts::assert_eq;
use test_log::test;
use tokio_util::sync::CancellationToken;

struct FixedClock(DateTime<Utc>);

impl TimeSource for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn ctx() -> PassContext {
    PassContext::new(CancellationToken::new())
}

fn deployment(name: &str, replicas: i32, frozen: Option<bool>) -> Workload {
    Workload {
        namespace: "default".to_string(),
        name: name.to_string(),
        variant: ApiVariant::Primary,
        replicas,
        suspend: true,
        frozen,
    }
}

fn replica_set(
    name: &str,
    owner: &str,
    revision: u64,
    desired_replicas: i32,
    age_minutes: i64,
    after_minutes: Option<&str>,
) -> Revision {
    Revision {
        name: name.to_string(),
        namespace: "default".to_string(),
        owner: Some(Owner {
            kind: DEPLOYMENT_KIND.to_string(),
            name: owner.to_string(),
        }),
        revision,
        created_at: now() - Duration::minutes(age_minutes),
        desired_replicas,
        after_minutes: after_minutes.map(str::to_string),
    }
}

fn suspender(api: MockWorkloadApi) -> Suspender<MockWorkloadApi, FixedClock> {
    Suspender::new(api, FixedClock(now()), LabelSelector::default())
}

fn patch(name: &str, replicas: i32, frozen: Option<bool>) -> RecordedPatch {
    RecordedPatch {
        variant: ApiVariant::Primary,
        namespace: "default".to_string(),
        name: name.to_string(),
        replicas,
        frozen,
    }
}

#[test(tokio::test)]
async fn newest_expired_revision_freezes_its_deployment() {
    let api = MockWorkloadApi::new();
    api.add_workload(deployment("dep1", 2, None));
    api.add_revision(replica_set("rs-a", "dep1", 3, 2, 10, Some("5")));
    api.add_revision(replica_set("rs-b", "dep1", 2, 2, 30, None));
    let suspender = suspender(api);

    let summary = suspender.run_suspend_pass(&ctx()).await.unwrap();

    assert_eq!(summary.evaluated, 1);
    assert_eq!(summary.frozen, 1);
    assert_eq!(suspender.api().patches(), vec![patch("dep1", 0, Some(true))]);
}

#[test(tokio::test)]
async fn cleared_frozen_label_thaws_parked_deployment() {
    let api = MockWorkloadApi::new();
    api.add_workload(deployment("dep2", 0, Some(false)));
    api.add_revision(replica_set("dep2-rs", "dep2", 4, 0, 120, Some("60")));
    let suspender = suspender(api);

    let summary = suspender.run_suspend_pass(&ctx()).await.unwrap();

    assert_eq!(summary.thawed, 1);
    assert_eq!(suspender.api().patches(), vec![patch("dep2", 1, None)]);
}

#[test(tokio::test)]
async fn missing_threshold_freezes_immediately() {
    let api = MockWorkloadApi::new();
    api.add_workload(deployment("dep3", 1, None));
    api.add_revision(replica_set("dep3-rs", "dep3", 1, 1, 1, None));
    let suspender = suspender(api);

    suspender.run_suspend_pass(&ctx()).await.unwrap();

    assert_eq!(suspender.api().patches(), vec![patch("dep3", 0, Some(true))]);
}

#[test(tokio::test)]
async fn freeze_park_and_thaw_cycle() {
    let api = MockWorkloadApi::new();
    api.add_workload(deployment("web", 2, None));
    api.add_revision(replica_set("web-rs", "web", 5, 2, 45, Some("30")));
    let suspender = suspender(api);

    suspender.run_suspend_pass(&ctx()).await.unwrap();
    let frozen = suspender
        .api()
        .workload(ApiVariant::Primary, "default", "web")
        .unwrap();
    assert_eq!((frozen.replicas, frozen.frozen), (0, Some(true)));

    // Parked: nothing happens while the label stays `true`.
    let summary = suspender.run_suspend_pass(&ctx()).await.unwrap();
    assert_eq!(summary.frozen + summary.thawed, 0);
    assert_eq!(suspender.api().patches().len(), 1);

    suspender.api().set_frozen_label("default", "web", Some(false));
    suspender.run_suspend_pass(&ctx()).await.unwrap();

    let thawed = suspender
        .api()
        .workload(ApiVariant::Primary, "default", "web")
        .unwrap();
    assert_eq!(thawed.replicas, 1);
    assert_eq!(thawed.frozen, Some(false));
    assert_eq!(
        suspender.api().patches(),
        vec![patch("web", 0, Some(true)), patch("web", 1, None)]
    );
}

#[test(tokio::test)]
async fn template_labelled_deployment_thaws_after_freeze() {
    let api = MockWorkloadApi::new();
    // Opted in through the pod template only; the Deployment metadata has no labels.
    api.add_workload_with_labels(deployment("tpl", 3, None), BTreeMap::new());
    api.add_revision(replica_set("tpl-rs", "tpl", 2, 3, 20, Some("10")));
    let suspender = suspender(api);

    suspender.run_suspend_pass(&ctx()).await.unwrap();
    suspender.api().set_frozen_label("default", "tpl", Some(false));
    let summary = suspender.run_suspend_pass(&ctx()).await.unwrap();

    assert_eq!(summary.thawed, 1);
    assert_eq!(
        suspender.api().patches(),
        vec![patch("tpl", 0, Some(true)), patch("tpl", 1, None)]
    );
}

#[test(tokio::test)]
async fn expired_revision_of_legacy_deployment_is_not_frozen() {
    let api = MockWorkloadApi::new();
    api.add_workload(Workload {
        variant: ApiVariant::Legacy,
        ..deployment("old", 2, None)
    });
    api.add_revision(replica_set("old-rs", "old", 1, 2, 90, Some("5")));
    let suspender = suspender(api);

    let err = suspender.run_suspend_pass(&ctx()).await.unwrap_err();

    assert!(matches!(
        err.current_context(),
        KubernetesError::WorkloadNotFound { name, .. } if name == "old"
    ));
    assert!(suspender.api().patches().is_empty());
}

#[test]
fn freeze_patch_body() {
    assert_eq!(
        scale_patch(0, Some(true)),
        json!({
            "spec": {
                "replicas": 0,
                "template": { "metadata": { "labels": { FROZEN_LABEL: "true" } } }
            }
        })
    );
    assert_eq!(scale_patch(1, None), json!({ "spec": { "replicas": 1 } }));
}
