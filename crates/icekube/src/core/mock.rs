//! In-memory [`WorkloadApi`] for tests
//!
//! Patches are applied to the stored workloads, and the newest ReplicaSet of
//! a patched `apps/v1` Deployment follows its replica count the way the
//! deployment controller would, so consecutive passes observe each other's
//! writes. Label selectors are matched against the labels registered with
//! each object: Deployment metadata labels for workloads, and template labels
//! (as propagated by the deployment controller) for ReplicaSets.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use error_stack::Report;

use super::context::PassContext;
use super::traits::WorkloadApi;
use super::types::{ApiVariant, LabelSelector, Revision, Workload};
use crate::k8s::annotations::SUSPEND_LABEL;
use crate::k8s::types::KubernetesError;

/// A patch received by [`MockWorkloadApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPatch {
    pub variant: ApiVariant,
    pub namespace: String,
    pub name: String,
    pub replicas: i32,
    pub frozen: Option<bool>,
}

type WorkloadKey = (ApiVariant, String, String);
type Labels = BTreeMap<String, String>;

#[derive(Default)]
struct MockState {
    workloads: BTreeMap<WorkloadKey, (Workload, Labels)>,
    revisions: Vec<(Revision, Labels)>,
    patches: Vec<RecordedPatch>,
    request_ids: Vec<String>,
    fail_lists: bool,
    fail_gets: bool,
    fail_patches: bool,
}

#[derive(Default)]
pub struct MockWorkloadApi {
    state: Mutex<MockState>,
}

impl MockWorkloadApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workload whose metadata carries the suspend label when it is opted in.
    pub fn add_workload(&self, workload: Workload) {
        let labels = opt_in_labels(workload.suspend);
        self.add_workload_with_labels(workload, labels);
    }

    /// Register a workload with explicit metadata labels.
    pub fn add_workload_with_labels(&self, workload: Workload, labels: Labels) {
        let key = (
            workload.variant,
            workload.namespace.clone(),
            workload.name.clone(),
        );
        self.state
            .lock()
            .unwrap()
            .workloads
            .insert(key, (workload, labels));
    }

    /// Register a ReplicaSet carrying the default suspend label.
    pub fn add_revision(&self, revision: Revision) {
        self.add_revision_with_labels(revision, opt_in_labels(true));
    }

    pub fn add_revision_with_labels(&self, revision: Revision, labels: Labels) {
        self.state.lock().unwrap().revisions.push((revision, labels));
    }

    pub fn workload(&self, variant: ApiVariant, namespace: &str, name: &str) -> Option<Workload> {
        let key = (variant, namespace.to_string(), name.to_string());
        self.state
            .lock()
            .unwrap()
            .workloads
            .get(&key)
            .map(|(workload, _)| workload.clone())
    }

    /// Flip the frozen label the way an operator would.
    pub fn set_frozen_label(&self, namespace: &str, name: &str, frozen: Option<bool>) {
        let key = (ApiVariant::Primary, namespace.to_string(), name.to_string());
        if let Some((workload, _)) = self.state.lock().unwrap().workloads.get_mut(&key) {
            workload.frozen = frozen;
        }
    }

    pub fn patches(&self) -> Vec<RecordedPatch> {
        self.state.lock().unwrap().patches.clone()
    }

    /// Request ids of every call received, in order.
    pub fn request_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().request_ids.clone()
    }

    pub fn fail_lists(&self) {
        self.state.lock().unwrap().fail_lists = true;
    }

    pub fn fail_gets(&self) {
        self.state.lock().unwrap().fail_gets = true;
    }

    pub fn fail_patches(&self) {
        self.state.lock().unwrap().fail_patches = true;
    }

    fn begin(
        &self,
        ctx: &PassContext,
    ) -> Result<MutexGuard<'_, MockState>, Report<KubernetesError>> {
        ctx.ensure_active()?;
        let mut state = self.state.lock().unwrap();
        state.request_ids.push(ctx.request_id.clone());
        Ok(state)
    }
}

#[async_trait::async_trait]
impl WorkloadApi for MockWorkloadApi {
    async fn list_revisions(
        &self,
        ctx: &PassContext,
        selector: &LabelSelector,
    ) -> Result<Vec<Revision>, Report<KubernetesError>> {
        let state = self.begin(ctx)?;
        if state.fail_lists {
            return Err(Report::new(KubernetesError::ListFailed {
                message: "injected list failure".to_string(),
            }));
        }
        Ok(state
            .revisions
            .iter()
            .filter(|(_, labels)| selector.matches(labels))
            .map(|(revision, _)| revision.clone())
            .collect())
    }

    async fn list_revisions_in_namespace(
        &self,
        ctx: &PassContext,
        namespace: &str,
    ) -> Result<Vec<Revision>, Report<KubernetesError>> {
        let state = self.begin(ctx)?;
        if state.fail_lists {
            return Err(Report::new(KubernetesError::ListFailed {
                message: "injected list failure".to_string(),
            }));
        }
        Ok(state
            .revisions
            .iter()
            .map(|(revision, _)| revision)
            .filter(|revision| revision.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn get_workload(
        &self,
        ctx: &PassContext,
        variant: ApiVariant,
        namespace: &str,
        name: &str,
    ) -> Result<Workload, Report<KubernetesError>> {
        let state = self.begin(ctx)?;
        if state.fail_gets {
            return Err(Report::new(KubernetesError::GetFailed {
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: "injected get failure".to_string(),
            }));
        }
        let key = (variant, namespace.to_string(), name.to_string());
        state
            .workloads
            .get(&key)
            .map(|(workload, _)| workload.clone())
            .ok_or_else(|| {
                Report::new(KubernetesError::WorkloadNotFound {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                })
            })
    }

    async fn list_workloads(
        &self,
        ctx: &PassContext,
        variant: ApiVariant,
        selector: &LabelSelector,
    ) -> Result<Vec<Workload>, Report<KubernetesError>> {
        let state = self.begin(ctx)?;
        if state.fail_lists {
            return Err(Report::new(KubernetesError::ListFailed {
                message: "injected list failure".to_string(),
            }));
        }
        Ok(state
            .workloads
            .values()
            .filter(|(workload, labels)| workload.variant == variant && selector.matches(labels))
            .map(|(workload, _)| workload.clone())
            .collect())
    }

    async fn patch_workload_replicas(
        &self,
        ctx: &PassContext,
        workload: &Workload,
        replicas: i32,
        frozen: Option<bool>,
    ) -> Result<(), Report<KubernetesError>> {
        let mut state = self.begin(ctx)?;
        if state.fail_patches {
            return Err(Report::new(KubernetesError::PatchFailed {
                namespace: workload.namespace.clone(),
                name: workload.name.clone(),
                message: "injected patch failure".to_string(),
            }));
        }

        state.patches.push(RecordedPatch {
            variant: workload.variant,
            namespace: workload.namespace.clone(),
            name: workload.name.clone(),
            replicas,
            frozen,
        });

        let key = (
            workload.variant,
            workload.namespace.clone(),
            workload.name.clone(),
        );
        if let Some((stored, _)) = state.workloads.get_mut(&key) {
            stored.replicas = replicas;
            if frozen.is_some() {
                stored.frozen = frozen;
            }
        }

        if workload.variant == ApiVariant::Primary {
            let newest = state
                .revisions
                .iter_mut()
                .map(|(revision, _)| revision)
                .filter(|revision| {
                    revision.namespace == workload.namespace
                        && revision.owner_name() == Some(workload.name.as_str())
                })
                .max_by_key(|revision| revision.revision);
            if let Some(revision) = newest {
                revision.desired_replicas = replicas;
            }
        }

        Ok(())
    }
}

fn opt_in_labels(opted_in: bool) -> Labels {
    if opted_in {
        BTreeMap::from([(SUSPEND_LABEL.to_string(), "true".to_string())])
    } else {
        Labels::new()
    }
}
