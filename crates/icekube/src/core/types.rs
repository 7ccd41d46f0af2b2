//! Domain types shared by the resolver, the policy evaluator and the reconciler.

use std::collections::BTreeMap;
use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use crate::k8s::annotations::SUSPEND_LABEL;

/// Owner kind a ReplicaSet must carry to take part in revision resolution.
pub const DEPLOYMENT_KIND: &str = "Deployment";

/// The two Deployment schema versions the engine talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ApiVariant {
    /// `apps/v1`, the variant the freeze/thaw policy applies to.
    #[serde(rename = "apps/v1")]
    Primary,
    /// `apps/v1beta2`, supported for unconditional scaling only.
    #[serde(rename = "apps/v1beta2")]
    Legacy,
}

impl ApiVariant {
    pub const fn group(&self) -> &'static str {
        "apps"
    }

    pub const fn version(&self) -> &'static str {
        match self {
            Self::Primary => "v1",
            Self::Legacy => "v1beta2",
        }
    }
}

impl fmt::Display for ApiVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group(), self.version())
    }
}

/// A Deployment as observed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workload {
    pub namespace: String,
    pub name: String,
    pub variant: ApiVariant,
    /// `spec.replicas`, defaulted to 1 when unset like the API server does.
    pub replicas: i32,
    /// Template label opting the Deployment into freezing.
    pub suspend: bool,
    /// Template label written by the engine. `None` when absent or not a boolean.
    pub frozen: Option<bool>,
}

/// First owner reference of a ReplicaSet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub kind: String,
    pub name: String,
}

/// A ReplicaSet representing one rollout generation of a Workload.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    pub name: String,
    pub namespace: String,
    pub owner: Option<Owner>,
    /// Parsed `deployment.kubernetes.io/revision`, 0 when missing or invalid.
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    /// `spec.replicas`, defaulted to 1 when unset.
    pub desired_replicas: i32,
    /// Raw `icekube.kubernetes.io/after-mins` annotation value.
    pub after_minutes: Option<String>,
}

impl Revision {
    pub fn owner_name(&self) -> Option<&str> {
        self.owner.as_ref().map(|owner| owner.name.as_str())
    }
}

/// Identifies the Deployment owning a set of ReplicaSets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerKey {
    pub namespace: String,
    pub name: String,
}

impl OwnerKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Equality label selector used to find opted-in resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSelector {
    pub key: String,
    pub value: String,
}

impl LabelSelector {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Whether `labels` satisfies this equality selector.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        labels.get(&self.key) == Some(&self.value)
    }
}

impl Default for LabelSelector {
    fn default() -> Self {
        Self::new(SUSPEND_LABEL, "true")
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Outcome of evaluating the freeze threshold against a revision's age.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyDecision {
    pub exceeded: bool,
    pub elapsed_minutes: f64,
    pub threshold_minutes: u32,
}

/// What the reconciler did, or would do, to a Workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleAction {
    /// Scaled to zero and labelled frozen.
    Freeze,
    /// Scaled back to one replica.
    Thaw,
    /// Unconditional replica change.
    Scale,
    Unchanged,
}

/// Replica count and frozen label a Workload is driven to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetState {
    pub action: ScaleAction,
    pub replicas: i32,
    /// Frozen label value written alongside the replica count, if any.
    pub frozen: Option<bool>,
}

impl TargetState {
    pub const fn unchanged(replicas: i32) -> Self {
        Self {
            action: ScaleAction::Unchanged,
            replicas,
            frozen: None,
        }
    }

    pub const fn requires_patch(&self) -> bool {
        !matches!(self.action, ScaleAction::Unchanged)
    }
}

/// Counters reported at the end of a suspend pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// Current revisions checked against their threshold.
    pub evaluated: usize,
    pub frozen: usize,
    pub thawed: usize,
    pub unchanged: usize,
}

impl PassSummary {
    pub(crate) fn record(&mut self, action: ScaleAction) {
        match action {
            ScaleAction::Freeze => self.frozen += 1,
            ScaleAction::Thaw => self.thawed += 1,
            ScaleAction::Scale | ScaleAction::Unchanged => self.unchanged += 1,
        }
    }
}
