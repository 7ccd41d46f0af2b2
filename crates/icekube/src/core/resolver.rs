//! Picks the ReplicaSet that stands for a Deployment's active rollout.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use error_stack::Report;

use super::types::{OwnerKey, Revision, DEPLOYMENT_KIND};
use crate::k8s::types::KubernetesError;

/// Resolve the current revision of every Deployment among `revisions`.
///
/// Only ReplicaSets with nonzero desired replicas whose first owner is a
/// Deployment are candidates. Per owner the strictly highest revision number
/// wins; on an exact tie the first one seen is kept.
pub fn resolve_current_revisions(
    revisions: impl IntoIterator<Item = Revision>,
) -> BTreeMap<OwnerKey, Revision> {
    let mut current = BTreeMap::new();

    for revision in revisions {
        if revision.desired_replicas == 0 {
            tracing::trace!(replicaset_name = %revision.name, "skipping scaled down replica set");
            continue;
        }
        let Some(key) = deployment_owner(&revision) else {
            continue;
        };

        match current.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(revision);
            }
            Entry::Occupied(mut slot) => {
                if revision.revision > slot.get().revision {
                    slot.insert(revision);
                }
            }
        }
    }

    current
}

/// Deployments whose ReplicaSets among `revisions` all have zero desired replicas.
///
/// These are scaled down, frozen or parked, and never show up in
/// [`resolve_current_revisions`].
pub fn resolve_parked_owners(revisions: &[Revision]) -> BTreeSet<OwnerKey> {
    let mut parked = BTreeSet::new();
    let mut active = BTreeSet::new();

    for revision in revisions {
        let Some(key) = deployment_owner(revision) else {
            continue;
        };
        if revision.desired_replicas == 0 {
            parked.insert(key);
        } else {
            active.insert(key);
        }
    }

    parked.retain(|key| !active.contains(key));
    parked
}

fn deployment_owner(revision: &Revision) -> Option<OwnerKey> {
    match &revision.owner {
        Some(owner) if owner.kind == DEPLOYMENT_KIND => {
            Some(OwnerKey::new(&revision.namespace, &owner.name))
        }
        _ => None,
    }
}

/// Find the ReplicaSet with the highest revision among those owned by `owner`.
///
/// Scans every entry, including scaled down ones.
///
/// # Errors
///
/// - [`KubernetesError::RevisionNotFound`] if no ReplicaSet names `owner` as its first owner
pub fn resolve_most_recent_for_owner(
    revisions: &[Revision],
    owner: &str,
) -> Result<Revision, Report<KubernetesError>> {
    let mut best: Option<&Revision> = None;

    for candidate in revisions
        .iter()
        .filter(|revision| revision.owner_name() == Some(owner))
    {
        best = match best {
            Some(best) if best.revision >= candidate.revision => Some(best),
            _ => Some(candidate),
        };
    }

    best.cloned().ok_or_else(|| {
        Report::new(KubernetesError::RevisionNotFound {
            owner: owner.to_string(),
        })
    })
}
