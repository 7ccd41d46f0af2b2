//! Conversions from Kubernetes objects into engine types.

use std::borrow::Cow;
use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::NamespaceResourceScope;
use kube::api::ObjectMeta;
use serde::Deserialize;
use serde::Serialize;

use crate::core::types::{ApiVariant, Owner, Revision, Workload, DEPLOYMENT_KIND};
use crate::k8s::annotations::{
    bool_label, revision_number, AFTER_MINUTES_ANNOTATION, FROZEN_LABEL, SUSPEND_LABEL,
};

/// Replica count the API server assumes when `spec.replicas` is unset.
const DEFAULT_REPLICAS: i32 = 1;

/// Convert a ReplicaSet. Objects without a creation timestamp are skipped.
pub fn revision_from_replica_set(replica_set: ReplicaSet) -> Option<Revision> {
    let metadata = replica_set.metadata;
    let name = metadata.name.unwrap_or_default();

    let Some(created_at) = metadata.creation_timestamp.map(|time| time.0) else {
        tracing::warn!(replicaset_name = %name, "replica set has no creation timestamp, skipping");
        return None;
    };

    let annotations = metadata.annotations.unwrap_or_default();
    let owner = metadata
        .owner_references
        .unwrap_or_default()
        .into_iter()
        .next()
        .map(|reference| Owner {
            kind: reference.kind,
            name: reference.name,
        });

    Some(Revision {
        name,
        namespace: metadata.namespace.unwrap_or_default(),
        owner,
        revision: revision_number(&annotations),
        created_at,
        desired_replicas: replica_set
            .spec
            .and_then(|spec| spec.replicas)
            .unwrap_or(DEFAULT_REPLICAS),
        after_minutes: annotations.get(AFTER_MINUTES_ANNOTATION).cloned(),
    })
}

pub fn workload_from_deployment(deployment: Deployment) -> Workload {
    let metadata = deployment.metadata;
    let (replicas, labels) = match deployment.spec {
        Some(spec) => (
            spec.replicas.unwrap_or(DEFAULT_REPLICAS),
            spec.template
                .metadata
                .and_then(|metadata| metadata.labels)
                .unwrap_or_default(),
        ),
        None => (DEFAULT_REPLICAS, BTreeMap::new()),
    };

    workload(
        metadata.namespace.unwrap_or_default(),
        metadata.name.unwrap_or_default(),
        ApiVariant::Primary,
        replicas,
        &labels,
    )
}

/// `apps/v1beta2` Deployment. k8s-openapi no longer ships this version, so
/// only the fields the engine reads are modelled.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LegacyDeployment {
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<LegacySpec>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LegacySpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    pub template: LegacyTemplate,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LegacyTemplate {
    pub metadata: LegacyTemplateMetadata,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LegacyTemplateMetadata {
    pub labels: BTreeMap<String, String>,
}

// Implement the Resource trait manually
impl kube::Resource for LegacyDeployment {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn group(_dt: &()) -> Cow<'_, str> {
        ApiVariant::Legacy.group().into()
    }

    fn version(_dt: &()) -> Cow<'_, str> {
        ApiVariant::Legacy.version().into()
    }

    fn kind(_dt: &()) -> Cow<'_, str> {
        DEPLOYMENT_KIND.into()
    }

    fn plural(_dt: &()) -> Cow<'_, str> {
        "deployments".into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

pub fn workload_from_legacy(deployment: LegacyDeployment) -> Workload {
    let spec = deployment.spec.unwrap_or_default();

    workload(
        deployment.metadata.namespace.unwrap_or_default(),
        deployment.metadata.name.unwrap_or_default(),
        ApiVariant::Legacy,
        spec.replicas.unwrap_or(DEFAULT_REPLICAS),
        &spec.template.metadata.labels,
    )
}

fn workload(
    namespace: String,
    name: String,
    variant: ApiVariant,
    replicas: i32,
    labels: &BTreeMap<String, String>,
) -> Workload {
    Workload {
        namespace,
        name,
        variant,
        replicas,
        suspend: bool_label(labels, SUSPEND_LABEL) == Some(true),
        frozen: bool_label(labels, FROZEN_LABEL),
    }
}
