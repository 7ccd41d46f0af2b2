use std::collections::BTreeMap;

use error_stack::Report;
use error_stack::ResultExt;

use crate::k8s::types::KubernetesError;

/// Pod template label marking a Deployment as eligible for freezing.
pub const SUSPEND_LABEL: &str = "icekube.kubernetes.io/suspend";
/// Pod template label written when a Deployment is frozen.
pub const FROZEN_LABEL: &str = "icekube.kubernetes.io/frozen";
/// ReplicaSet annotation holding the freeze threshold in minutes.
pub const AFTER_MINUTES_ANNOTATION: &str = "icekube.kubernetes.io/after-mins";
/// Rollout revision annotation maintained by the deployment controller.
pub const REVISION_ANNOTATION: &str = "deployment.kubernetes.io/revision";

/// Parse the freeze threshold annotation value.
///
/// # Errors
///
/// - [`KubernetesError::AnnotationParseError`] if the value is not a non-negative integer
pub fn parse_after_minutes(value: &str) -> Result<u32, Report<KubernetesError>> {
    value
        .trim()
        .parse::<u32>()
        .change_context(KubernetesError::AnnotationParseError {
            message: format!("Invalid {AFTER_MINUTES_ANNOTATION} value: {value:?}"),
        })
}

/// Extract the rollout revision number of a ReplicaSet.
///
/// A missing or unparsable annotation counts as revision 0.
pub fn revision_number(annotations: &BTreeMap<String, String>) -> u64 {
    annotations
        .get(REVISION_ANNOTATION)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

/// Read a boolean label. Only the exact strings `true` and `false` are recognised.
pub fn bool_label(labels: &BTreeMap<String, String>, key: &str) -> Option<bool> {
    match labels.get(key).map(String::as_str) {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}
