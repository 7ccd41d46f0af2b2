use thiserror::Error;

/// Errors that can occur during Kubernetes operations.
///
/// List, get and patch failures abort the current suspend pass. Annotation
/// parse errors are absorbed by the caller with a safe default.
#[derive(Debug, Error)]
pub enum KubernetesError {
    #[error("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
    #[error("Failed to list resources: {message}")]
    ListFailed { message: String },
    #[error("Failed to get deployment {namespace}/{name}: {message}")]
    GetFailed {
        namespace: String,
        name: String,
        message: String,
    },
    #[error("Deployment not found: {name} in namespace {namespace}")]
    WorkloadNotFound { namespace: String, name: String },
    #[error("No replica set owned by {owner}")]
    RevisionNotFound { owner: String },
    #[error("Failed to patch deployment {namespace}/{name}: {message}")]
    PatchFailed {
        namespace: String,
        name: String,
        message: String,
    },
    #[error("Failed to parse annotations: {message}")]
    AnnotationParseError { message: String },
    #[error("Request cancelled")]
    Cancelled,
    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },
}
