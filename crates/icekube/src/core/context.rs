use error_stack::Report;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::k8s::types::KubernetesError;

/// Request-scoped state threaded through every call of a suspend pass.
///
/// `request_id` is attached to every span the pass opens, so all log lines of
/// one pass can be correlated. Cancelling the token aborts in-flight API
/// requests and stops the pass before the next workload.
#[derive(Debug, Clone)]
pub struct PassContext {
    pub request_id: String,
    pub cancellation: CancellationToken,
}

impl PassContext {
    /// Create a context with a fresh request id.
    pub fn new(cancellation: CancellationToken) -> Self {
        Self::with_request_id(Uuid::new_v4().to_string(), cancellation)
    }

    pub fn with_request_id(request_id: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            request_id: request_id.into(),
            cancellation,
        }
    }

    /// # Errors
    ///
    /// - [`KubernetesError::Cancelled`] if the pass has been cancelled
    pub fn ensure_active(&self) -> Result<(), Report<KubernetesError>> {
        if self.cancellation.is_cancelled() {
            return Err(Report::new(KubernetesError::Cancelled));
        }
        Ok(())
    }
}
