use std::path::Path;

use error_stack::Report;
use error_stack::ResultExt;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;

use crate::k8s::types::KubernetesError;

/// Connect to the cluster icekube manages.
///
/// `--kubeconfig` (or `KUBECONFIG`) selects a file and its current context.
/// Without it the pod service account is used when running in a cluster,
/// falling back to `~/.kube/config` on a workstation.
///
/// # Errors
///
/// - [`KubernetesError::ConnectionFailed`] if the kubeconfig cannot be read or
///   no client configuration can be inferred
pub async fn init_kube_client(kubeconfig: Option<&Path>) -> Result<Client, Report<KubernetesError>> {
    let Some(path) = kubeconfig else {
        tracing::debug!("No --kubeconfig given, inferring cluster configuration");
        return Client::try_default()
            .await
            .change_context(KubernetesError::ConnectionFailed {
                message: "no in-cluster service account or ~/.kube/config usable".to_string(),
            });
    };

    tracing::debug!(kubeconfig = %path.display(), "Loading --kubeconfig");
    let kubeconfig = Kubeconfig::read_from(path).change_context(KubernetesError::ConnectionFailed {
        message: format!("--kubeconfig {} is not a readable kubeconfig", path.display()),
    })?;

    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .change_context(KubernetesError::ConnectionFailed {
            message: format!("current context of {} is unusable", path.display()),
        })?;

    Client::try_from(config).change_context(KubernetesError::ConnectionFailed {
        message: format!("cannot build a client for {}", path.display()),
    })
}
