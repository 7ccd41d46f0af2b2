//! Subcommand entry points.

pub mod list;
pub mod run;
pub mod scale;

use anyhow::Result;

use crate::config::Cli;
use crate::k8s::{init_kube_client, KubeWorkloadApi};

/// Connect to the cluster described by the global arguments.
pub async fn connect(cli: &Cli) -> Result<KubeWorkloadApi> {
    let client = init_kube_client(cli.kubeconfig.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize Kubernetes client: {e:?}"))?;

    Ok(KubeWorkloadApi::new(client, cli.request_timeout()))
}
