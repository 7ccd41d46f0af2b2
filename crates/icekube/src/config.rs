use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use utils::version;

use crate::core::types::{ApiVariant, LabelSelector};
use crate::k8s::annotations::SUSPEND_LABEL;

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "ICEKUBE_DEBUG",
        help = "Log at debug level with source locations"
    )]
    pub debug: bool,

    #[arg(
        long,
        global = true,
        env = "ICEKUBE_REQUEST_TIMEOUT_SECS",
        default_value = "30",
        help = "Timeout for a single Kubernetes API request"
    )]
    pub request_timeout_secs: u64,

    #[arg(
        long,
        global = true,
        env = "ICEKUBE_LABEL_KEY",
        default_value = SUSPEND_LABEL,
        help = "Label key selecting opted-in replica sets and deployments"
    )]
    pub label_key: String,

    #[arg(
        long,
        global = true,
        env = "ICEKUBE_LABEL_VALUE",
        default_value = "true",
        help = "Label value selecting opted-in replica sets and deployments"
    )]
    pub label_value: String,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn selector(&self) -> LabelSelector {
        LabelSelector::new(&self.label_key, &self.label_value)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run suspend passes periodically until interrupted
    Run(RunArgs),
    /// Run a single suspend pass
    Once,
    /// List opted-in deployments
    List(ListArgs),
    /// Set the replica count of a deployment
    Scale(ScaleArgs),
}

#[derive(Args)]
pub struct RunArgs {
    #[arg(
        long,
        env = "ICEKUBE_INTERVAL_SECS",
        default_value = "60",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between two suspend passes"
    )]
    pub interval_secs: u64,
}

impl RunArgs {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Deployment API version on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ApiVersionArg {
    #[value(name = "v1")]
    V1,
    #[value(name = "v1beta2")]
    V1beta2,
}

impl From<ApiVersionArg> for ApiVariant {
    fn from(arg: ApiVersionArg) -> Self {
        match arg {
            ApiVersionArg::V1 => Self::Primary,
            ApiVersionArg::V1beta2 => Self::Legacy,
        }
    }
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long, value_enum, default_value = "v1", help = "Deployment API version")]
    pub api_version: ApiVersionArg,
}

#[derive(Args)]
pub struct ScaleArgs {
    #[arg(long, value_enum, default_value = "v1", help = "Deployment API version")]
    pub api_version: ApiVersionArg,

    #[arg(long, short = 'n', help = "Namespace of the deployment")]
    pub namespace: String,

    #[arg(long, help = "Name of the deployment")]
    pub name: String,

    #[arg(
        long,
        value_parser = clap::value_parser!(i32).range(0..),
        help = "Replica count to set"
    )]
    pub replicas: i32,
}
