use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use icekube::cmd;
use icekube::config::Cli;
use icekube::config::Commands;
use icekube::core::Suspender;
use icekube::core::SystemClock;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();
    utils::logging::init(cli.debug);

    tracing::info!("Starting icekube {}", &**version::VERSION);

    let api = cmd::connect(&cli).await?;
    let selector = cli.selector();

    match cli.command {
        Commands::Run(run_args) => {
            let suspender = Suspender::new(api, SystemClock, selector);
            cmd::run::run_daemon(&suspender, run_args.interval()).await
        }
        Commands::Once => {
            let suspender = Suspender::new(api, SystemClock, selector);
            let summary = cmd::run::run_once(&suspender).await?;
            tracing::info!(
                evaluated = summary.evaluated,
                frozen = summary.frozen,
                thawed = summary.thawed,
                unchanged = summary.unchanged,
                "Suspend pass completed"
            );
            Ok(())
        }
        Commands::List(list_args) => {
            let workloads =
                cmd::list::list_workloads(&api, list_args.api_version.into(), &selector).await?;
            cmd::list::write_workloads(std::io::stdout().lock(), &workloads)
        }
        Commands::Scale(scale_args) => {
            let target = cmd::scale::scale_workload(
                &api,
                scale_args.api_version.into(),
                &scale_args.namespace,
                &scale_args.name,
                scale_args.replicas,
            )
            .await?;
            let line = serde_json::to_string(&target).context("serialize scale result")?;
            println!("{line}");
            Ok(())
        }
    }
}
