//! siteconfig operator - projects ClusterDeployment install progress onto ClusterInstances

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use kube::Client;

use siteconfig_common::telemetry::{init_telemetry, TelemetryConfig};
use siteconfig_operator::{build_deployment_controller, ControllerArgs, OperatorConfig, OsEnvConfig};

/// siteconfig operator - keeps ClusterInstance status in sync with hive ClusterDeployments
#[derive(Parser, Debug)]
#[command(name = "siteconfig-operator", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the ClusterDeployment controller (default mode)
    ///
    /// Watches ClusterDeployments owned by ClusterInstances and mirrors their
    /// install conditions and a Provisioned summary onto the ClusterInstance.
    Controller(ControllerArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry(TelemetryConfig::default()).context("failed to initialize telemetry")?;

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Controller(args)) => run_controller(args).await,
        None => run_controller(ControllerArgs::default()).await,
    }
}

async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    let config = OperatorConfig::resolve(&args, &OsEnvConfig)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        reconcile_timeout_secs = config.reconcile_timeout.as_secs(),
        error_requeue_secs = config.error_requeue.as_secs(),
        "Starting siteconfig operator"
    );

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    tracing::info!("Starting controllers:");
    build_deployment_controller(client, &config).await;

    tracing::info!("Controller stopped");
    Ok(())
}
