use appdeck::config::Config;
use appdeck::orchestrator::{DeploymentOrchestrator, RunOptions};
use appdeck::provision::VenvProvisioner;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Provision every app under the apps root and wire it into supervisord and nginx
#[derive(Parser, Debug)]
#[command(name = "appdeck", version)]
struct Cli {
    /// Write the shared supervisord and nginx configuration files
    #[arg(short, long)]
    deploy: bool,

    /// Delete each app's virtual environment and rebuild it from scratch
    #[arg(short = 'H', long)]
    hard_reset: bool,

    /// Tool configuration file (default: appdeck.toml when present)
    #[arg(short, long, env = "APPDECK_CONFIG")]
    config: Option<PathBuf>,

    /// Override the directory holding one sub-directory per app
    #[arg(long)]
    apps_root: Option<PathBuf>,

    /// Hold an exclusive lock on each shared file while merging into it
    #[arg(long)]
    lock: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("appdeck=debug".parse().expect("valid log directive")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Error occurred");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(apps_root) = cli.apps_root {
        config.paths.apps_root = apps_root;
    }
    config.lock |= cli.lock;

    info!(
        apps_root = %config.paths.apps_root.display(),
        supervisor_conf = %config.paths.supervisor_conf.display(),
        proxy_conf = %config.paths.proxy_conf.display(),
        lock = config.lock,
        "Configuration loaded"
    );

    let options = RunOptions {
        deploy: cli.deploy,
        hard_reset: cli.hard_reset,
    };
    let provisioner = VenvProvisioner::new(config.runtime.clone());
    let orchestrator = DeploymentOrchestrator::new(config, provisioner, options);

    let report = orchestrator.run().await?;
    for app in &report.apps {
        info!(
            dir = %app.dir_name,
            title = %app.setup.title,
            port = app.setup.port,
            base_path = %app.setup.base_path,
            supervisor = ?app.supervisor,
            proxy = ?app.proxy,
            "Done"
        );
    }

    Ok(())
}
