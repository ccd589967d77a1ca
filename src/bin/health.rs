//! appdeck-health - liveness probe for a host deployed with appdeck
//!
//! Exits 0 when supervisord has no FATAL programs and every configured URL
//! answers 200, 1 otherwise. `ALWAYS_HEALTHY=true` skips all checks.

use appdeck::config::Config;
use appdeck::health::HealthChecker;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "appdeck-health", version)]
struct Cli {
    /// Tool configuration file (default: appdeck.toml when present)
    #[arg(short, long, env = "APPDECK_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("appdeck=debug".parse().expect("valid log directive")),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let checker = HealthChecker::new(config.health).with_env_override();
    if checker.run().await {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
