//! deploy-lottery deploys the lottery contract to the configured network and prints its address.

mod cli;

use std::process::ExitCode;

use cli::Cli;
use lottery_deploy::{DeployConfig, DeploymentPipeline};

#[tokio::main]
async fn main() -> ExitCode {
    // Load `.env` like the Hardhat project does, before the command line is parsed.
    let (cli, dotenv) = Cli::parse_with_env_file(None, std::env::args_os());

    // Initialize the logger. Stdout is reserved for the deployment report.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
    }

    let config = match DeployConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            eprintln!("Error: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    tracing::info!(
        config_path = %cli.config.display(),
        network = %config.network.name,
        endpoint = %config.network.endpoint,
        contract = %config.artifacts.contract,
        "Starting deployment..."
    );

    let pipeline = match DeploymentPipeline::from_config(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!(error = %e, "Failed to set up deployment");
            eprintln!("Error: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let code = pipeline
        .execute(&mut std::io::stdout(), &mut std::io::stderr())
        .await;

    ExitCode::from(code)
}
