// drivecast: polls Google Drive activity and fans changes out to
// configured receivers.

use clap::Parser;
use poller::{config, logging, supervisor::Supervisor};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "drivecast",
    version,
    about = "Google Drive activity poller",
    long_about = "Watches Google Drive activity for configured subtrees and \
                  forwards every change to the configured receivers."
)]
struct Cli {
    /// Settings file.  Defaults to settings.yaml (then config.yaml)
    /// beside the executable or in the working directory.
    #[arg(value_name = "settings.yaml")]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match config::load_settings(cli.settings.as_deref()) {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("FATAL: failed to load settings: {error}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(error) = logging::init(&settings.logging) {
        eprintln!("FATAL: failed to set up logging: {error}");
        return ExitCode::FAILURE;
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pollers = settings.pollers.len(),
        "drivecast starting"
    );

    let supervisor = match Supervisor::from_settings(&settings) {
        Ok(supervisor) => supervisor,
        Err(error) => {
            tracing::error!(%error, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    supervisor
        .run(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "signal listener failed");
            }
        })
        .await;

    info!("drivecast stopped");
    ExitCode::SUCCESS
}
