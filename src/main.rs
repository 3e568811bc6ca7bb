use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use ratewatch::AppCommand;
use ratewatch::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Serve the rate store over HTTP
    Serve,
    /// Periodically fetch API rates into the rate service
    Ingest,
    /// Periodically compare API rates with the national bank
    Monitor,
    /// Serve, ingest and monitor in one process
    Run,
}

impl Commands {
    fn into_app_command(self) -> Option<AppCommand> {
        match self {
            Commands::Setup => None,
            Commands::Serve => Some(AppCommand::Serve),
            Commands::Ingest => Some(AppCommand::Ingest),
            Commands::Monitor => Some(AppCommand::Monitor),
            Commands::Run => Some(AppCommand::Run),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command.map(Commands::into_app_command) {
        Some(Some(command)) => ratewatch::run_command(command, cli.config_path.as_deref()).await,
        Some(None) => ratewatch::cli::setup::setup(),
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
