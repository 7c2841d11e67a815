mod commands;
mod logging;
mod prompt;

use clap::{Parser, Subcommand};

use crate::commands::run::OutputFormat;

#[derive(Parser)]
#[command(
    name = "pagerepro",
    version,
    about = "Reproduces the Cassandra paged-scan NullPointerException in a throwaway container"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision Cassandra, run the scan sequence, and tear everything down
    Run {
        /// Do not wait for Enter when the defect fires
        #[arg(long)]
        no_pause: bool,
        /// Report format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Remove a container left behind by an interrupted run
    Teardown,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run { no_pause, format } => commands::run::execute(no_pause, format).await,
        Commands::Teardown => commands::teardown::execute().await,
    }
}
