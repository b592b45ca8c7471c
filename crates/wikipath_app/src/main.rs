use std::process::ExitCode;

use clap::Parser;
use wikipath_app::cli::Cli;
use wikipath_app::logging::{self, LogDestination};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::initialize(LogDestination::for_flags(cli.log_file), cli.verbose);
    wikipath_app::app::run(cli).await
}
