use clap::Parser;
use station_stats::cli::{run, Cli};
use station_stats::error::{ProcessingError, Result};
use station_stats::utils::constants::INTERRUPTED_EXIT_CODE;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match run(cli).await {
        // Leave without dropping the runtime, which would wait on the blocked stdin reader.
        Err(ProcessingError::Interrupted) => std::process::exit(INTERRUPTED_EXIT_CODE),
        result => result,
    }
}
