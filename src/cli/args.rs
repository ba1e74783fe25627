use crate::config::ConfigOverrides;
use crate::processors::{DistributionStrategy, MalformedPolicy};
use clap::Parser;
use std::path::PathBuf;

/// Reads `<station>;<measurement>` lines from stdin and prints
/// `station=min/mean/max` for every station, sorted by name.
#[derive(Parser, Debug)]
#[command(name = "station-stats")]
#[command(about = "Per-station min/mean/max aggregation of measurements read from stdin")]
#[command(version)]
pub struct Cli {
    #[arg(short, long, help = "Number of partition workers [default: number of CPUs]")]
    pub workers: Option<usize>,

    #[arg(
        long,
        value_enum,
        help = "How lines are distributed to workers [default: shared-queue]"
    )]
    pub strategy: Option<DistributionStrategy>,

    #[arg(long, help = "Batches buffered between reader and workers [default: 64]")]
    pub queue_capacity: Option<usize>,

    #[arg(long, help = "Lines per batch handed to a worker [default: 1000]")]
    pub batch_size: Option<usize>,

    #[arg(long, help = "Fail the run instead of skipping malformed lines")]
    pub strict: bool,

    #[arg(short, long, help = "Configuration file (TOML, JSON or YAML)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Show a progress spinner on stderr")]
    pub progress: bool,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, help = "Log file path")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            workers: self.workers,
            strategy: self.strategy,
            queue_capacity: self.queue_capacity,
            batch_size: self.batch_size,
            malformed: self.strict.then_some(MalformedPolicy::Strict),
        }
    }
}
