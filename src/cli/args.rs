use crate::replay::ReplayConfig;
use clap::Parser;
use std::path::PathBuf;

/// Replay a ride-pool marketplace script and print final wallet balances
#[derive(Parser, Debug)]
#[command(name = "ride-pool-engine")]
#[command(about = "Replay a ride-pool marketplace script and print wallet balances", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing marketplace commands
    #[arg(value_name = "INPUT", help = "Path to the input CSV script")]
    pub input_file: PathBuf,

    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of script lines read per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    #[arg(
        long = "worker-threads",
        value_name = "COUNT",
        help = "Worker threads of the async runtime (default: CPU cores)"
    )]
    pub worker_threads: Option<usize>,

    /// Log filter used when RUST_LOG is not set
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        default_value = "warn",
        help = "Log level or filter directive written to stderr (default: warn)"
    )]
    pub log_level: String,
}

impl CliArgs {
    /// Create a ReplayConfig from CLI arguments
    ///
    /// Missing values take the defaults; zero values fall back to the defaults
    /// with a warning.
    pub fn to_replay_config(&self) -> ReplayConfig {
        if self.batch_size.is_none() && self.worker_threads.is_none() {
            return ReplayConfig::default();
        }
        let default = ReplayConfig::default();
        ReplayConfig::new(
            self.batch_size.unwrap_or(default.batch_size),
            self.worker_threads.unwrap_or(default.worker_threads),
        )
    }
}
