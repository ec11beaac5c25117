//! Ride-Pool Engine CLI
//!
//! Command-line interface for replaying marketplace command scripts.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- script.csv > wallets.csv
//! cargo run -- --batch-size 500 --worker-threads 4 script.csv > wallets.csv
//! cargo run -- --log-level info script.csv > wallets.csv
//! ```
//!
//! The program reads commands from the input CSV script, executes them in
//! order against a fresh in-memory marketplace and prints the final wallet
//! balances to stdout. Logs go to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success (individual commands may still have failed and been logged)
//! - 1: Error (missing arguments, file not found, file not readable, etc.)

use ride_pool_engine::cli;
use ride_pool_engine::replay::Replay;
use std::process;
use tracing::error;

fn main() {
    let args = cli::parse_args();
    cli::init_logging(&args.log_level);

    let replay = Replay::new(args.to_replay_config());
    let mut output = std::io::stdout();
    if let Err(e) = replay.run(&args.input_file, &mut output) {
        error!(error = %e, "replay aborted");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
