//! Script replay over a multi-threaded runtime
//!
//! This module drives the marketplace from a CSV script of commands and
//! writes the final wallet balances as CSV.
//!
//! # Architecture
//!
//! ```text
//! Replay
//!     ├── ReplayConfig (batch_size, worker_threads)
//!     ├── AsyncReader (batched script reading)
//!     ├── Marketplace (shared store, units of work)
//!     └── NotificationWorker (spawned task draining notifications)
//! ```
//!
//! Commands run strictly in file order because later lines refer to ids
//! assigned by earlier ones. A command that fails is logged and skipped;
//! only I/O problems stop the replay.

use crate::core::{Marketplace, NotificationSink, TracingSink};
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_wallets_csv;
use crate::store::Store;
use crate::types::MarketplaceError;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Configuration for script replay
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Number of script lines read per batch
    pub batch_size: usize,
    /// Worker threads of the tokio runtime
    pub worker_threads: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            worker_threads: num_cpus::get(),
        }
    }
}

impl ReplayConfig {
    /// Create a ReplayConfig, replacing zero values with the defaults
    pub fn new(batch_size: usize, worker_threads: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                default = default.batch_size,
                "invalid batch size 0, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let worker_threads = if worker_threads == 0 {
            warn!(
                default = default.worker_threads,
                "invalid worker thread count 0, using default"
            );
            default.worker_threads
        } else {
            worker_threads
        };

        Self {
            batch_size,
            worker_threads,
        }
    }
}

/// Counters reported once a replay finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Commands that committed
    pub executed: usize,
    /// Commands the marketplace refused
    pub failed: usize,
    /// Script lines that could not be parsed into a command
    pub skipped: usize,
    /// Notifications handed to the sink
    pub notifications: usize,
}

/// Replays a command script against a fresh marketplace
pub struct Replay {
    config: ReplayConfig,
    store: Arc<Store>,
    sink: Arc<dyn NotificationSink>,
}

impl Replay {
    /// Replay against an empty store on the system clock
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            config,
            store: Arc::new(Store::new()),
            sink: Arc::new(TracingSink),
        }
    }

    /// Replay against the given store, e.g. one with a fixed clock
    pub fn with_store(mut self, store: Arc<Store>) -> Self {
        self.store = store;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run the script at `input_path` and write wallets to `output`
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::FileNotFound` if the script does not exist
    /// * `MarketplaceError::IoError` if the runtime cannot start or the file
    ///   cannot be read or the output cannot be written
    pub fn run(
        &self,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ReplaySummary, MarketplaceError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads)
            .build()
            .map_err(|e| MarketplaceError::IoError {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(self.replay(input_path, output))
    }

    async fn replay(
        &self,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ReplaySummary, MarketplaceError> {
        let file = tokio::fs::File::open(input_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MarketplaceError::FileNotFound {
                    path: input_path.display().to_string(),
                }
            } else {
                MarketplaceError::IoError {
                    message: format!("Failed to open '{}': {}", input_path.display(), e),
                }
            }
        })?;
        let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
        let mut reader = AsyncReader::new(compat_file);

        let (marketplace, worker) =
            Marketplace::with_sink(Arc::clone(&self.store), Arc::clone(&self.sink));
        let delivery = tokio::spawn(worker.run());

        let mut summary = ReplaySummary::default();
        loop {
            let batch = reader.read_batch(self.config.batch_size).await;
            if batch.is_empty() {
                break;
            }

            for line in batch {
                let op = line.command.name();
                match marketplace.execute(line.command).await {
                    Ok(_) => summary.executed += 1,
                    Err(e) => {
                        summary.failed += 1;
                        warn!(line = line.line, op, error = %e, "command failed");
                    }
                }
            }
        }
        summary.skipped = reader.skipped();

        let wallets = marketplace.wallets();
        // Closes the notification channel so the worker can finish
        drop(marketplace);
        summary.notifications = delivery.await.map_err(|e| MarketplaceError::IoError {
            message: format!("Notification worker failed: {}", e),
        })?;

        write_wallets_csv(&wallets, output)?;
        info!(
            executed = summary.executed,
            failed = summary.failed,
            skipped = summary.skipped,
            "replay finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    const HEADER: &str = "op,actor,ride,booking,seats,amount,departure,origin,destination\n";

    #[rstest]
    #[case::defaults(0, 0, 1000, num_cpus::get())]
    #[case::custom(50, 2, 50, 2)]
    #[case::zero_batch(0, 3, 1000, 3)]
    fn test_replay_config(
        #[case] batch_size: usize,
        #[case] worker_threads: usize,
        #[case] expected_batch: usize,
        #[case] expected_threads: usize,
    ) {
        let config = ReplayConfig::new(batch_size, worker_threads);
        assert_eq!(config.batch_size, expected_batch);
        assert_eq!(config.worker_threads, expected_threads);
    }

    #[test]
    fn test_replay_booking_across_batches() {
        let script = format!(
            "{}register,1,,,,,,,\n\
             register,2,,,,,,,\n\
             deposit,2,,,,100,,,\n\
             publish,1,,,3,10,2099-01-01T08:00:00Z,Lyon,Grenoble\n\
             request,2,1,,2,,,,\n\
             accept,1,,1,,,,,\n",
            HEADER
        );
        let file = create_temp_csv(&script);
        let mut output = Vec::new();

        let summary = Replay::new(ReplayConfig::new(2, 2))
            .run(file.path(), &mut output)
            .unwrap();

        assert_eq!(summary.executed, 6);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.notifications, 2);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "user,available,blocked,total\n1,20.00,0.00,20.00\n2,80.00,0.00,80.00\n"
        );
    }

    #[test]
    fn test_replay_counts_failures_and_skips() {
        let script = format!(
            "{}register,1,,,,,,,\n\
             withdraw,1,,,,5,,,\n\
             jump,1,,,,,,,\n",
            HEADER
        );
        let file = create_temp_csv(&script);
        let mut output = Vec::new();

        let summary = Replay::new(ReplayConfig::default())
            .run(file.path(), &mut output)
            .unwrap();

        assert_eq!(summary.executed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "user,available,blocked,total\n"
        );
    }

    #[test]
    fn test_replay_missing_file() {
        let mut output = Vec::new();
        let result = Replay::new(ReplayConfig::default()).run(Path::new("nonexistent.csv"), &mut output);

        assert_eq!(
            result,
            Err(MarketplaceError::FileNotFound {
                path: "nonexistent.csv".to_string()
            })
        );
    }
}
