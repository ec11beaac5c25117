//! Asynchronous CSV reader with batch interface
//!
//! Provides a streaming interface over replay script lines from a CSV file.
//! Supports batch reading so the replay never holds the whole script in
//! memory.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of ScriptLines
//!                  ↓
//!           csv_format module
//!           (ScriptRecord, convert_script_record)
//! ```

use crate::io::csv_format::{convert_script_record, ScriptRecord};
use crate::types::Command;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// A converted command and the script line it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    pub line: u64,
    pub command: Command,
}

/// Asynchronous CSV reader
///
/// Lines that fail to parse or convert are logged and skipped.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    records_read: u64,
    skipped: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            records_read: 0,
            skipped: 0,
        }
    }

    /// Read up to `batch_size` commands
    ///
    /// Returns an empty vector at the end of the script.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<ScriptLine> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<ScriptRecord>();

        while batch.len() < batch_size {
            let Some(next) = records.next().await else {
                break;
            };
            // Line 1 is the header
            self.records_read += 1;
            let line = self.records_read + 1;

            match next {
                Ok(record) => match convert_script_record(record) {
                    Ok(command) => batch.push(ScriptLine { line, command }),
                    Err(e) => {
                        self.skipped += 1;
                        warn!(line, error = %e, "skipping script line");
                    }
                },
                Err(e) => {
                    self.skipped += 1;
                    warn!(line, error = %e, "CSV parse error");
                }
            }
        }

        batch
    }

    /// Lines skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DepositCommand, RequestBookingCommand};
    use futures::io::Cursor;
    use rust_decimal::Decimal;

    const HEADER: &str = "op,actor,ride,booking,seats,amount,departure,origin,destination\n";

    fn reader(body: &str) -> AsyncReader<Cursor<Vec<u8>>> {
        AsyncReader::new(Cursor::new(format!("{}{}", HEADER, body).into_bytes()))
    }

    #[tokio::test]
    async fn test_read_batches_in_order() {
        let mut reader = reader(
            "register,1,,,,,,,\n\
             register,2,,,,,,,\n\
             deposit,2,,,,50.00,,,\n",
        );

        let first = reader.read_batch(2).await;
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].line, 2);
        assert_eq!(first[1].line, 3);

        let second = reader.read_batch(2).await;
        assert_eq!(
            second,
            vec![ScriptLine {
                line: 4,
                command: Command::Deposit(DepositCommand {
                    user: 2,
                    amount: Decimal::new(5000, 2)
                })
            }]
        );

        assert!(reader.read_batch(2).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_script() {
        let mut reader = reader("");
        assert!(reader.read_batch(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_lines_are_skipped() {
        let mut reader = reader(
            "fly,1,,,,,,,\n\
             deposit,not-a-user,,,,5,,,\n\
             request,2,1,,2,,,,\n",
        );

        let batch = reader.read_batch(10).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch[0].command,
            Command::RequestBooking(RequestBookingCommand {
                ride: 1,
                passenger: 2,
                seats: 2
            })
        );
        assert_eq!(reader.skipped(), 2);
    }

    #[tokio::test]
    async fn test_whitespace_and_case() {
        let mut reader = reader("  DEPOSIT , 3 ,,,, 10 ,,,\n");

        let batch = reader.read_batch(10).await;
        assert_eq!(batch.len(), 1);
        assert!(matches!(
            batch[0].command,
            Command::Deposit(DepositCommand { user: 3, .. })
        ));
    }
}
