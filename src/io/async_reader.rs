//! Asynchronous CSV reader with batch interface
//!
//! Provides batch reading of ledger commands from an async byte source.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of LedgerCommands
//!                  ↓
//!           csv_format module
//!           (CsvRecord, convert_csv_record)
//! ```
//!
//! Rows that fail to parse are logged and skipped; they never end a batch
//! early.

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::LedgerCommand;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Batch reader over an async CSV source
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Wrap an async byte source
    ///
    /// Uses the same trimming and flexible row length as the sync reader.
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 0,
        }
    }

    /// Read up to `batch_size` valid commands
    ///
    /// # Returns
    ///
    /// The commands in file order. An empty batch means end of input.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<LedgerCommand> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CsvRecord>();

        while batch.len() < batch_size {
            let Some(row) = records.next().await else {
                break;
            };
            self.line_num += 1;
            let line = self.line_num + 1;

            match row {
                Ok(csv_record) => match convert_csv_record(csv_record) {
                    Ok(command) => batch.push(command),
                    Err(e) => warn!(line, "Skipping malformed row: {}", e),
                },
                Err(e) => warn!(line, "CSV parse error: {}", e),
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommandType, LedgerAction};
    use futures::io::Cursor;
    use rust_decimal_macros::dec;

    const HEADER: &str = "type,student,course,amount,currency,method,reference,status\n";

    fn reader(rows: &str) -> AsyncReader<Cursor<Vec<u8>>> {
        AsyncReader::new(Cursor::new(format!("{}{}", HEADER, rows).into_bytes()))
    }

    #[tokio::test]
    async fn test_async_reader_read_batch() {
        let mut async_reader = reader(
            "enroll,alice,rust-101,1000,USD,,,\n\
             pay,alice,rust-101,400,USD,card,ref-1,\n\
             enroll,bob,rust-101,500,EUR,,,\n",
        );

        let batch = async_reader.read_batch(2).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].action.command_type(), CommandType::Enroll);
        assert_eq!(batch[1].action.command_type(), CommandType::Pay);

        let batch = async_reader.read_batch(2).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].student, "bob");

        assert!(async_reader.read_batch(2).await.is_empty());
    }

    #[tokio::test]
    async fn test_async_reader_empty_csv() {
        let mut async_reader = reader("");
        assert!(async_reader.read_batch(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_async_reader_skips_invalid_record() {
        let mut async_reader = reader(
            "refund,alice,rust-101,10,USD,,,\n\
             pay,alice,rust-101,50,USD,cash,ref-2,pending\n",
        );

        let batch = async_reader.read_batch(10).await;
        assert_eq!(batch.len(), 1);
        match &batch[0].action {
            LedgerAction::Pay { amount, reference, .. } => {
                assert_eq!(*amount, dec!(50));
                assert_eq!(reference, "ref-2");
            }
            other => panic!("expected pay, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_async_reader_invalid_rows_do_not_shorten_batch() {
        let mut async_reader = reader(
            "enroll,alice,rust-101,1000,USD,,,\n\
             pay,alice,rust-101,oops,USD,card,ref-1,\n\
             pay,alice,rust-101,10,USD,card,ref-2,\n\
             pay,alice,rust-101,20,USD,card,ref-3,\n",
        );

        let batch = async_reader.read_batch(2).await;
        assert_eq!(batch.len(), 2);

        let batch = async_reader.read_batch(2).await;
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_async_reader_whitespace_handling() {
        let mut async_reader = reader("  confirm , alice , rust-101 ,,,, stk-1 ,\n");

        let batch = async_reader.read_batch(10).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].student, "alice");
        assert_eq!(
            batch[0].action,
            LedgerAction::Confirm {
                reference: "stk-1".to_string()
            }
        );
    }
}
