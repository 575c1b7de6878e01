//! Asynchronous batch processing strategy
//!
//! This module provides an asynchronous, multi-threaded implementation of the
//! ProcessingStrategy trait. Commands are read in batches and each batch is
//! partitioned by enrollment for parallel processing.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── BatchProcessor (enrollment partitioning + tokio tasks)
//!     └── LedgerEngine (shared behind Arc)
//!         └── InMemoryLedgerStore (DashMap per-enrollment locking)
//! ```
//!
//! # Ordering
//!
//! - Batches are processed one after another, so an enrollment whose
//!   commands span batches still sees them in file order
//! - Within a batch, each (student, course) partition runs as its own task
//! - Enrollments never share state, so partitions can run in parallel

use crate::core::conversion::RateTable;
use crate::core::{BatchProcessor, LedgerEngine};
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_enrollments_csv;
use crate::strategy::ProcessingStrategy;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Configuration for batch processing
///
/// Controls how commands are batched and the number of worker threads used
/// within each batch.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of commands per batch
    pub batch_size: usize,
    /// Number of runtime worker threads
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig with custom values
    ///
    /// Zero values fall back to the defaults with a warning.
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                "Invalid batch_size ({}), using default ({})",
                batch_size, default.batch_size
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                "Invalid max_concurrent_batches ({}), using default ({})",
                max_concurrent_batches, default.max_concurrent_batches
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch processing strategy
///
/// AsyncProcessingStrategy is Send + Sync; the ledger it builds is shared
/// across tokio tasks behind an `Arc`.
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
    rates: Arc<RateTable>,
}

impl AsyncProcessingStrategy {
    /// Create a new AsyncProcessingStrategy
    ///
    /// # Arguments
    ///
    /// * `config` - BatchConfig with batch_size and max_concurrent_batches
    /// * `rates` - Exchange rates used by the ledger
    pub fn new(config: BatchConfig, rates: Arc<RateTable>) -> Self {
        Self { config, rates }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    /// Replay the feed batch by batch
    ///
    /// 1. Build a tokio multi-threaded runtime
    /// 2. Read commands in batches with AsyncReader
    /// 3. Process each batch to completion before reading the next
    /// 4. Write the final enrollment states
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        runtime.block_on(async {
            let engine = Arc::new(LedgerEngine::new(Arc::clone(&self.rates)));
            let processor = BatchProcessor::new(Arc::clone(&engine));

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;

            // csv-async reads futures::io, tokio files need the compat layer
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut applied = 0usize;
            let mut rejected = 0usize;

            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                for result in processor.process_batch(batch).await {
                    if result.result.is_ok() {
                        applied += 1;
                    } else {
                        rejected += 1;
                    }
                }
            }

            info!(applied, rejected, "Ledger feed processed");

            write_enrollments_csv(&engine.enrollments(), output)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    const HEADER: &str = "type,student,course,amount,currency,method,reference,status\n";

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn run(config: BatchConfig, rows: &str) -> String {
        let file = create_temp_csv(&format!("{}{}", HEADER, rows));
        let strategy = AsyncProcessingStrategy::new(config, Arc::new(RateTable::default()));
        let mut output = Vec::new();
        strategy.process(file.path(), &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_async_strategy_records_payment() {
        let output = run(
            BatchConfig::default(),
            "enroll,alice,rust-101,1000,USD,,,\n\
             pay,alice,rust-101,400,USD,card,ref-1,\n",
        );

        assert!(output.contains("alice,rust-101,USD,1000.00,400.00,600.00,PENDING"));
    }

    #[test]
    fn test_async_strategy_processes_multiple_enrollments() {
        let output = run(
            BatchConfig::default(),
            "enroll,alice,rust-101,100,USD,,,\n\
             enroll,bob,go-101,15000,KES,,,\n\
             pay,bob,go-101,50,USD,card,b-1,\n\
             pay,alice,rust-101,100,USD,card,a-1,\n",
        );

        assert!(output.contains("alice,rust-101,USD,100.00,100.00,0.00,ACTIVE"));
        assert!(output.contains("bob,go-101,KES,15000.00,7500.00,7500.00,PENDING"));
    }

    #[test]
    fn test_async_strategy_handles_missing_file() {
        let strategy =
            AsyncProcessingStrategy::new(BatchConfig::default(), Arc::new(RateTable::default()));
        let mut output = Vec::new();

        let result = strategy.process(Path::new("nonexistent.csv"), &mut output);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Failed to open file"));
    }

    #[test]
    fn test_async_strategy_maintains_ordering_across_batches() {
        // alice's enroll, pending payment and confirmation land in different batches
        let output = run(
            BatchConfig::new(2, num_cpus::get()),
            "enroll,alice,rust-101,100,USD,,,\n\
             enroll,bob,rust-101,50,USD,,,\n\
             pay,alice,rust-101,30,USD,cash,stk-1,pending\n\
             pay,bob,rust-101,25,USD,cash,b-1,\n\
             confirm,alice,rust-101,,,,stk-1,\n\
             pay,alice,rust-101,70,USD,cash,a-2,\n",
        );

        let alice = output
            .lines()
            .find(|line| line.starts_with("alice,"))
            .unwrap();
        assert_eq!(alice, "alice,rust-101,USD,100.00,100.00,0.00,ACTIVE");

        let bob = output.lines().find(|line| line.starts_with("bob,")).unwrap();
        assert_eq!(bob, "bob,rust-101,USD,50.00,25.00,25.00,PENDING");
    }

    #[test]
    fn test_batch_config_zero_values_fall_back() {
        let config = BatchConfig::new(0, 0);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.max_concurrent_batches, num_cpus::get());
    }
}
