//! Processing strategy module for ledger feed replay
//!
//! This module defines the Strategy pattern for complete processing pipelines,
//! covering both CSV parsing and ledger command processing. Different
//! implementations (synchronous, asynchronous batch) can be selected at
//! runtime.

use crate::cli::StrategyType;
use crate::core::conversion::RateTable;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete ledger pipelines
///
/// Each strategy reads ledger commands from a CSV file, applies them to a
/// fresh ledger, and writes the final enrollment states to output.
pub trait ProcessingStrategy: Send + Sync {
    /// Process commands from the input file and write the ledger to output
    ///
    /// # Arguments
    ///
    /// * `input_path` - Path to the input CSV file containing ledger commands
    /// * `output` - Writer receiving the enrollment ledger CSV
    ///
    /// # Returns
    ///
    /// * `Ok(())` if processing completed (rejected commands included)
    /// * `Err(String)` if a fatal error occurred
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file cannot be opened
    /// - The async runtime cannot be started
    /// - Output cannot be written
    ///
    /// Malformed rows and rejected commands are logged and skipped; they
    /// never abort processing.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - The type of processing strategy to create (Sync or Async)
/// * `config` - Optional configuration for async batch processing (ignored for sync)
/// * `rates` - Exchange rates shared by every ledger the strategy builds
///
/// # Returns
///
/// A boxed trait object implementing the ProcessingStrategy trait
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
    rates: Arc<RateTable>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(rates)),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(config, rates))
        }
    }
}
