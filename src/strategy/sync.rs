//! Synchronous processing strategy
//!
//! This module provides a synchronous, single-threaded implementation of the
//! ProcessingStrategy trait. It coordinates the SyncReader (CSV input) and the
//! LedgerEngine (business rules).
//!
//! # Design
//!
//! The SyncProcessingStrategy focuses on orchestration, delegating:
//! - CSV parsing to `SyncReader` (iterator interface)
//! - Command processing to `LedgerEngine`
//! - CSV output to `csv_format::write_enrollments_csv`
//!
//! Rows are streamed one at a time. Memory grows with the number of
//! enrollments and payment entries, not with the size of the feed.

use crate::core::conversion::RateTable;
use crate::core::LedgerEngine;
use crate::io::csv_format::write_enrollments_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::ProcessingStrategy;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use course_payment_ledger::core::RateTable;
/// use course_payment_ledger::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// let strategy = SyncProcessingStrategy::new(Arc::new(RateTable::default()));
/// let mut output = std::io::stdout();
///
/// strategy.process(Path::new("ledger.csv"), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone)]
pub struct SyncProcessingStrategy {
    rates: Arc<RateTable>,
}

impl SyncProcessingStrategy {
    /// Create a strategy converting payments with `rates`
    pub fn new(rates: Arc<RateTable>) -> Self {
        Self { rates }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    /// Replay the feed through a fresh ledger
    ///
    /// 1. Stream command rows with a SyncReader
    /// 2. Apply each command to a LedgerEngine in file order
    /// 3. Write the final enrollment states
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let engine = LedgerEngine::new(Arc::clone(&self.rates));
        let reader = SyncReader::new(input_path)?;

        let mut applied = 0usize;
        let mut rejected = 0usize;

        for result in reader {
            match result {
                Ok(command) => {
                    let student = command.student.clone();
                    let course = command.course.clone();
                    match engine.process(command) {
                        Ok(_) => applied += 1,
                        Err(e) => {
                            rejected += 1;
                            debug!(
                                %student,
                                %course,
                                reason = e.reason_code(),
                                "Command rejected: {}",
                                e
                            );
                        }
                    }
                }
                Err(e) => {
                    rejected += 1;
                    warn!("Skipping malformed row: {}", e);
                }
            }
        }

        info!(applied, rejected, "Ledger feed processed");

        write_enrollments_csv(&engine.enrollments(), output)
    }
}
