//! Batch processing with enrollment-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which processes a batch
//! of ledger commands concurrently while keeping the commands of each
//! enrollment in feed order.
//!
//! # Design
//!
//! A batch is partitioned by (student, course). Payment references are unique
//! across the whole ledger, so enrollments whose commands share a reference
//! are merged into one partition. Each partition runs as its own tokio task
//! and applies its commands in feed order; different partitions run in
//! parallel. The outcome of a batch therefore matches a sequential replay.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     └── Arc<LedgerEngine>  (shared command engine)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::engine::{CommandOutcome, LedgerEngine};
use crate::types::{CourseId, LedgerCommand, LedgerError, PaymentReference, StudentId};
use tracing::{debug, error};

/// Result of processing a single command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The command that was processed
    pub command: LedgerCommand,

    /// The result of processing (success or error)
    pub result: Result<CommandOutcome, LedgerError>,
}

/// Batch processor with enrollment-based partitioning
#[derive(Clone)]
pub struct BatchProcessor {
    /// Thread-safe command engine shared across tasks
    engine: Arc<LedgerEngine>,
}

impl BatchProcessor {
    /// Create a new BatchProcessor
    ///
    /// # Arguments
    ///
    /// * `engine` - Arc-wrapped LedgerEngine shared by every partition task
    pub fn new(engine: Arc<LedgerEngine>) -> Self {
        Self { engine }
    }

    /// Partition a batch of commands by enrollment key
    ///
    /// Enrollments that touch a common payment reference land in the same
    /// partition.
    ///
    /// # Guarantees
    ///
    /// - Each command appears in exactly one partition
    /// - Commands in a partition keep their original order
    /// - All commands of an enrollment share a partition
    /// - All commands carrying a given reference share a partition
    pub fn partition_by_enrollment(&self, batch: Vec<LedgerCommand>) -> Vec<Vec<LedgerCommand>> {
        let mut groups = PartitionGroups::default();
        let slots: Vec<usize> = batch.iter().map(|command| groups.assign(command)).collect();

        let mut partitions: HashMap<usize, Vec<LedgerCommand>> = HashMap::new();
        for (slot, command) in slots.into_iter().zip(batch) {
            partitions
                .entry(groups.find(slot))
                .or_default()
                .push(command);
        }

        partitions.into_values().collect()
    }

    /// Process all commands for one enrollment in order
    ///
    /// Errors are captured in the results and do not stop processing.
    pub async fn process_enrollment_commands(
        &self,
        commands: Vec<LedgerCommand>,
    ) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(commands.len());

        for command in commands {
            let result = self.engine.process(command.clone());
            if let Err(e) = &result {
                debug!(
                    student = %command.student,
                    course = %command.course,
                    reason = e.reason_code(),
                    "Command rejected: {}",
                    e
                );
            }
            results.push(ProcessingResult { command, result });
        }

        results
    }

    /// Process a batch of commands with enrollment-based partitioning
    ///
    /// 1. Partition the batch by (student, course) and shared references
    /// 2. Spawn one tokio task per partition
    /// 3. Wait for every task and collect the results
    ///
    /// Results are grouped by partition; their order across partitions is
    /// unspecified.
    pub async fn process_batch(&self, batch: Vec<LedgerCommand>) -> Vec<ProcessingResult> {
        let partitions = self.partition_by_enrollment(batch);

        let mut tasks = Vec::with_capacity(partitions.len());
        for commands in partitions {
            let processor = self.clone();
            tasks.push(tokio::spawn(async move {
                processor.process_enrollment_commands(commands).await
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(partition_results) => results.extend(partition_results),
                Err(e) => error!("Partition task panicked: {:?}", e),
            }
        }

        results
    }
}

/// Disjoint sets of enrollment keys, joined by shared payment references
#[derive(Debug, Default)]
struct PartitionGroups {
    parents: Vec<usize>,
    enrollments: HashMap<(StudentId, CourseId), usize>,
    references: HashMap<PaymentReference, usize>,
}

impl PartitionGroups {
    /// Slot of the command's enrollment, linked to any earlier user of its reference
    fn assign(&mut self, command: &LedgerCommand) -> usize {
        let next = self.parents.len();
        let slot = *self
            .enrollments
            .entry(command.enrollment_key())
            .or_insert(next);
        if slot == next {
            self.parents.push(next);
        }

        if let Some(reference) = command.action.reference() {
            match self.references.get(reference) {
                Some(&other) => self.union(slot, other),
                None => {
                    self.references.insert(reference.to_string(), slot);
                }
            }
        }

        slot
    }

    fn find(&mut self, mut slot: usize) -> usize {
        while self.parents[slot] != slot {
            self.parents[slot] = self.parents[self.parents[slot]];
            slot = self.parents[slot];
        }
        slot
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            self.parents[a.max(b)] = a.min(b);
        }
    }
}
