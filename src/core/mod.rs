//! Core business logic module
//!
//! This module contains the ledger components:
//! - `traits` - Seams for storage, exchange rates, catalog lookup and notifications
//! - `conversion` - Currency conversion table
//! - `validator` - Payment request validation
//! - `balance` - Pure balance computation and ledger replay
//! - `transaction` - Staged writes for one enrollment
//! - `guard` - Payment reference uniqueness
//! - `store` - In-memory, concurrency-safe ledger store
//! - `recorder` - Enrollment and payment recording
//! - `engine` - Ledger command dispatch
//! - `batch_processor` - Partitioned concurrent batch processing

pub mod balance;
pub mod batch_processor;
pub mod conversion;
pub mod engine;
pub mod guard;
pub mod recorder;
pub mod store;
pub mod traits;
pub mod transaction;
pub mod validator;

pub use balance::{apply_payment, replay_paid_amount, BalanceUpdate};
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use conversion::{Conversion, RateTable};
pub use engine::{CommandOutcome, LedgerEngine};
pub use guard::{ReferenceIndex, ReferenceReservation};
pub use recorder::{PaymentRecorder, Reconciliation};
pub use store::{FailPoint, InMemoryLedgerStore};
pub use traits::{CourseCatalog, LedgerStore, NoopObserver, PaymentObserver, RateSource};
pub use transaction::{LedgerTransaction, StagedWrites};
pub use validator::validate_payment;
