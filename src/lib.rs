//! Course Payment Ledger Library
//! # Overview
//!
//! This library records student payments against course enrollments and keeps
//! each enrollment's running balance consistent with its payment ledger. It
//! ships with a streaming CSV replay tool that runs either a sync or an async
//! strategy.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Enrollment, PaymentEntry, LedgerError, etc.)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::conversion`] - Exchange rates and currency conversion
//!   - [`core::validator`] - Payment request validation
//!   - [`core::balance`] - Balance computation and ledger replay
//!   - [`core::store`] - Concurrency-safe in-memory ledger store
//!   - [`core::recorder`] - Enrollment creation and payment recording
//!   - [`core::engine`] - Ledger command dispatch
//! - [`io`] - CSV input, ledger output and rate files
//! - [`strategy`] - Sync and async processing pipelines
//! - [`logging`] - Tracing subscriber setup
//!
//! # Recording a Payment
//!
//! A payment is validated, converted into the enrollment's currency,
//! checked against the remaining balance, and committed together with the
//! enrollment update in one transaction. Either both writes are visible or
//! neither is.
//!
//! # Enrollment States
//!
//! Each enrollment maintains:
//! - `total_expected_payment`: Course price in the settlement currency
//! - `paid_amount`: Sum of settled payments, never above the total
//! - `balance()`: Remaining amount, never negative
//! - `status`: PENDING until fully paid, then ACTIVE

pub mod cli;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use core::{InMemoryLedgerStore, LedgerEngine, LedgerStore, PaymentRecorder, RateTable};
pub use io::write_enrollments_csv;
pub use types::{
    Currency, Enrollment, EnrollmentStatus, ErrorKind, LedgerCommand, LedgerError, PaymentEntry,
    PaymentMethod, PaymentRequest, PaymentResult, PaymentStatus,
};
