//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `currency`: Supported currency codes
//! - `enrollment`: Enrollment state, status and creation requests
//! - `payment`: Payment requests, ledger entries and results
//! - `command`: Ledger commands replayed by the batch tool
//! - `error`: Error types for the ledger

pub mod command;
pub mod currency;
pub mod enrollment;
pub mod error;
pub mod payment;

pub use command::{CommandType, LedgerAction, LedgerCommand};
pub use currency::Currency;
pub use enrollment::{
    CourseId, Enrollment, EnrollmentId, EnrollmentStatus, NewEnrollment, StudentId,
};
pub use error::{AmountRejection, ErrorKind, LedgerError};
pub use payment::{
    PaymentEntry, PaymentId, PaymentMethod, PaymentReference, PaymentRequest, PaymentResult,
    PaymentStatus,
};
