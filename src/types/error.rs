//! Error types for the course payment ledger
//!
//! Every rejection the ledger can produce is a variant of [`LedgerError`].
//! Callers branch on [`LedgerError::kind`] or the stable
//! [`LedgerError::reason_code`] string rather than on the display text,
//! which exists for logs and diagnostics only.
//!
//! # Error Categories
//!
//! - **Lookup errors**: unknown enrollment, course or payment reference
//! - **Request errors**: non-positive amounts, unsupported currencies, bad payer details
//! - **Business rule errors**: already settled, overpayment, duplicate reference
//! - **Storage errors**: the transaction could not commit (always safe to retry)

use super::currency::Currency;
use super::enrollment::{CourseId, EnrollmentId, StudentId};
use super::payment::{PaymentReference, PaymentStatus};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Why an amount or currency was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountRejection {
    /// Payment amount is zero or negative
    #[error("amount {amount} must be greater than 0")]
    NotPositive { amount: Decimal },

    /// Expected total is negative
    #[error("amount {amount} must not be negative")]
    Negative { amount: Decimal },

    /// Converted amount rounds to zero in the settlement currency
    #[error("amount {amount} rounds to 0.00 {currency}")]
    RoundsToZero { amount: Decimal, currency: Currency },

    /// Currency code is unknown or missing from the rate table
    #[error("currency '{code}' is not supported")]
    UnsupportedCurrency { code: String },
}

/// Stable classification of ledger errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    InvalidAmount,
    InvalidPaymentDetails,
    AlreadySettled,
    BalanceExceeded,
    DuplicateReference,
    AlreadyEnrolled,
    InvalidPaymentState,
    TransactionFailure,
}

impl ErrorKind {
    /// Machine-checkable reason code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::InvalidPaymentDetails => "invalid_payment_details",
            ErrorKind::AlreadySettled => "already_settled",
            ErrorKind::BalanceExceeded => "balance_exceeded",
            ErrorKind::DuplicateReference => "duplicate_reference",
            ErrorKind::AlreadyEnrolled => "already_enrolled",
            ErrorKind::InvalidPaymentState => "invalid_payment_state",
            ErrorKind::TransactionFailure => "transaction_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the ledger
///
/// All variants except [`LedgerError::TransactionFailure`] are expected,
/// recoverable outcomes of a request and leave the ledger untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// No enrollment with this id
    #[error("Enrollment {enrollment} not found")]
    EnrollmentNotFound { enrollment: EnrollmentId },

    /// No enrollment for this student and course
    #[error("Student '{student}' is not enrolled in course '{course}'")]
    NotEnrolled { student: StudentId, course: CourseId },

    /// Course is unknown to the catalog
    #[error("Course '{course}' not found")]
    CourseNotFound { course: CourseId },

    /// No payment entry with this reference
    #[error("Payment '{reference}' not found")]
    PaymentNotFound { reference: PaymentReference },

    /// Submitting identity does not own the enrollment
    #[error("Student '{student}' is not authorized to pay for enrollment {enrollment}")]
    Unauthorized {
        enrollment: EnrollmentId,
        student: StudentId,
    },

    /// Amount or currency rejected
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: AmountRejection },

    /// Payer details are missing or malformed
    #[error("Invalid payment details: {field} {message}")]
    InvalidPaymentDetails { field: String, message: String },

    /// Rate table contains a non-positive rate
    #[error("Invalid exchange rate {rate} for {currency}")]
    InvalidRate { currency: Currency, rate: Decimal },

    /// Enrollment is fully paid and a completed payment was attempted
    #[error("Enrollment {enrollment} is already fully paid")]
    AlreadySettled { enrollment: EnrollmentId },

    /// Converted amount exceeds the remaining balance
    #[error("Payment of {requested} {currency} exceeds remaining balance {remaining} {currency} for enrollment {enrollment}")]
    BalanceExceeded {
        enrollment: EnrollmentId,
        remaining: Decimal,
        requested: Decimal,
        currency: Currency,
    },

    /// Reference was already recorded
    #[error("Payment reference '{reference}' has already been recorded")]
    DuplicateReference { reference: PaymentReference },

    /// Student already holds an enrollment for this course
    #[error("Student '{student}' is already enrolled in course '{course}'")]
    AlreadyEnrolled { student: StudentId, course: CourseId },

    /// Entry is not in a state that allows the requested transition
    #[error("Payment '{reference}' is {status}, expected PENDING")]
    InvalidPaymentState {
        reference: PaymentReference,
        status: PaymentStatus,
    },

    /// Arithmetic overflow in a balance or conversion calculation
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow { operation: String },

    /// Storage could not commit; nothing was written
    #[error("Transaction failed: {message}")]
    TransactionFailure { message: String },
}

impl LedgerError {
    /// Stable classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::EnrollmentNotFound { .. }
            | LedgerError::NotEnrolled { .. }
            | LedgerError::CourseNotFound { .. }
            | LedgerError::PaymentNotFound { .. } => ErrorKind::NotFound,
            LedgerError::Unauthorized { .. } => ErrorKind::Unauthorized,
            LedgerError::InvalidAmount { .. }
            | LedgerError::InvalidRate { .. }
            | LedgerError::ArithmeticOverflow { .. } => ErrorKind::InvalidAmount,
            LedgerError::InvalidPaymentDetails { .. } => ErrorKind::InvalidPaymentDetails,
            LedgerError::AlreadySettled { .. } => ErrorKind::AlreadySettled,
            LedgerError::BalanceExceeded { .. } => ErrorKind::BalanceExceeded,
            LedgerError::DuplicateReference { .. } => ErrorKind::DuplicateReference,
            LedgerError::AlreadyEnrolled { .. } => ErrorKind::AlreadyEnrolled,
            LedgerError::InvalidPaymentState { .. } => ErrorKind::InvalidPaymentState,
            LedgerError::TransactionFailure { .. } => ErrorKind::TransactionFailure,
        }
    }

    /// Machine-checkable reason code for UI layers
    pub fn reason_code(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Whether resubmitting the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::TransactionFailure { .. })
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create an EnrollmentNotFound error
    pub fn enrollment_not_found(enrollment: EnrollmentId) -> Self {
        LedgerError::EnrollmentNotFound { enrollment }
    }

    /// Create a NotEnrolled error
    pub fn not_enrolled(student: &str, course: &str) -> Self {
        LedgerError::NotEnrolled {
            student: student.to_string(),
            course: course.to_string(),
        }
    }

    /// Create a PaymentNotFound error
    pub fn payment_not_found(reference: &str) -> Self {
        LedgerError::PaymentNotFound {
            reference: reference.to_string(),
        }
    }

    /// Create an Unauthorized error
    pub fn unauthorized(enrollment: EnrollmentId, student: &str) -> Self {
        LedgerError::Unauthorized {
            enrollment,
            student: student.to_string(),
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(reason: AmountRejection) -> Self {
        LedgerError::InvalidAmount { reason }
    }

    /// Create an InvalidPaymentDetails error
    pub fn invalid_payment_details(field: &str, message: &str) -> Self {
        LedgerError::InvalidPaymentDetails {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an UnsupportedCurrency error for a known code missing from a rate table
    pub fn unsupported_currency(currency: Currency) -> Self {
        LedgerError::invalid_amount(AmountRejection::UnsupportedCurrency {
            code: currency.code().to_string(),
        })
    }

    /// Create a BalanceExceeded error
    pub fn balance_exceeded(
        enrollment: EnrollmentId,
        remaining: Decimal,
        requested: Decimal,
        currency: Currency,
    ) -> Self {
        LedgerError::BalanceExceeded {
            enrollment,
            remaining,
            requested,
            currency,
        }
    }

    /// Create a DuplicateReference error
    pub fn duplicate_reference(reference: &str) -> Self {
        LedgerError::DuplicateReference {
            reference: reference.to_string(),
        }
    }

    /// Create an AlreadyEnrolled error
    pub fn already_enrolled(student: &str, course: &str) -> Self {
        LedgerError::AlreadyEnrolled {
            student: student.to_string(),
            course: course.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    /// Create a TransactionFailure error
    pub fn transaction_failure(message: impl Into<String>) -> Self {
        LedgerError::TransactionFailure {
            message: message.into(),
        }
    }
}
