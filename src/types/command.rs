//! Ledger commands replayed by the batch tool
//!
//! A command is one row of a ledger feed: an enrollment being opened, a
//! payment being submitted, or a provider callback settling a pending
//! payment. Every command names the student and course it belongs to so a
//! feed can be partitioned per enrollment.

use super::currency::Currency;
use super::enrollment::{CourseId, StudentId};
use super::payment::{PaymentMethod, PaymentReference, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Command types understood by the ledger engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    /// Open an enrollment for the student and course
    Enroll,

    /// Submit a payment against the student's enrollment
    Pay,

    /// Provider confirmed a pending payment
    Confirm,

    /// Provider reported a pending payment as failed
    Fail,
}

/// Typed payload of a ledger command
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerAction {
    Enroll {
        total_expected_payment: Decimal,
        currency: Currency,
    },
    Pay {
        amount: Decimal,
        currency: Currency,
        method: PaymentMethod,
        reference: PaymentReference,
        status: PaymentStatus,
        phone_number: Option<String>,
        card_last4: Option<String>,
    },
    Confirm {
        reference: PaymentReference,
    },
    Fail {
        reference: PaymentReference,
    },
}

impl LedgerAction {
    /// Command type of this action
    pub fn command_type(&self) -> CommandType {
        match self {
            LedgerAction::Enroll { .. } => CommandType::Enroll,
            LedgerAction::Pay { .. } => CommandType::Pay,
            LedgerAction::Confirm { .. } => CommandType::Confirm,
            LedgerAction::Fail { .. } => CommandType::Fail,
        }
    }

    /// Payment reference the action touches, if any
    pub fn reference(&self) -> Option<&str> {
        match self {
            LedgerAction::Enroll { .. } => None,
            LedgerAction::Pay { reference, .. }
            | LedgerAction::Confirm { reference }
            | LedgerAction::Fail { reference } => Some(reference),
        }
    }
}

/// One ledger command, scoped to a (student, course) pair
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerCommand {
    /// Student the command acts for; also the submitting identity for payments
    pub student: StudentId,

    /// Course whose enrollment the command targets
    pub course: CourseId,

    /// What to do
    pub action: LedgerAction,
}

impl LedgerCommand {
    /// Partition key: commands sharing it must be applied in order
    pub fn enrollment_key(&self) -> (StudentId, CourseId) {
        (self.student.clone(), self.course.clone())
    }
}
