//! Enrollment-related types for the course payment ledger
//!
//! An enrollment ties one student to one course and carries the amount the
//! student owes in the enrollment's settlement currency. The remaining
//! balance and the fully-paid flag are always derived from the stored
//! fields, never stored themselves.

use super::currency::Currency;
use super::error::{AmountRejection, LedgerError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Enrollment identifier
pub type EnrollmentId = Uuid;

/// Student identifier, as issued by the authentication layer
pub type StudentId = String;

/// Course identifier, as issued by the catalog
pub type CourseId = String;

/// Enrollment lifecycle states
///
/// The ledger itself only performs the PENDING → ACTIVE transition. The
/// remaining states are reached through flows owned by other parts of the
/// platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    /// Created, awaiting full payment
    Pending,

    /// Fully paid; course access granted
    Active,

    /// Course finished
    Completed,

    /// Cancelled by the student or an administrator
    Cancelled,

    /// Access window elapsed
    Expired,
}

impl EnrollmentStatus {
    /// Uppercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "PENDING",
            EnrollmentStatus::Active => "ACTIVE",
            EnrollmentStatus::Completed => "COMPLETED",
            EnrollmentStatus::Cancelled => "CANCELLED",
            EnrollmentStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(EnrollmentStatus::Pending),
            "ACTIVE" => Ok(EnrollmentStatus::Active),
            "COMPLETED" => Ok(EnrollmentStatus::Completed),
            "CANCELLED" => Ok(EnrollmentStatus::Cancelled),
            "EXPIRED" => Ok(EnrollmentStatus::Expired),
            other => Err(format!("Unknown enrollment status '{}'", other)),
        }
    }
}

/// A student's enrollment in a course
#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    /// Generated enrollment identifier
    pub id: EnrollmentId,

    /// Owning student
    pub student: StudentId,

    /// Course the student enrolled in
    pub course: CourseId,

    /// Amount owed in the settlement currency
    pub total_expected_payment: Decimal,

    /// Cumulative completed payments in the settlement currency
    ///
    /// Never exceeds `total_expected_payment`. Only the payment recording
    /// transaction writes this field.
    pub paid_amount: Decimal,

    /// Settlement currency, fixed at creation
    pub currency: Currency,

    /// Current lifecycle state
    pub status: EnrollmentStatus,

    /// When the enrollment was created
    pub enrolled_at: DateTime<Utc>,

    /// When the enrollment was last written
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    /// Create a new PENDING enrollment with nothing paid
    pub fn new(
        student: impl Into<StudentId>,
        course: impl Into<CourseId>,
        total_expected_payment: Decimal,
        currency: Currency,
    ) -> Self {
        let now = Utc::now();
        Enrollment {
            id: Uuid::new_v4(),
            student: student.into(),
            course: course.into(),
            total_expected_payment,
            paid_amount: Decimal::ZERO,
            currency,
            status: EnrollmentStatus::Pending,
            enrolled_at: now,
            updated_at: now,
        }
    }

    /// Remaining amount owed in the settlement currency
    pub fn balance(&self) -> Decimal {
        self.total_expected_payment - self.paid_amount
    }

    /// Whether the cumulative payments cover the expected total
    pub fn is_fully_paid(&self) -> bool {
        self.paid_amount >= self.total_expected_payment
    }
}

/// Enrollment creation request
#[derive(Debug, Clone, PartialEq)]
pub struct NewEnrollment {
    /// Course to enroll in
    pub course: CourseId,

    /// Amount the student will owe
    pub total_expected_payment: Decimal,

    /// Settlement currency for every payment against this enrollment
    pub currency: Currency,
}

impl NewEnrollment {
    /// Check the request's own fields
    ///
    /// Course existence, currency support and uniqueness are checked by the
    /// recorder, which has access to the catalog, rate table and store.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.total_expected_payment < Decimal::ZERO {
            return Err(LedgerError::invalid_amount(AmountRejection::Negative {
                amount: self.total_expected_payment,
            }));
        }
        Ok(())
    }
}
