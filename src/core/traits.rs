//! Core traits for storage, exchange rates, course lookup and notifications
//!
//! These traits are the seams between the ledger core and its collaborators.
//! The crate ships one implementation of each; a database-backed store or a
//! live rate provider plugs in by implementing the same trait.

use crate::core::conversion::{self, Conversion};
use crate::core::transaction::LedgerTransaction;
use crate::types::{
    CourseId, Currency, Enrollment, EnrollmentId, LedgerError, PaymentEntry,
};
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Trait for persisting enrollments and payment entries
///
/// All balance mutations go through [`LedgerStore::transaction`], which gives
/// the closure exclusive access to one enrollment and commits the writes it
/// staged only if the closure returns `Ok`.
pub trait LedgerStore: Send + Sync {
    /// Store a new enrollment, rejecting a second one for the same student and course
    fn insert_enrollment(&self, enrollment: Enrollment) -> Result<(), LedgerError>;

    /// Get an enrollment by ID
    fn enrollment(&self, id: EnrollmentId) -> Option<Enrollment>;

    /// Get the enrollment a student holds for a course
    fn find_enrollment(&self, student: &str, course: &str) -> Option<Enrollment>;

    /// Get all enrollments for output
    fn enrollments(&self) -> Vec<Enrollment>;

    /// Get a committed payment entry by reference
    fn payment(&self, reference: &str) -> Option<PaymentEntry>;

    /// Get an enrollment's committed payment entries in insertion order
    fn payments(&self, enrollment: EnrollmentId) -> Vec<PaymentEntry>;

    /// Check whether a reference has been committed
    fn contains_reference(&self, reference: &str) -> bool;

    /// Run `f` with exclusive access to one enrollment
    ///
    /// Writes staged on the transaction are committed together when `f`
    /// returns `Ok`, and discarded when it returns `Err` or the commit fails.
    fn transaction<T, F>(&self, enrollment: EnrollmentId, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut LedgerTransaction<'_>) -> Result<T, LedgerError>;
}

/// Trait for exchange-rate lookup
///
/// Rates are expressed against a common base currency. Only `rate` is
/// required; conversion is derived from it.
pub trait RateSource: Send + Sync {
    /// Rate of `currency` relative to the base, if known
    fn rate(&self, currency: Currency) -> Option<Decimal>;

    /// Whether the source can convert to and from `currency`
    fn supports(&self, currency: Currency) -> bool {
        self.rate(currency).is_some()
    }

    /// Rate applied when converting `from` into `to`
    fn rate_between(&self, from: Currency, to: Currency) -> Result<Decimal, LedgerError> {
        conversion::rate_between(self, from, to)
    }

    /// Convert `amount` from one currency into another
    fn convert(
        &self,
        amount: Decimal,
        from: Currency,
        to: Currency,
    ) -> Result<Conversion, LedgerError> {
        conversion::convert(self, amount, from, to)
    }
}

/// Trait for checking courses against the catalog
pub trait CourseCatalog: Send + Sync {
    /// Whether the course exists
    fn course_exists(&self, course: &str) -> bool;
}

impl CourseCatalog for HashSet<CourseId> {
    fn course_exists(&self, course: &str) -> bool {
        self.contains(course)
    }
}

/// Trait for reacting to committed payments
///
/// Called once per committed payment entry, after the commit. Never called
/// for rejected or rolled-back attempts.
pub trait PaymentObserver: Send + Sync {
    /// Handle a committed payment entry and the enrollment state it produced
    fn on_payment_recorded(&self, enrollment: &Enrollment, payment: &PaymentEntry);
}

impl<F> PaymentObserver for F
where
    F: Fn(&Enrollment, &PaymentEntry) + Send + Sync,
{
    fn on_payment_recorded(&self, enrollment: &Enrollment, payment: &PaymentEntry) {
        self(enrollment, payment)
    }
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PaymentObserver for NoopObserver {
    fn on_payment_recorded(&self, _enrollment: &Enrollment, _payment: &PaymentEntry) {}
}
