//! Payment reference uniqueness guard
//!
//! Every payment reference maps to exactly one enrollment across the whole
//! ledger. A store reserves the references of the entries it is about to
//! write while it commits; a reservation that is not committed is released
//! when it is dropped, so a failed commit never leaves a reference taken.

use crate::types::{EnrollmentId, LedgerError, PaymentReference};
use dashmap::DashMap;

/// Concurrent index of recorded payment references
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    /// Reference to owning enrollment
    references: DashMap<PaymentReference, EnrollmentId>,
}

impl ReferenceIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the reference is recorded or currently reserved
    pub fn contains(&self, reference: &str) -> bool {
        self.references.contains_key(reference)
    }

    /// Enrollment that owns the reference
    ///
    /// The returned id is copied out so the caller never holds a guard on
    /// the index while it locks the enrollment.
    pub fn enrollment_for(&self, reference: &str) -> Option<EnrollmentId> {
        self.references.get(reference).map(|entry| *entry.value())
    }

    /// Reserve a reference for an enrollment
    ///
    /// # Arguments
    ///
    /// * `reference` - The payment reference to claim
    /// * `enrollment` - The enrollment the entry is written to
    ///
    /// # Returns
    ///
    /// A reservation that releases the reference on drop unless
    /// [`ReferenceReservation::commit`] is called.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateReference` if the reference is already recorded or
    /// reserved by a concurrent commit.
    pub fn reserve(
        &self,
        reference: &str,
        enrollment: EnrollmentId,
    ) -> Result<ReferenceReservation<'_>, LedgerError> {
        let mut inserted = false;
        self.references
            .entry(reference.to_string())
            .or_insert_with(|| {
                inserted = true;
                enrollment
            });

        if !inserted {
            return Err(LedgerError::duplicate_reference(reference));
        }

        Ok(ReferenceReservation {
            index: self,
            reference: reference.to_string(),
            committed: false,
        })
    }
}

/// A reference claimed by an in-flight commit
#[derive(Debug)]
#[must_use = "a reservation is released as soon as it is dropped"]
pub struct ReferenceReservation<'a> {
    index: &'a ReferenceIndex,
    reference: PaymentReference,
    committed: bool,
}

impl ReferenceReservation<'_> {
    /// Keep the reference permanently
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for ReferenceReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.index.references.remove(&self.reference);
        }
    }
}
