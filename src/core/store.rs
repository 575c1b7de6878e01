//! In-memory ledger store
//!
//! Enrollments and their payment ledgers live in a `DashMap` keyed by
//! enrollment id. A transaction holds the enrollment's entry guard from the
//! first read until its writes are committed or discarded, so concurrent
//! transactions on the same enrollment run one after another while different
//! enrollments proceed in parallel.
//!
//! # Lock ordering
//!
//! A transaction takes the enrollment guard and then touches the reference
//! index. Readers copy what they need out of the index before locking an
//! enrollment, so the two are never waited on in the opposite order.

use crate::core::guard::ReferenceIndex;
use crate::core::traits::LedgerStore;
use crate::core::transaction::{LedgerTransaction, StagedWrites};
use crate::types::{
    CourseId, Enrollment, EnrollmentId, LedgerError, PaymentEntry, StudentId,
};
use dashmap::DashMap;
use std::sync::Mutex;
use tracing::warn;

/// Commit step at which an injected fault fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Before any payment entry is written
    PaymentWrite,

    /// After payment entries are written, before the enrollment is
    EnrollmentWrite,
}

/// One enrollment and its append-only payment ledger
#[derive(Debug, Clone)]
struct EnrollmentRecord {
    enrollment: Enrollment,
    payments: Vec<PaymentEntry>,
}

/// Concurrency-safe in-memory implementation of [`LedgerStore`]
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    /// Enrollment records by id
    records: DashMap<EnrollmentId, EnrollmentRecord>,

    /// (student, course) uniqueness index
    keys: DashMap<(StudentId, CourseId), EnrollmentId>,

    /// Global payment reference index
    references: ReferenceIndex,

    /// One-shot fault for exercising rollback
    fail_point: Mutex<Option<FailPoint>>,
}

impl InMemoryLedgerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit that reaches `point` fail with `TransactionFailure`
    ///
    /// The fault fires once and is then cleared.
    pub fn inject_fault(&self, point: FailPoint) {
        let mut slot = self
            .fail_point
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(point);
    }

    /// Fire the armed fault if it matches `point`
    fn trip(&self, point: FailPoint) -> Result<(), LedgerError> {
        let mut slot = self
            .fail_point
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *slot == Some(point) {
            *slot = None;
            warn!(fail_point = ?point, "Injected fault fired during commit");
            return Err(LedgerError::transaction_failure(format!(
                "injected fault at {:?}",
                point
            )));
        }
        Ok(())
    }

    /// Apply staged writes to a locked record
    ///
    /// Either every write lands or the record is left exactly as it was.
    fn commit(&self, record: &mut EnrollmentRecord, writes: StagedWrites) -> Result<(), LedgerError> {
        let StagedWrites {
            enrollment,
            inserts,
            updates,
        } = writes;

        let mut reservations = Vec::with_capacity(inserts.len());
        for entry in &inserts {
            reservations.push(self.references.reserve(&entry.reference, entry.enrollment_id)?);
        }

        self.trip(FailPoint::PaymentWrite)?;

        let committed_len = record.payments.len();
        let mut replaced = Vec::with_capacity(updates.len());
        for entry in updates {
            let position = record
                .payments
                .iter()
                .position(|existing| existing.reference == entry.reference);
            match position {
                Some(position) => {
                    let previous = std::mem::replace(&mut record.payments[position], entry);
                    replaced.push((position, previous));
                }
                None => {
                    Self::undo(record, committed_len, replaced);
                    return Err(LedgerError::transaction_failure(format!(
                        "payment '{}' vanished before commit",
                        entry.reference
                    )));
                }
            }
        }
        record.payments.extend(inserts);

        if let Err(err) = self.trip(FailPoint::EnrollmentWrite) {
            Self::undo(record, committed_len, replaced);
            return Err(err);
        }

        if let Some(enrollment) = enrollment {
            record.enrollment = enrollment;
        }
        for reservation in reservations {
            reservation.commit();
        }
        Ok(())
    }

    /// Restore a record's ledger to its pre-commit state
    fn undo(
        record: &mut EnrollmentRecord,
        committed_len: usize,
        replaced: Vec<(usize, PaymentEntry)>,
    ) {
        record.payments.truncate(committed_len);
        for (position, previous) in replaced.into_iter().rev() {
            record.payments[position] = previous;
        }
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn insert_enrollment(&self, enrollment: Enrollment) -> Result<(), LedgerError> {
        let key = (enrollment.student.clone(), enrollment.course.clone());
        let mut inserted = false;
        self.keys.entry(key).or_insert_with(|| {
            inserted = true;
            enrollment.id
        });

        if !inserted {
            return Err(LedgerError::already_enrolled(
                &enrollment.student,
                &enrollment.course,
            ));
        }

        self.records.insert(
            enrollment.id,
            EnrollmentRecord {
                enrollment,
                payments: Vec::new(),
            },
        );
        Ok(())
    }

    fn enrollment(&self, id: EnrollmentId) -> Option<Enrollment> {
        self.records.get(&id).map(|record| record.enrollment.clone())
    }

    fn find_enrollment(&self, student: &str, course: &str) -> Option<Enrollment> {
        let id = self
            .keys
            .get(&(student.to_string(), course.to_string()))
            .map(|entry| *entry.value())?;
        self.enrollment(id)
    }

    fn enrollments(&self) -> Vec<Enrollment> {
        self.records
            .iter()
            .map(|record| record.enrollment.clone())
            .collect()
    }

    fn payment(&self, reference: &str) -> Option<PaymentEntry> {
        let id = self.references.enrollment_for(reference)?;
        self.records.get(&id).and_then(|record| {
            record
                .payments
                .iter()
                .find(|entry| entry.reference == reference)
                .cloned()
        })
    }

    fn payments(&self, enrollment: EnrollmentId) -> Vec<PaymentEntry> {
        self.records
            .get(&enrollment)
            .map(|record| record.payments.clone())
            .unwrap_or_default()
    }

    fn contains_reference(&self, reference: &str) -> bool {
        self.references.contains(reference)
    }

    fn transaction<T, F>(&self, enrollment: EnrollmentId, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut LedgerTransaction<'_>) -> Result<T, LedgerError>,
    {
        let mut record = self
            .records
            .get_mut(&enrollment)
            .ok_or_else(|| LedgerError::enrollment_not_found(enrollment))?;

        let (value, writes) = {
            let mut tx = LedgerTransaction::new(record.enrollment.clone(), &record.payments);
            let value = f(&mut tx)?;
            (value, tx.into_writes())
        };

        if !writes.is_empty() {
            self.commit(record.value_mut(), writes)?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Currency, EnrollmentStatus, PaymentMethod, PaymentStatus};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::thread;
    use uuid::Uuid;

    fn entry(enrollment: &Enrollment, reference: &str, amount: Decimal) -> PaymentEntry {
        PaymentEntry {
            id: Uuid::new_v4(),
            enrollment_id: enrollment.id,
            reference: reference.to_string(),
            amount_paid: amount,
            original_amount: amount,
            original_currency: enrollment.currency,
            exchange_rate: Decimal::ONE,
            previous_balance: enrollment.balance(),
            new_balance: enrollment.balance() - amount,
            method: PaymentMethod::Cash,
            status: PaymentStatus::Completed,
            phone_number: None,
            card_last4: None,
            initiated_at: Utc::now(),
            paid_at: Some(Utc::now()),
        }
    }

    fn store_with_enrollment() -> (InMemoryLedgerStore, Enrollment) {
        let store = InMemoryLedgerStore::new();
        let enrollment = Enrollment::new("alice", "rust-101", dec!(1000), Currency::Usd);
        store.insert_enrollment(enrollment.clone()).unwrap();
        (store, enrollment)
    }

    fn pay(store: &InMemoryLedgerStore, id: EnrollmentId, reference: &str, amount: Decimal) -> Result<(), LedgerError> {
        store.transaction(id, |tx| {
            let current = tx.enrollment().clone();
            tx.insert_payment(entry(&current, reference, amount))?;
            tx.update_enrollment(current.paid_amount + amount, current.status)
        })
    }

    #[test]
    fn test_insert_and_lookup_enrollment() {
        let (store, enrollment) = store_with_enrollment();

        assert_eq!(store.enrollment(enrollment.id), Some(enrollment.clone()));
        assert_eq!(
            store.find_enrollment("alice", "rust-101"),
            Some(enrollment.clone())
        );
        assert_eq!(store.find_enrollment("alice", "go-101"), None);
        assert_eq!(store.enrollments().len(), 1);
    }

    #[test]
    fn test_second_enrollment_for_same_course_rejected() {
        let (store, _) = store_with_enrollment();
        let again = Enrollment::new("alice", "rust-101", dec!(5), Currency::Kes);

        let err = store.insert_enrollment(again.clone()).unwrap_err();
        assert_eq!(err, LedgerError::already_enrolled("alice", "rust-101"));
        assert_eq!(store.enrollment(again.id), None);
    }

    #[test]
    fn test_committed_transaction_is_visible() {
        let (store, enrollment) = store_with_enrollment();

        pay(&store, enrollment.id, "ref-1", dec!(400)).unwrap();

        assert_eq!(store.enrollment(enrollment.id).unwrap().paid_amount, dec!(400));
        assert_eq!(store.payments(enrollment.id).len(), 1);
        assert!(store.contains_reference("ref-1"));
        assert_eq!(store.payment("ref-1").unwrap().amount_paid, dec!(400));
    }

    #[test]
    fn test_closure_error_discards_writes() {
        let (store, enrollment) = store_with_enrollment();

        let result: Result<(), LedgerError> = store.transaction(enrollment.id, |tx| {
            let current = tx.enrollment().clone();
            tx.insert_payment(entry(&current, "ref-1", dec!(10)))?;
            tx.update_enrollment(dec!(10), EnrollmentStatus::Pending)?;
            Err(LedgerError::transaction_failure("late validation"))
        });

        assert!(result.is_err());
        assert_eq!(store.enrollment(enrollment.id).unwrap().paid_amount, Decimal::ZERO);
        assert!(store.payments(enrollment.id).is_empty());
        assert!(!store.contains_reference("ref-1"));
    }

    #[test]
    fn test_unknown_enrollment_is_not_found() {
        let store = InMemoryLedgerStore::new();
        let id = Uuid::new_v4();

        let err = store.transaction(id, |_| Ok(())).unwrap_err();
        assert_eq!(err, LedgerError::enrollment_not_found(id));
        assert!(store.payments(id).is_empty());
    }

    #[test]
    fn test_fault_after_payment_write_rolls_back() {
        let (store, enrollment) = store_with_enrollment();
        pay(&store, enrollment.id, "ref-1", dec!(100)).unwrap();

        store.inject_fault(FailPoint::EnrollmentWrite);
        let err = pay(&store, enrollment.id, "ref-2", dec!(200)).unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(store.enrollment(enrollment.id).unwrap().paid_amount, dec!(100));
        assert_eq!(store.payments(enrollment.id).len(), 1);
        assert!(!store.contains_reference("ref-2"));
        assert!(store.payment("ref-2").is_none());

        // One-shot: the retry succeeds
        pay(&store, enrollment.id, "ref-2", dec!(200)).unwrap();
        assert_eq!(store.enrollment(enrollment.id).unwrap().paid_amount, dec!(300));
    }

    #[test]
    fn test_fault_before_payment_write_rolls_back() {
        let (store, enrollment) = store_with_enrollment();

        store.inject_fault(FailPoint::PaymentWrite);
        assert!(pay(&store, enrollment.id, "ref-1", dec!(100)).is_err());

        assert!(store.payments(enrollment.id).is_empty());
        assert!(!store.contains_reference("ref-1"));
    }

    #[test]
    fn test_fault_restores_replaced_entries() {
        let (store, enrollment) = store_with_enrollment();
        let mut pending = entry(&enrollment, "ref-1", dec!(100));
        pending.status = PaymentStatus::Pending;
        store
            .transaction(enrollment.id, |tx| tx.insert_payment(pending.clone()))
            .unwrap();

        store.inject_fault(FailPoint::EnrollmentWrite);
        let result = store.transaction(enrollment.id, |tx| {
            tx.update_pending_payment(PaymentEntry {
                status: PaymentStatus::Completed,
                ..pending.clone()
            })?;
            tx.update_enrollment(dec!(100), EnrollmentStatus::Pending)
        });

        assert!(result.is_err());
        assert_eq!(store.payment("ref-1").unwrap().status, PaymentStatus::Pending);
        assert_eq!(store.enrollment(enrollment.id).unwrap().paid_amount, Decimal::ZERO);
    }

    #[test]
    fn test_reference_is_unique_across_enrollments() {
        let (store, alice) = store_with_enrollment();
        let bob = Enrollment::new("bob", "rust-101", dec!(1000), Currency::Usd);
        store.insert_enrollment(bob.clone()).unwrap();

        pay(&store, alice.id, "ref-1", dec!(10)).unwrap();
        let err = pay(&store, bob.id, "ref-1", dec!(10)).unwrap_err();

        assert_eq!(err, LedgerError::duplicate_reference("ref-1"));
        assert_eq!(store.enrollment(bob.id).unwrap().paid_amount, Decimal::ZERO);
        assert!(store.payments(bob.id).is_empty());
    }

    #[test]
    fn test_concurrent_transactions_on_same_enrollment_serialize() {
        let (store, enrollment) = store_with_enrollment();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    pay(&store, enrollment.id, &format!("ref-{}", i), dec!(100)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let final_state = store.enrollment(enrollment.id).unwrap();
        assert_eq!(final_state.paid_amount, dec!(1000));
        assert_eq!(store.payments(enrollment.id).len(), 10);
    }
}
