//! Staged writes for one enrollment
//!
//! A `LedgerTransaction` is handed to the closure passed to
//! [`LedgerStore::transaction`](crate::core::traits::LedgerStore::transaction).
//! The closure reads the enrollment and its committed payments and stages
//! new or updated entries plus the enrollment's new paid amount. Nothing is
//! visible to other callers until the store commits the staged writes.

use crate::types::{
    AmountRejection, Enrollment, EnrollmentStatus, LedgerError, PaymentEntry, PaymentStatus,
};
use chrono::Utc;
use rust_decimal::Decimal;

/// Writes staged by a transaction, ready for the store to commit
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StagedWrites {
    /// New enrollment state, if the transaction changed it
    pub enrollment: Option<Enrollment>,

    /// Entries to append, in staging order
    pub inserts: Vec<PaymentEntry>,

    /// Replacements for already committed entries
    pub updates: Vec<PaymentEntry>,
}

impl StagedWrites {
    /// Whether the transaction staged nothing
    pub fn is_empty(&self) -> bool {
        self.enrollment.is_none() && self.inserts.is_empty() && self.updates.is_empty()
    }
}

/// Working view of one enrollment inside a store transaction
#[derive(Debug)]
pub struct LedgerTransaction<'a> {
    enrollment: Enrollment,
    committed: &'a [PaymentEntry],
    inserts: Vec<PaymentEntry>,
    updates: Vec<PaymentEntry>,
    enrollment_changed: bool,
}

impl<'a> LedgerTransaction<'a> {
    /// Open a transaction over a copy of `enrollment` and its committed ledger
    pub fn new(enrollment: Enrollment, committed: &'a [PaymentEntry]) -> Self {
        LedgerTransaction {
            enrollment,
            committed,
            inserts: Vec::new(),
            updates: Vec::new(),
            enrollment_changed: false,
        }
    }

    /// Enrollment as seen by this transaction, including staged changes
    pub fn enrollment(&self) -> &Enrollment {
        &self.enrollment
    }

    /// Payment entries committed before this transaction opened
    pub fn committed_payments(&self) -> &'a [PaymentEntry] {
        self.committed
    }

    /// Look up an entry by reference, staged writes first
    pub fn payment(&self, reference: &str) -> Option<&PaymentEntry> {
        self.updates
            .iter()
            .chain(self.inserts.iter())
            .chain(self.committed.iter())
            .find(|entry| entry.reference == reference)
    }

    /// Stage a new payment entry
    ///
    /// # Errors
    ///
    /// * `DuplicateReference` if the reference is already in this enrollment's
    ///   ledger or staged in this transaction
    /// * `TransactionFailure` if the entry belongs to a different enrollment
    pub fn insert_payment(&mut self, entry: PaymentEntry) -> Result<(), LedgerError> {
        if entry.enrollment_id != self.enrollment.id {
            return Err(LedgerError::transaction_failure(format!(
                "payment '{}' staged against enrollment {} but belongs to {}",
                entry.reference, self.enrollment.id, entry.enrollment_id
            )));
        }
        if self.payment(&entry.reference).is_some() {
            return Err(LedgerError::duplicate_reference(&entry.reference));
        }
        self.inserts.push(entry);
        Ok(())
    }

    /// Stage the settlement of a pending entry
    ///
    /// `entry` replaces the entry with the same reference. The replaced
    /// entry must currently be PENDING.
    ///
    /// # Errors
    ///
    /// * `PaymentNotFound` if no entry carries the reference
    /// * `InvalidPaymentState` if the current entry is not PENDING
    pub fn update_pending_payment(&mut self, entry: PaymentEntry) -> Result<(), LedgerError> {
        let current = self
            .payment(&entry.reference)
            .ok_or_else(|| LedgerError::payment_not_found(&entry.reference))?;
        if current.status != PaymentStatus::Pending {
            return Err(LedgerError::InvalidPaymentState {
                reference: entry.reference.clone(),
                status: current.status,
            });
        }

        if let Some(staged) = self
            .inserts
            .iter_mut()
            .find(|staged| staged.reference == entry.reference)
        {
            *staged = entry;
            return Ok(());
        }

        self.updates.retain(|staged| staged.reference != entry.reference);
        self.updates.push(entry);
        Ok(())
    }

    /// Stage a new paid amount and status for the enrollment
    ///
    /// # Errors
    ///
    /// * `InvalidAmount(Negative)` if `paid_amount` is negative
    /// * `BalanceExceeded` if `paid_amount` is above the expected total
    pub fn update_enrollment(
        &mut self,
        paid_amount: Decimal,
        status: EnrollmentStatus,
    ) -> Result<(), LedgerError> {
        if paid_amount < Decimal::ZERO {
            return Err(LedgerError::invalid_amount(AmountRejection::Negative {
                amount: paid_amount,
            }));
        }
        if paid_amount > self.enrollment.total_expected_payment {
            return Err(LedgerError::balance_exceeded(
                self.enrollment.id,
                self.enrollment.balance(),
                paid_amount - self.enrollment.paid_amount,
                self.enrollment.currency,
            ));
        }

        self.enrollment.paid_amount = paid_amount;
        self.enrollment.status = status;
        self.enrollment.updated_at = Utc::now();
        self.enrollment_changed = true;
        Ok(())
    }

    /// Consume the transaction, returning what it staged
    pub fn into_writes(self) -> StagedWrites {
        StagedWrites {
            enrollment: self.enrollment_changed.then_some(self.enrollment),
            inserts: self.inserts,
            updates: self.updates,
        }
    }
}
