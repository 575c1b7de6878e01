//! Payment recording
//!
//! `PaymentRecorder` is the entry point callers use to open enrollments and
//! record payments against them. Every balance change runs inside one store
//! transaction: load the enrollment, validate, convert, compute the new
//! balance, then stage the payment entry and the enrollment update together.
//! Observers hear about a payment only once its transaction has committed.

use crate::core::balance::{apply_payment, replay_paid_amount, BalanceUpdate};
use crate::core::conversion::round_money;
use crate::core::traits::{CourseCatalog, LedgerStore, NoopObserver, PaymentObserver, RateSource};
use crate::core::validator::validate_payment;
use crate::types::{
    AmountRejection, Enrollment, EnrollmentId, LedgerError, NewEnrollment, PaymentEntry,
    PaymentRequest, PaymentResult, PaymentStatus,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Outcome of replaying an enrollment's ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    /// Paid amount stored on the enrollment
    pub cached: Decimal,

    /// Paid amount recomputed from completed entries
    pub replayed: Decimal,

    /// Whether the two agree
    pub consistent: bool,
}

/// Committed entry, the enrollment state it produced, and whether it activated
type Committed = (PaymentEntry, Enrollment, bool);

/// Records enrollments and payments against a ledger store
pub struct PaymentRecorder<S, R> {
    store: Arc<S>,
    rates: Arc<R>,
    observer: Arc<dyn PaymentObserver>,
    catalog: Option<Arc<dyn CourseCatalog>>,
}

impl<S, R> Clone for PaymentRecorder<S, R> {
    fn clone(&self) -> Self {
        PaymentRecorder {
            store: Arc::clone(&self.store),
            rates: Arc::clone(&self.rates),
            observer: Arc::clone(&self.observer),
            catalog: self.catalog.clone(),
        }
    }
}

impl<S: LedgerStore, R: RateSource> PaymentRecorder<S, R> {
    /// Create a recorder with no observer and no course catalog
    pub fn new(store: Arc<S>, rates: Arc<R>) -> Self {
        PaymentRecorder {
            store,
            rates,
            observer: Arc::new(NoopObserver),
            catalog: None,
        }
    }

    /// Notify `observer` after every committed payment entry
    pub fn with_observer(mut self, observer: Arc<dyn PaymentObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Check new enrollments against `catalog`
    pub fn with_catalog(mut self, catalog: Arc<dyn CourseCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Rate source used for conversion
    pub fn rates(&self) -> &Arc<R> {
        &self.rates
    }

    /// Open an enrollment for a student
    ///
    /// # Arguments
    ///
    /// * `student` - Student the enrollment belongs to
    /// * `request` - Course, expected total and settlement currency
    ///
    /// # Returns
    ///
    /// The new PENDING enrollment with nothing paid.
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` if the total is negative or the currency has no rate
    /// * `CourseNotFound` if a catalog is configured and lacks the course
    /// * `AlreadyEnrolled` if the student already holds this course
    #[tracing::instrument(name = "ledger.enroll", skip_all, fields(%student, course = %request.course))]
    pub fn enroll(&self, student: &str, request: NewEnrollment) -> Result<Enrollment, LedgerError> {
        let outcome = self.open_enrollment(student, request);
        match &outcome {
            Ok(enrollment) => info!(
                enrollment = %enrollment.id,
                total = %enrollment.total_expected_payment,
                currency = %enrollment.currency,
                "Enrollment created"
            ),
            Err(err) => log_rejection("enroll", err),
        }
        outcome
    }

    fn open_enrollment(&self, student: &str, request: NewEnrollment) -> Result<Enrollment, LedgerError> {
        request.validate()?;
        if !self.rates.supports(request.currency) {
            return Err(LedgerError::unsupported_currency(request.currency));
        }
        if let Some(catalog) = &self.catalog {
            if !catalog.course_exists(&request.course) {
                return Err(LedgerError::CourseNotFound {
                    course: request.course,
                });
            }
        }

        let enrollment = Enrollment::new(
            student,
            request.course,
            request.total_expected_payment,
            request.currency,
        );
        self.store.insert_enrollment(enrollment.clone())?;
        Ok(enrollment)
    }

    /// Record a payment submitted by `submitted_by`
    ///
    /// A COMPLETED request settles immediately. Any other status is appended
    /// to the ledger as an attempt that leaves the balance untouched until it
    /// is confirmed with [`PaymentRecorder::confirm_pending`].
    ///
    /// # Errors
    ///
    /// * `EnrollmentNotFound`, `InvalidAmount`, `AlreadySettled`,
    ///   `Unauthorized`, `InvalidPaymentDetails` from validation
    /// * `DuplicateReference` if the reference was already recorded
    /// * `InvalidAmount(RoundsToZero)` if a cross-currency amount converts to 0.00
    /// * `BalanceExceeded` if a completed payment is larger than the balance
    /// * `TransactionFailure` if the store could not commit
    #[tracing::instrument(
        name = "ledger.record",
        skip_all,
        fields(%submitted_by, enrollment = %request.enrollment_id, reference = %request.reference)
    )]
    pub fn record(
        &self,
        submitted_by: &str,
        request: PaymentRequest,
    ) -> Result<PaymentResult, LedgerError> {
        let outcome = self.record_attempt(submitted_by, &request);
        self.finish("record", outcome)
    }

    fn record_attempt(
        &self,
        submitted_by: &str,
        request: &PaymentRequest,
    ) -> Result<Committed, LedgerError> {
        self.store.transaction(request.enrollment_id, |tx| {
            let enrollment = tx.enrollment().clone();
            validate_payment(Some(&enrollment), request, submitted_by, self.rates.as_ref())?;

            // the reservation at commit still decides races
            if self.store.contains_reference(&request.reference) {
                return Err(LedgerError::duplicate_reference(&request.reference));
            }

            let conversion =
                self.rates
                    .convert(request.amount, request.currency, enrollment.currency)?;
            if request.currency != enrollment.currency && round_money(conversion.amount).is_zero() {
                return Err(LedgerError::invalid_amount(AmountRejection::RoundsToZero {
                    amount: request.amount,
                    currency: enrollment.currency,
                }));
            }

            let now = Utc::now();
            let mut entry = PaymentEntry {
                id: Uuid::new_v4(),
                enrollment_id: enrollment.id,
                reference: request.reference.clone(),
                amount_paid: conversion.amount,
                original_amount: request.amount,
                original_currency: request.currency,
                exchange_rate: conversion.rate,
                previous_balance: enrollment.balance(),
                new_balance: enrollment.balance(),
                method: request.method,
                status: request.status,
                phone_number: request.phone_number.clone(),
                card_last4: request.card_last4.clone(),
                initiated_at: now,
                paid_at: None,
            };

            if !request.status.settles() {
                tx.insert_payment(entry.clone())?;
                return Ok((entry, enrollment, false));
            }

            let update = settle(&enrollment, conversion.amount)?;
            entry.previous_balance = update.previous_balance;
            entry.new_balance = update.new_balance;
            entry.paid_at = Some(now);

            tx.insert_payment(entry.clone())?;
            tx.update_enrollment(update.new_paid_amount, update.new_status)?;
            Ok((entry, tx.enrollment().clone(), update.activated))
        })
    }

    /// Settle a pending payment after the provider confirmed it
    ///
    /// The amount converted when the payment was initiated is applied; the
    /// balance it is applied to is the one current at confirmation.
    ///
    /// # Errors
    ///
    /// * `PaymentNotFound` if the reference is unknown
    /// * `InvalidPaymentState` if the entry is not PENDING
    /// * `AlreadySettled` if the enrollment was paid in full meanwhile
    /// * `BalanceExceeded` if the amount is now larger than the balance
    #[tracing::instrument(name = "ledger.confirm", skip_all, fields(%reference))]
    pub fn confirm_pending(&self, reference: &str) -> Result<PaymentResult, LedgerError> {
        let outcome = self.settle_pending(reference, PaymentStatus::Completed);
        self.finish("confirm", outcome)
    }

    /// Mark a pending payment as failed
    ///
    /// # Errors
    ///
    /// * `PaymentNotFound` if the reference is unknown
    /// * `InvalidPaymentState` if the entry is not PENDING
    #[tracing::instrument(name = "ledger.fail", skip_all, fields(%reference))]
    pub fn fail_pending(&self, reference: &str) -> Result<PaymentResult, LedgerError> {
        let outcome = self.settle_pending(reference, PaymentStatus::Failed);
        self.finish("fail", outcome)
    }

    fn settle_pending(
        &self,
        reference: &str,
        status: PaymentStatus,
    ) -> Result<Committed, LedgerError> {
        let enrollment_id = self
            .store
            .payment(reference)
            .map(|entry| entry.enrollment_id)
            .ok_or_else(|| LedgerError::payment_not_found(reference))?;

        self.store.transaction(enrollment_id, |tx| {
            let current = tx
                .payment(reference)
                .cloned()
                .ok_or_else(|| LedgerError::payment_not_found(reference))?;
            if current.status != PaymentStatus::Pending {
                return Err(LedgerError::InvalidPaymentState {
                    reference: current.reference,
                    status: current.status,
                });
            }

            let enrollment = tx.enrollment().clone();
            if !status.settles() {
                let failed = PaymentEntry {
                    status,
                    previous_balance: enrollment.balance(),
                    new_balance: enrollment.balance(),
                    ..current
                };
                tx.update_pending_payment(failed.clone())?;
                return Ok((failed, enrollment, false));
            }

            if enrollment.is_fully_paid() {
                return Err(LedgerError::AlreadySettled {
                    enrollment: enrollment.id,
                });
            }
            let update = settle(&enrollment, current.amount_paid)?;
            let settled = PaymentEntry {
                status,
                previous_balance: update.previous_balance,
                new_balance: update.new_balance,
                paid_at: Some(Utc::now()),
                ..current
            };

            tx.update_pending_payment(settled.clone())?;
            tx.update_enrollment(update.new_paid_amount, update.new_status)?;
            Ok((settled, tx.enrollment().clone(), update.activated))
        })
    }

    /// Log, notify and convert a payment outcome
    fn finish(
        &self,
        operation: &'static str,
        outcome: Result<Committed, LedgerError>,
    ) -> Result<PaymentResult, LedgerError> {
        let (entry, enrollment, activated) = match outcome {
            Ok(committed) => committed,
            Err(err) => {
                log_rejection(operation, &err);
                return Err(err);
            }
        };

        info!(
            operation,
            payment = %entry.id,
            status = %entry.status,
            amount = %entry.amount_paid,
            currency = %enrollment.currency,
            new_balance = %entry.new_balance,
            "Payment recorded"
        );
        if activated {
            info!(enrollment = %enrollment.id, "Enrollment fully paid, now ACTIVE");
        }

        self.observer.on_payment_recorded(&enrollment, &entry);

        let credited = if entry.status.settles() {
            entry.amount_paid
        } else {
            Decimal::ZERO
        };
        Ok(PaymentResult {
            payment_id: entry.id,
            enrollment_id: enrollment.id,
            amount_paid: credited,
            previous_balance: entry.previous_balance,
            new_balance: entry.new_balance,
            enrollment_status: enrollment.status,
            is_fully_paid: enrollment.is_fully_paid(),
        })
    }

    /// Get an enrollment by ID
    pub fn enrollment(&self, id: EnrollmentId) -> Result<Enrollment, LedgerError> {
        self.store
            .enrollment(id)
            .ok_or_else(|| LedgerError::enrollment_not_found(id))
    }

    /// Get the enrollment a student holds for a course
    pub fn find_enrollment(&self, student: &str, course: &str) -> Result<Enrollment, LedgerError> {
        self.store
            .find_enrollment(student, course)
            .ok_or_else(|| LedgerError::not_enrolled(student, course))
    }

    /// Get an enrollment's ledger in insertion order
    pub fn payments(&self, id: EnrollmentId) -> Result<Vec<PaymentEntry>, LedgerError> {
        self.enrollment(id)?;
        Ok(self.store.payments(id))
    }

    /// Get a payment entry by reference
    pub fn payment(&self, reference: &str) -> Result<PaymentEntry, LedgerError> {
        self.store
            .payment(reference)
            .ok_or_else(|| LedgerError::payment_not_found(reference))
    }

    /// Replay an enrollment's completed entries and compare with its paid amount
    ///
    /// Runs inside a transaction so the enrollment and ledger are read from
    /// the same committed state.
    pub fn reconcile(&self, id: EnrollmentId) -> Result<Reconciliation, LedgerError> {
        let reconciliation = self.store.transaction(id, |tx| {
            let cached = tx.enrollment().paid_amount;
            let replayed = replay_paid_amount(tx.committed_payments())?;
            Ok(Reconciliation {
                cached,
                replayed,
                consistent: cached == replayed,
            })
        })?;

        if !reconciliation.consistent {
            error!(
                enrollment = %id,
                cached = %reconciliation.cached,
                replayed = %reconciliation.replayed,
                "Enrollment paid amount does not match its ledger"
            );
        }
        Ok(reconciliation)
    }
}

/// Apply `amount` to the enrollment, refusing to pay past the balance
fn settle(enrollment: &Enrollment, amount: Decimal) -> Result<BalanceUpdate, LedgerError> {
    let remaining = enrollment.balance();
    if amount > remaining {
        return Err(LedgerError::balance_exceeded(
            enrollment.id,
            remaining,
            amount,
            enrollment.currency,
        ));
    }
    apply_payment(enrollment, amount)
}

/// Expected rejections are debug noise; only commit failures are errors
fn log_rejection(operation: &'static str, err: &LedgerError) {
    if err.is_retryable() {
        error!(operation, reason = err.reason_code(), error = %err, "Ledger transaction failed");
    } else {
        debug!(operation, reason = err.reason_code(), error = %err, "Ledger request rejected");
    }
}
