//! Ledger command engine
//!
//! This module provides the `LedgerEngine` that routes ledger commands to the
//! payment recorder. A command addresses its enrollment by (student, course)
//! the way a webhook or batch feed does; the engine resolves that pair to an
//! enrollment id and checks that callbacks for a payment reference come from
//! the enrollment that owns it.
//!
//! The engine is `Sync`: the sync strategy drives it from one thread and the
//! async strategy shares it across tokio tasks behind an `Arc`.

use crate::core::conversion::RateTable;
use crate::core::recorder::PaymentRecorder;
use crate::core::store::InMemoryLedgerStore;
use crate::core::traits::{LedgerStore, RateSource};
use crate::types::{
    Currency, Enrollment, LedgerAction, LedgerCommand, LedgerError, NewEnrollment,
    PaymentRequest, PaymentResult,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Successful outcome of one ledger command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// A new enrollment was opened
    Enrolled(Enrollment),

    /// A payment entry was recorded, confirmed or failed
    Payment(PaymentResult),
}

/// Ledger command engine
///
/// Owns a [`PaymentRecorder`] and maps each [`LedgerCommand`] onto one
/// recorder operation.
pub struct LedgerEngine<S = InMemoryLedgerStore, R = RateTable> {
    recorder: PaymentRecorder<S, R>,
}

impl LedgerEngine {
    /// Create an engine over a fresh in-memory store
    ///
    /// # Arguments
    ///
    /// * `rates` - Rate table used to convert payments into settlement currency
    pub fn new(rates: Arc<RateTable>) -> Self {
        LedgerEngine {
            recorder: PaymentRecorder::new(Arc::new(InMemoryLedgerStore::new()), rates),
        }
    }
}

impl<S: LedgerStore, R: RateSource> LedgerEngine<S, R> {
    /// Create an engine around an existing recorder
    pub fn with_recorder(recorder: PaymentRecorder<S, R>) -> Self {
        LedgerEngine { recorder }
    }

    /// Recorder used for every command
    pub fn recorder(&self) -> &PaymentRecorder<S, R> {
        &self.recorder
    }

    /// Process a single ledger command
    ///
    /// # Arguments
    ///
    /// * `command` - The command to apply
    ///
    /// # Returns
    ///
    /// * `Ok(CommandOutcome)` if the command was applied
    /// * `Err(LedgerError)` if it was rejected; the ledger is unchanged
    pub fn process(&self, command: LedgerCommand) -> Result<CommandOutcome, LedgerError> {
        let LedgerCommand {
            student,
            course,
            action,
        } = command;

        match action {
            LedgerAction::Enroll {
                total_expected_payment,
                currency,
            } => self.process_enroll(&student, course, total_expected_payment, currency),
            LedgerAction::Pay {
                amount,
                currency,
                method,
                reference,
                status,
                phone_number,
                card_last4,
            } => {
                let enrollment = self.recorder.find_enrollment(&student, &course)?;
                let request = PaymentRequest {
                    enrollment_id: enrollment.id,
                    amount,
                    currency,
                    method,
                    reference,
                    status,
                    phone_number,
                    card_last4,
                };
                self.recorder
                    .record(&student, request)
                    .map(CommandOutcome::Payment)
            }
            LedgerAction::Confirm { reference } => {
                self.check_owner(&student, &course, &reference)?;
                self.recorder
                    .confirm_pending(&reference)
                    .map(CommandOutcome::Payment)
            }
            LedgerAction::Fail { reference } => {
                self.check_owner(&student, &course, &reference)?;
                self.recorder
                    .fail_pending(&reference)
                    .map(CommandOutcome::Payment)
            }
        }
    }

    fn process_enroll(
        &self,
        student: &str,
        course: String,
        total_expected_payment: Decimal,
        currency: Currency,
    ) -> Result<CommandOutcome, LedgerError> {
        self.recorder
            .enroll(
                student,
                NewEnrollment {
                    course,
                    total_expected_payment,
                    currency,
                },
            )
            .map(CommandOutcome::Enrolled)
    }

    /// Verify the payment behind `reference` belongs to the student's enrollment
    fn check_owner(&self, student: &str, course: &str, reference: &str) -> Result<(), LedgerError> {
        let enrollment = self.recorder.find_enrollment(student, course)?;
        let payment = self.recorder.payment(reference)?;
        if payment.enrollment_id != enrollment.id {
            return Err(LedgerError::unauthorized(payment.enrollment_id, student));
        }
        Ok(())
    }

    /// Get all enrollments for final output
    ///
    /// The order is unspecified; output writers sort it.
    pub fn enrollments(&self) -> Vec<Enrollment> {
        self.recorder.store().enrollments()
    }
}
