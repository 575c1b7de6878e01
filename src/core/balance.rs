//! Enrollment balance computation
//!
//! Pure functions over enrollment state. Nothing here reads or writes
//! storage; the recorder applies the returned update inside a transaction.

use crate::types::{Enrollment, EnrollmentStatus, LedgerError, PaymentEntry};
use rust_decimal::Decimal;

/// Balance effect of applying one settled amount to an enrollment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceUpdate {
    /// Balance before the payment
    pub previous_balance: Decimal,

    /// Cumulative paid amount after the payment
    pub new_paid_amount: Decimal,

    /// Balance after the payment, never below zero
    pub new_balance: Decimal,

    /// Enrollment status after the payment
    pub new_status: EnrollmentStatus,

    /// Whether this payment moved the enrollment to ACTIVE
    pub activated: bool,
}

/// Compute the effect of settling `amount` against `enrollment`
///
/// The enrollment becomes ACTIVE once the paid amount reaches the total;
/// otherwise its status is left as it was.
///
/// # Errors
///
/// Returns `ArithmeticOverflow` if adding the amount overflows.
pub fn apply_payment(enrollment: &Enrollment, amount: Decimal) -> Result<BalanceUpdate, LedgerError> {
    let previous_balance = enrollment
        .total_expected_payment
        .checked_sub(enrollment.paid_amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow("balance"))?;
    let new_paid_amount = enrollment
        .paid_amount
        .checked_add(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow("paid amount"))?;
    let new_balance = enrollment
        .total_expected_payment
        .checked_sub(new_paid_amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow("balance"))?
        .max(Decimal::ZERO);

    let new_status = if new_paid_amount >= enrollment.total_expected_payment {
        EnrollmentStatus::Active
    } else {
        enrollment.status
    };

    Ok(BalanceUpdate {
        previous_balance,
        new_paid_amount,
        new_balance,
        new_status,
        activated: new_status != enrollment.status,
    })
}

/// Recompute a paid amount from ledger entries
///
/// Only COMPLETED entries count.
///
/// # Errors
///
/// Returns `ArithmeticOverflow` if the sum overflows.
pub fn replay_paid_amount<'a, I>(entries: I) -> Result<Decimal, LedgerError>
where
    I: IntoIterator<Item = &'a PaymentEntry>,
{
    entries
        .into_iter()
        .filter(|entry| entry.status.settles())
        .try_fold(Decimal::ZERO, |sum, entry| {
            sum.checked_add(entry.amount_paid)
                .ok_or_else(|| LedgerError::arithmetic_overflow("ledger replay"))
        })
}
