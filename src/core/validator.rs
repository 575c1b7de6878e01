//! Ledger entry validation
//!
//! Checks a proposed payment against the enrollment it targets before any
//! amount is converted or any balance computed. Rules run in a fixed order
//! and the first failure is returned:
//!
//! 1. The enrollment exists and the request currency has a rate
//! 2. The amount is strictly positive
//! 3. A completed payment is not made against a fully paid enrollment
//! 4. The submitting student owns the enrollment
//! 5. Reference, card and phone details are well formed

use crate::core::traits::RateSource;
use crate::types::{
    AmountRejection, Enrollment, LedgerError, PaymentMethod, PaymentRequest, PaymentStatus,
};
use rust_decimal::Decimal;

/// Validate a payment request
///
/// # Arguments
///
/// * `enrollment` - The enrollment the request targets, if it was found
/// * `request` - The payment being submitted
/// * `submitted_by` - Authenticated identity of the submitter
/// * `rates` - Rate source used to resolve the request currency
///
/// # Returns
///
/// * `Ok(())` if the request may proceed to conversion
/// * `Err(LedgerError)` describing the first rule that failed
pub fn validate_payment<R: RateSource + ?Sized>(
    enrollment: Option<&Enrollment>,
    request: &PaymentRequest,
    submitted_by: &str,
    rates: &R,
) -> Result<(), LedgerError> {
    let enrollment =
        enrollment.ok_or_else(|| LedgerError::enrollment_not_found(request.enrollment_id))?;

    if !rates.supports(request.currency) {
        return Err(LedgerError::unsupported_currency(request.currency));
    }

    if request.amount <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(AmountRejection::NotPositive {
            amount: request.amount,
        }));
    }

    if enrollment.is_fully_paid() && request.status == PaymentStatus::Completed {
        return Err(LedgerError::AlreadySettled {
            enrollment: enrollment.id,
        });
    }

    if enrollment.student != submitted_by {
        return Err(LedgerError::unauthorized(enrollment.id, submitted_by));
    }

    validate_details(request)
}

/// Check the free-form payer details carried by a request
fn validate_details(request: &PaymentRequest) -> Result<(), LedgerError> {
    if request.reference.trim().is_empty() {
        return Err(LedgerError::invalid_payment_details(
            "reference",
            "must not be blank",
        ));
    }

    if request.status == PaymentStatus::Refunded {
        return Err(LedgerError::invalid_payment_details(
            "status",
            "REFUNDED entries cannot be recorded directly",
        ));
    }

    if let Some(last4) = &request.card_last4 {
        if last4.len() != 4 || !last4.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LedgerError::invalid_payment_details(
                "card_last4",
                "must be exactly 4 digits",
            ));
        }
    }

    if request.method == PaymentMethod::MobileMoney {
        match request.phone_number.as_deref() {
            Some(phone) if is_valid_phone(phone) => {}
            Some(_) => {
                return Err(LedgerError::invalid_payment_details(
                    "phone_number",
                    "must be 9 to 15 digits with an optional leading +",
                ))
            }
            None => {
                return Err(LedgerError::invalid_payment_details(
                    "phone_number",
                    "is required for mobile money",
                ))
            }
        }
    }

    Ok(())
}

fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (9..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}
