//! Payment-related types for the course payment ledger
//!
//! This module defines payment requests submitted by callers, the ledger
//! entries persisted for each accepted attempt, and the result handed back
//! once an attempt has been recorded.

use super::currency::Currency;
use super::enrollment::{EnrollmentId, EnrollmentStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Payment entry identifier
pub type PaymentId = Uuid;

/// Caller-supplied idempotency key, globally unique across the ledger
pub type PaymentReference = String;

/// Payment entry states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Initiated with the provider, awaiting confirmation
    Pending,

    /// Settled; counts towards the enrollment's paid amount
    Completed,

    /// Rejected by the provider
    Failed,

    /// Reversed after completion
    Refunded,

    /// Abandoned before completion
    Cancelled,
}

impl PaymentStatus {
    /// Uppercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }

    /// Whether an entry in this state moves the enrollment's paid amount
    pub fn settles(&self) -> bool {
        matches!(self, PaymentStatus::Completed)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            "CANCELLED" => Ok(PaymentStatus::Cancelled),
            other => Err(format!("Unknown payment status '{}'", other)),
        }
    }
}

/// How the payer paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Mobile money (e.g. STK push); requires a phone number
    MobileMoney,
    /// Debit or credit card
    Card,
    /// Bank transfer
    BankTransfer,
    /// PayPal
    #[serde(rename = "PAYPAL")]
    PayPal,
    /// Cash collected by staff
    Cash,
}

impl PaymentMethod {
    /// Uppercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::MobileMoney => "MOBILE_MONEY",
            PaymentMethod::Card => "CARD",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::PayPal => "PAYPAL",
            PaymentMethod::Cash => "CASH",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "MOBILE_MONEY" => Ok(PaymentMethod::MobileMoney),
            "CARD" => Ok(PaymentMethod::Card),
            "BANK_TRANSFER" => Ok(PaymentMethod::BankTransfer),
            "PAYPAL" => Ok(PaymentMethod::PayPal),
            "CASH" => Ok(PaymentMethod::Cash),
            other => Err(format!("Unknown payment method '{}'", other)),
        }
    }
}

/// Payment submission from a caller (payment UI, provider webhook)
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    /// Enrollment being paid for
    pub enrollment_id: EnrollmentId,

    /// Amount in the payer's currency; must be positive
    pub amount: Decimal,

    /// Currency the payer used
    pub currency: Currency,

    /// How the payer paid
    pub method: PaymentMethod,

    /// Idempotency key; resubmitting the same reference never double-applies
    pub reference: PaymentReference,

    /// Status the entry should be recorded with
    ///
    /// COMPLETED settles immediately. PENDING, FAILED and CANCELLED are kept
    /// in the ledger as attempts without touching the balance.
    pub status: PaymentStatus,

    /// Payer phone number (mobile money)
    pub phone_number: Option<String>,

    /// Last four digits of the card (card payments)
    pub card_last4: Option<String>,
}

impl PaymentRequest {
    /// Build a completed payment request with no payer details
    pub fn new(
        enrollment_id: EnrollmentId,
        amount: Decimal,
        currency: Currency,
        method: PaymentMethod,
        reference: impl Into<PaymentReference>,
    ) -> Self {
        PaymentRequest {
            enrollment_id,
            amount,
            currency,
            method,
            reference: reference.into(),
            status: PaymentStatus::Completed,
            phone_number: None,
            card_last4: None,
        }
    }

    /// Record the attempt with a different status
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    /// Attach the payer's phone number
    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    /// Attach the card's last four digits
    pub fn with_card_last4(mut self, card_last4: impl Into<String>) -> Self {
        self.card_last4 = Some(card_last4.into());
        self
    }
}

/// Persisted ledger entry for one accepted payment attempt
///
/// Entries are append-only. A completed entry is never edited; only a
/// pending entry may later be confirmed or failed.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEntry {
    /// Generated entry identifier
    pub id: PaymentId,

    /// Owning enrollment
    pub enrollment_id: EnrollmentId,

    /// Caller-supplied idempotency key
    pub reference: PaymentReference,

    /// Amount in the enrollment's settlement currency
    pub amount_paid: Decimal,

    /// Amount in the currency the payer used
    pub original_amount: Decimal,

    /// Currency the payer used
    pub original_currency: Currency,

    /// Rate applied to convert the original currency into settlement currency
    pub exchange_rate: Decimal,

    /// Enrollment balance before this entry, in settlement currency
    pub previous_balance: Decimal,

    /// Enrollment balance after this entry, in settlement currency
    pub new_balance: Decimal,

    /// How the payer paid
    pub method: PaymentMethod,

    /// Entry state
    pub status: PaymentStatus,

    /// Payer phone number (mobile money)
    pub phone_number: Option<String>,

    /// Last four digits of the card
    pub card_last4: Option<String>,

    /// When the attempt was accepted
    pub initiated_at: DateTime<Utc>,

    /// When the attempt settled
    pub paid_at: Option<DateTime<Utc>>,
}

/// Outcome returned to the caller after a payment has been recorded
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentResult {
    /// Identifier of the persisted entry
    pub payment_id: PaymentId,

    /// Enrollment the payment applied to
    pub enrollment_id: EnrollmentId,

    /// Amount credited, in settlement currency
    pub amount_paid: Decimal,

    /// Balance before the payment
    pub previous_balance: Decimal,

    /// Balance after the payment
    pub new_balance: Decimal,

    /// Enrollment status after the payment
    pub enrollment_status: EnrollmentStatus,

    /// Whether the enrollment is now fully paid
    pub is_fully_paid: bool,
}
