//! CSV format handling for ledger commands and enrollment output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to ledger commands
//! - Enrollment ledger output serialization
//!
//! All functions are pure (no I/O beyond the writer they are given).
//!
//! Input columns: `type,student,course,amount,currency,method,reference,status`
//! with optional trailing `phone_number,card_last4`.

use crate::core::conversion::round_money;
use crate::types::{
    Currency, Enrollment, LedgerAction, LedgerCommand, PaymentMethod, PaymentStatus,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Raw CSV row as read from the ledger feed
///
/// Every column except `type`, `student` and `course` is optional at this
/// level; [`convert_csv_record`] decides which ones a command requires.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct CsvRecord {
    /// Command type (enroll, pay, confirm, fail)
    #[serde(rename = "type")]
    pub command_type: String,

    /// Student the command acts for
    pub student: String,

    /// Course the enrollment is for
    pub course: String,

    /// Total (enroll) or payment amount (pay)
    #[serde(default)]
    pub amount: Option<String>,

    /// Settlement (enroll) or payer (pay) currency
    #[serde(default)]
    pub currency: Option<String>,

    /// Payment method (pay)
    #[serde(default)]
    pub method: Option<String>,

    /// Payment reference (pay, confirm, fail)
    #[serde(default)]
    pub reference: Option<String>,

    /// Intended payment status (pay), defaults to completed
    #[serde(default)]
    pub status: Option<String>,

    /// Payer phone number (mobile money)
    #[serde(default)]
    pub phone_number: Option<String>,

    /// Card last four digits
    #[serde(default)]
    pub card_last4: Option<String>,
}

/// Trimmed, non-empty value of an optional column
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Value of a column the command cannot do without
fn required(value: Option<String>, column: &str, command: &str) -> Result<String, String> {
    present(value).ok_or_else(|| format!("{} command is missing {}", command.trim(), column))
}

fn parse_amount(value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value).map_err(|_| format!("Invalid amount '{}'", value))
}

fn parse_currency(value: &str) -> Result<Currency, String> {
    Currency::from_str(value).map_err(|e| e.to_string())
}

/// Convert a CSV record to a ledger command
///
/// # Arguments
///
/// * `csv_record` - The raw CSV record to convert
///
/// # Returns
///
/// * `Ok(LedgerCommand)` if the record is well formed for its command type
/// * `Err(String)` describing the first problem found
///
/// # Validation
///
/// - `enroll` requires amount and currency
/// - `pay` requires amount, currency, method and reference; status defaults to completed
/// - `confirm` and `fail` require reference
/// - student and course must never be blank
///
/// Business rules (positive amounts, ownership, balances) are left to the ledger.
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<LedgerCommand, String> {
    let CsvRecord {
        command_type,
        student,
        course,
        amount,
        currency,
        method,
        reference,
        status,
        phone_number,
        card_last4,
    } = csv_record;

    let student = required(Some(student), "student", &command_type)?;
    let course = required(Some(course), "course", &command_type)?;
    let kind = command_type.trim().to_lowercase();

    let action = match kind.as_str() {
        "enroll" => LedgerAction::Enroll {
            total_expected_payment: parse_amount(&required(amount, "amount", &kind)?)?,
            currency: parse_currency(&required(currency, "currency", &kind)?)?,
        },
        "pay" => LedgerAction::Pay {
            amount: parse_amount(&required(amount, "amount", &kind)?)?,
            currency: parse_currency(&required(currency, "currency", &kind)?)?,
            method: PaymentMethod::from_str(&required(method, "method", &kind)?)?,
            reference: required(reference, "reference", &kind)?,
            status: match present(status) {
                Some(status) => PaymentStatus::from_str(&status)?,
                None => PaymentStatus::Completed,
            },
            phone_number: present(phone_number),
            card_last4: present(card_last4),
        },
        "confirm" => LedgerAction::Confirm {
            reference: required(reference, "reference", &kind)?,
        },
        "fail" => LedgerAction::Fail {
            reference: required(reference, "reference", &kind)?,
        },
        _ => {
            return Err(format!(
                "Invalid command type: '{}' for student '{}'",
                command_type, student
            ))
        }
    };

    Ok(LedgerCommand {
        student,
        course,
        action,
    })
}

/// Write enrollment states to CSV output
///
/// Rows are sorted by student then course for deterministic output. Amounts
/// are written with two decimal places.
///
/// # Errors
///
/// Returns an error if writing or flushing fails.
pub fn write_enrollments_csv(
    enrollments: &[Enrollment],
    output: &mut dyn Write,
) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record([
            "student", "course", "currency", "expected", "paid", "balance", "status",
        ])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted: Vec<&Enrollment> = enrollments.iter().collect();
    sorted.sort_by(|a, b| (&a.student, &a.course).cmp(&(&b.student, &b.course)));

    for enrollment in sorted {
        writer
            .write_record(&[
                enrollment.student.clone(),
                enrollment.course.clone(),
                enrollment.currency.to_string(),
                format!("{:.2}", round_money(enrollment.total_expected_payment)),
                format!("{:.2}", round_money(enrollment.paid_amount)),
                format!("{:.2}", round_money(enrollment.balance())),
                enrollment.status.to_string(),
            ])
            .map_err(|e| format!("Failed to write enrollment record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
