//! Currency codes accepted by the ledger
//!
//! Currencies are a closed set. Free-form codes coming from callers are
//! parsed at the boundary and rejected if unknown, so the rest of the
//! ledger never handles an unvalidated currency string.

use super::error::{AmountRejection, LedgerError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ISO 4217 currency codes supported by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US Dollar (base currency of the default rate table)
    Usd,
    /// Euro
    Eur,
    /// Pound Sterling
    Gbp,
    /// Kenyan Shilling
    Kes,
    /// Ugandan Shilling
    Ugx,
    /// Tanzanian Shilling
    Tzs,
    /// Nigerian Naira
    Ngn,
    /// South African Rand
    Zar,
}

impl Currency {
    /// Every supported currency, in declaration order
    pub const ALL: [Currency; 8] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Kes,
        Currency::Ugx,
        Currency::Tzs,
        Currency::Ngn,
        Currency::Zar,
    ];

    /// Three-letter uppercase code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Kes => "KES",
            Currency::Ugx => "UGX",
            Currency::Tzs => "TZS",
            Currency::Ngn => "NGN",
            Currency::Zar => "ZAR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    /// Parse a currency code, ignoring case and surrounding whitespace
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Currency::ALL
            .into_iter()
            .find(|currency| currency.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| {
                LedgerError::invalid_amount(AmountRejection::UnsupportedCurrency {
                    code: code.to_string(),
                })
            })
    }
}
