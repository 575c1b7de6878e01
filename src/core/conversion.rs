//! Currency conversion table
//!
//! Rates are stored relative to a common base currency (USD = 1). Converting
//! between two currencies divides by the source rate and multiplies by the
//! target rate at full precision, then rounds the result once to two
//! decimal places.

use crate::core::traits::RateSource;
use crate::types::{Currency, LedgerError};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;

/// Decimal places kept on converted amounts
pub const MONEY_SCALE: u32 = 2;

/// Result of a conversion: the converted amount and the rate that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    /// Amount in the target currency
    pub amount: Decimal,

    /// Effective rate from source to target (`rate(to) / rate(from)`)
    pub rate: Decimal,
}

/// Round a money amount to two decimal places, midpoint away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Look up a rate, failing closed on unknown or non-positive rates
fn lookup<R: RateSource + ?Sized>(source: &R, currency: Currency) -> Result<Decimal, LedgerError> {
    let rate = source
        .rate(currency)
        .ok_or_else(|| LedgerError::unsupported_currency(currency))?;
    if rate <= Decimal::ZERO {
        return Err(LedgerError::InvalidRate { currency, rate });
    }
    Ok(rate)
}

/// Rate applied when converting `from` into `to`
///
/// # Errors
///
/// * `InvalidAmount(UnsupportedCurrency)` if either currency has no rate
/// * `InvalidRate` if a stored rate is not positive
/// * `ArithmeticOverflow` if the division overflows
pub fn rate_between<R: RateSource + ?Sized>(
    source: &R,
    from: Currency,
    to: Currency,
) -> Result<Decimal, LedgerError> {
    let from_rate = lookup(source, from)?;
    let to_rate = lookup(source, to)?;
    if from == to {
        return Ok(Decimal::ONE);
    }
    to_rate
        .checked_div(from_rate)
        .ok_or_else(|| LedgerError::arithmetic_overflow("rate_between"))
}

/// Convert `amount` from one currency into another
///
/// Same-currency conversion returns the amount untouched with rate 1. Any
/// other pair is computed as `amount / rate(from) * rate(to)` and rounded
/// once at the end.
///
/// # Arguments
///
/// * `source` - Rate lookup
/// * `amount` - Amount in `from`
/// * `from` - Currency the amount is expressed in
/// * `to` - Currency to express it in
///
/// # Errors
///
/// Same as [`rate_between`], plus `ArithmeticOverflow` on the multiplication.
pub fn convert<R: RateSource + ?Sized>(
    source: &R,
    amount: Decimal,
    from: Currency,
    to: Currency,
) -> Result<Conversion, LedgerError> {
    let from_rate = lookup(source, from)?;
    let to_rate = lookup(source, to)?;

    if from == to {
        return Ok(Conversion {
            amount,
            rate: Decimal::ONE,
        });
    }

    let in_base = amount
        .checked_div(from_rate)
        .ok_or_else(|| LedgerError::arithmetic_overflow("currency conversion"))?;
    let converted = in_base
        .checked_mul(to_rate)
        .ok_or_else(|| LedgerError::arithmetic_overflow("currency conversion"))?;
    let rate = to_rate
        .checked_div(from_rate)
        .ok_or_else(|| LedgerError::arithmetic_overflow("currency conversion"))?;

    Ok(Conversion {
        amount: round_money(converted),
        rate,
    })
}

/// In-memory rate table
///
/// Every rate is strictly positive; construction rejects anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rates: HashMap<Currency, Decimal>,
}

impl RateTable {
    /// Create an empty table
    ///
    /// An empty table supports no currency at all, not even the base.
    pub fn empty() -> Self {
        RateTable {
            rates: HashMap::new(),
        }
    }

    /// Build a table from `(currency, rate)` pairs
    ///
    /// # Errors
    ///
    /// Returns `InvalidRate` for the first rate that is zero or negative.
    pub fn from_rates<I>(rates: I) -> Result<Self, LedgerError>
    where
        I: IntoIterator<Item = (Currency, Decimal)>,
    {
        let mut table = RateTable::empty();
        for (currency, rate) in rates {
            table.set_rate(currency, rate)?;
        }
        Ok(table)
    }

    /// Insert or replace a rate
    ///
    /// # Errors
    ///
    /// Returns `InvalidRate` if `rate` is zero or negative; the table is
    /// left unchanged.
    pub fn set_rate(&mut self, currency: Currency, rate: Decimal) -> Result<(), LedgerError> {
        if rate <= Decimal::ZERO {
            return Err(LedgerError::InvalidRate { currency, rate });
        }
        self.rates.insert(currency, rate);
        Ok(())
    }

    /// Currencies with a rate, in `Currency` order
    pub fn currencies(&self) -> Vec<Currency> {
        let mut currencies: Vec<Currency> = self.rates.keys().copied().collect();
        currencies.sort();
        currencies
    }
}

impl Default for RateTable {
    /// Built-in rates per USD
    fn default() -> Self {
        let rates = [
            (Currency::Usd, Decimal::ONE),
            (Currency::Eur, Decimal::new(92, 2)),
            (Currency::Gbp, Decimal::new(79, 2)),
            (Currency::Kes, Decimal::new(150, 0)),
            (Currency::Ugx, Decimal::new(3700, 0)),
            (Currency::Tzs, Decimal::new(2500, 0)),
            (Currency::Ngn, Decimal::new(1500, 0)),
            (Currency::Zar, Decimal::new(185, 1)),
        ];
        RateTable {
            rates: rates.into_iter().collect(),
        }
    }
}

impl RateSource for RateTable {
    fn rate(&self, currency: Currency) -> Option<Decimal> {
        self.rates.get(&currency).copied()
    }
}
