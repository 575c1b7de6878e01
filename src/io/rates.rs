//! Exchange rate file loading
//!
//! Reads a `currency,rate` CSV file into a [`RateTable`]. Rates are units of
//! the currency per USD, the same convention as the built-in table.

use crate::core::conversion::RateTable;
use crate::types::Currency;
use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Deserialize)]
struct RateRecord {
    currency: String,
    rate: String,
}

/// Load a rate table from a CSV file
///
/// A currency listed twice keeps its last rate. Currencies absent from the
/// file are unsupported; the built-in table is not merged in.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, a row cannot be parsed,
/// a currency code is unknown, or a rate is not strictly positive.
pub fn load_rate_table(path: &Path) -> Result<RateTable, String> {
    let file = File::open(path)
        .map_err(|e| format!("Failed to open rates file '{}': {}", path.display(), e))?;

    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(file);
    let mut table = RateTable::empty();

    for (index, row) in reader.deserialize::<RateRecord>().enumerate() {
        let line = index + 2;
        let record = row.map_err(|e| format!("Rates line {}: CSV parse error: {}", line, e))?;

        let currency = Currency::from_str(&record.currency)
            .map_err(|e| format!("Rates line {}: {}", line, e))?;
        let rate = Decimal::from_str(&record.rate)
            .map_err(|_| format!("Rates line {}: Invalid rate '{}'", line, record.rate))?;

        table
            .set_rate(currency, rate)
            .map_err(|e| format!("Rates line {}: {}", line, e))?;
    }

    info!(
        path = %path.display(),
        currencies = table.currencies().len(),
        "Loaded exchange rates"
    );

    Ok(table)
}
