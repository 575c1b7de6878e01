//! I/O module
//!
//! Handles CSV parsing and output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, ledger output)
//! - `sync_reader` - Synchronous CSV reader with iterator interface
//! - `async_reader` - Asynchronous CSV reader with batch reading interface
//! - `rates` - Exchange rate file loading

pub mod async_reader;
pub mod csv_format;
pub mod rates;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{convert_csv_record, write_enrollments_csv, CsvRecord};
pub use rates::load_rate_table;
pub use sync_reader::SyncReader;
