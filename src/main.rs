//! Course Payment Ledger CLI
//!
//! Replays a CSV feed of enrollment and payment commands and prints the
//! final enrollment ledger.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- ledger.csv > enrollments.csv
//! cargo run -- --strategy sync ledger.csv > enrollments.csv
//! cargo run -- --rates rates.csv --log-format json ledger.csv > enrollments.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 ledger.csv > enrollments.csv
//! ```
//!
//! # Processing Strategies
//!
//! - **sync**: Streaming CSV parsing with single-threaded processing
//! - **async**: Batch processing partitioned by enrollment across worker threads (default)
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (file not found, unreadable rates file, output failure, etc.)

use course_payment_ledger::cli;
use course_payment_ledger::core::RateTable;
use course_payment_ledger::io::load_rate_table;
use course_payment_ledger::logging;
use course_payment_ledger::strategy;
use std::process;
use std::sync::Arc;
use tracing::error;

fn main() {
    let args = cli::parse_args();
    logging::init(args.log_format);

    let rates = match &args.rates_file {
        Some(path) => match load_rate_table(path) {
            Ok(table) => table,
            Err(e) => {
                error!("{}", e);
                process::exit(1);
            }
        },
        None => RateTable::default(),
    };

    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy.clone(), config, Arc::new(rates))
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        error!("{}", e);
        process::exit(1);
    }
}
