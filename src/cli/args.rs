use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay a course enrollment payment feed and print the resulting ledger
#[derive(Parser, Debug)]
#[command(name = "course-ledger")]
#[command(
    about = "Replay enrollment payment commands and print the enrollment ledger",
    long_about = None
)]
pub struct CliArgs {
    /// Input CSV file path containing ledger commands
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Processing strategy for the feed
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for synchronous or 'async' for asynchronous"
    )]
    pub strategy: StrategyType,

    /// Number of commands per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Worker threads for batch processing (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Number of worker threads processing a batch (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Exchange rate file
    #[arg(
        long = "rates",
        value_name = "RATES",
        help = "CSV file of 'currency,rate' pairs per USD (default: built-in table)"
    )]
    pub rates_file: Option<PathBuf>,

    /// Log output format
    #[arg(
        long = "log-format",
        value_name = "FORMAT",
        default_value = "text",
        help = "Log format on stderr: 'text' or 'json' (level set by RUST_LOG)"
    )]
    pub log_format: LogFormat,
}

/// Available processing strategies
#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

/// Log line formats written to stderr
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values take their defaults; zero values are replaced by
    /// `BatchConfig::new` with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }
}
