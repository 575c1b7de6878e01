// CLI module
// Command-line interface and argument parsing

mod args;

pub use args::{CliArgs, LogFormat, StrategyType};

use clap::Parser;

/// Parse command-line arguments
///
/// Exits the process with a usage message on invalid arguments.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
