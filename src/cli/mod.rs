//! CLI module for kvpipe
//!
//! Provides command-line interface for:
//! - check: Validate a pipeline document
//! - run: Execute a pipeline over a dataset document

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, RunOptions};
pub use commands::{check, run, run_command, run_pipeline};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_document, write_error, write_response};
