//! CLI argument definitions using clap
//!
//! Commands:
//! - kvpipe check --pipeline <path>
//! - kvpipe run --pipeline <path> --data <path> [--config <path>] [--akey <name>]...

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// kvpipe - predicate and aggregation pushdown over key-value objects
#[derive(Parser, Debug)]
#[command(name = "kvpipe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a pipeline document without running it
    Check {
        /// Path to pipeline JSON
        #[arg(long)]
        pipeline: PathBuf,
    },

    /// Run a pipeline over a dataset to end of stream
    Run(RunOptions),
}

#[derive(Args, Debug, Clone)]
pub struct RunOptions {
    /// Path to pipeline JSON
    #[arg(long)]
    pub pipeline: PathBuf,

    /// Path to dataset JSON
    #[arg(long)]
    pub data: PathBuf,

    /// Path to executor configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Matching keys returned per call; 0 returns aggregates only
    #[arg(long, default_value_t = 64)]
    pub max_keys: usize,

    /// Keys buffer size per call, in bytes
    #[arg(long, default_value_t = 4096)]
    pub keys_capacity: usize,

    /// Records buffer size per call, in bytes
    #[arg(long, default_value_t = 65536)]
    pub records_capacity: usize,

    /// Evaluate only this distribution key
    #[arg(long)]
    pub dkey: Option<String>,

    /// Attribute to return for each matching key (repeatable)
    #[arg(long = "akey")]
    pub akeys: Vec<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
