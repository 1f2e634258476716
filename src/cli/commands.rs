//! CLI command implementations
//!
//! Each command builds its response as a JSON value; `run_command`
//! writes it to stdout. Errors are written as a JSON error object and
//! then returned so the process exits non-zero.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use crate::config::ExecutorConfig;
use crate::eval::AggregateBuffer;
use crate::executor::{
    split_keys, split_records, Anchor, ContainerHandle, IoDescriptor, ObjectHandle,
    OwnedRunRequest, PipelineExecutor, ScanStats,
};
use crate::memstore::Dataset;
use crate::observability::{log_event, Event};
use crate::pipeline::{PipelineDoc, PipelineValidator};

use super::args::{Command, RunOptions};
use super::errors::{CliError, CliResult};
use super::io::{read_document, write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command and write its response
pub fn run_command(cmd: Command) -> CliResult<()> {
    let result = match cmd {
        Command::Check { pipeline } => check(&pipeline),
        Command::Run(opts) => run_pipeline(&opts),
    };
    match result {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Validate a pipeline document
pub fn check(pipeline_path: &Path) -> CliResult<Value> {
    let doc: PipelineDoc = read_document(pipeline_path)?;
    let pipeline = doc.to_pipeline()?;

    PipelineExecutor::default()
        .check(&pipeline)
        .map_err(CliError::pipeline_rejected)?;
    let plan = PipelineValidator::analyze(&pipeline)?;

    Ok(json!({
        "valid": true,
        "version": pipeline.version(),
        "filters": pipeline.len(),
        "conditions": plan.conditions(),
        "aggregates": plan.aggregates(),
        "max_depth": plan.max_depth(),
    }))
}

/// Run a pipeline over a dataset, paging until end of stream
pub fn run_pipeline(opts: &RunOptions) -> CliResult<Value> {
    let config = match &opts.config {
        Some(path) => {
            let config = ExecutorConfig::load(path)?;
            if config.log_runs {
                let batch = config.fetch_batch.to_string();
                log_event(Event::ConfigLoaded, &[("fetch_batch", &batch)]);
            }
            config
        }
        None => ExecutorConfig::default(),
    };
    let doc: PipelineDoc = read_document(&opts.pipeline)?;
    let dataset: Dataset = read_document(&opts.data)?;

    let executor = PipelineExecutor::new(config);
    let object = ObjectHandle::new(dataset.into_store());
    let container = ContainerHandle::new();
    let iods: Vec<IoDescriptor> = opts
        .akeys
        .iter()
        .map(|name| IoDescriptor::new(name.as_bytes()))
        .collect();
    let records_capacity = if iods.is_empty() {
        0
    } else {
        opts.records_capacity
    };

    let mut anchor = Anchor::new();
    let mut aggregates = Some(AggregateBuffer::new());
    let mut keys = Vec::new();
    let mut records = Vec::new();
    let mut stats = ScanStats::default();
    let mut calls = 0u64;

    loop {
        let mut request = OwnedRunRequest::new(doc.clone(), container, anchor).with_output(
            opts.max_keys,
            opts.keys_capacity,
            records_capacity,
        );
        request.iods = iods.clone();
        request.dkey = opts.dkey.clone().map(String::into_bytes);
        request.aggregates = aggregates.take();

        let outcome = executor.run_owned(&object, request)?;
        calls += 1;

        let page_keys = split_keys(&outcome.keys, &outcome.key_descriptors)
            .map_err(CliError::run_failed)?;
        keys.extend(
            page_keys
                .iter()
                .map(|k| String::from_utf8_lossy(k).into_owned()),
        );
        if !iods.is_empty() {
            let page_records = split_records(&outcome.records, outcome.report.nr_kds, iods.len())
                .map_err(CliError::run_failed)?;
            records.extend(page_records.into_iter().map(|values| {
                values
                    .into_iter()
                    .map(|v| STANDARD.encode(v))
                    .collect::<Vec<_>>()
            }));
        }

        stats.scanned += outcome.report.stats.scanned;
        stats.qualifying += outcome.report.stats.qualifying;
        stats.excluded += outcome.report.stats.excluded;
        stats.aggregate_skips += outcome.report.stats.aggregate_skips;
        aggregates = outcome.aggregates;

        if outcome.report.is_complete() {
            break;
        }
        anchor = outcome.anchor;
    }

    let results = aggregates
        .as_ref()
        .and_then(AggregateBuffer::results)
        .unwrap_or_default();

    Ok(json!({
        "calls": calls,
        "keys": keys,
        "records": records,
        "aggregates": results,
        "stats": stats,
        "metrics": executor.metrics().snapshot(),
    }))
}
