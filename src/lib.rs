//! kvpipe - predicate and aggregation pushdown over key-value objects
//!
//! A pipeline of condition and aggregation filters is validated once,
//! then evaluated record by record next to the data. Only matching keys,
//! requested attribute values and aggregate results leave the engine.

pub mod cli;
pub mod config;
pub mod eval;
pub mod executor;
pub mod memstore;
pub mod observability;
pub mod pipeline;
pub mod types;
