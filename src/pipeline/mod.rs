//! Pipeline model for kvpipe
//!
//! A pipeline is a versioned list of filters; each filter is a postfix
//! expression over filter parts. Construction is append-only and never
//! type-checks. `PipelineValidator` checks structure before any record
//! is touched, and the executor re-runs it on every call.
//!
//! Condition filters form a prefix that narrows the record stream.
//! Aggregation filters form a suffix of siblings that each read that
//! same narrowed stream; adjacency in the list is grouping, not data flow.

mod document;
mod errors;
mod filter;
mod part;
mod validator;

pub use document::{FilterDoc, PartDoc, PipelineDoc, ValueBytes};
pub use errors::{PipelineError, PipelineErrorCode, PipelineResult, Severity};
pub use filter::{Filter, FilterKind, Pipeline, PIPELINE_VERSION};
pub use part::{FilterPart, Function, KeyRef};
pub use validator::{PipelinePlan, PipelineValidator};
