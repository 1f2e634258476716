//! Pipeline executor subsystem for kvpipe
//!
//! Drives a validated pipeline over one object's records.
//!
//! # Run Flow (strict order)
//!
//! 1. Claim the object handle (one outstanding run per handle)
//! 2. Re-validate the pipeline; nothing is read if it is rejected
//! 3. Enumerate records from the anchor, or fetch the single dkey
//! 4. Apply the condition prefix, then stage output and feed aggregates
//! 5. Stop at end of stream or when the caller's buffers are full
//! 6. Commit output, anchor and aggregate state only on success
//!
//! # Guarantees
//!
//! - Output follows the record source's native order
//! - Resuming from a returned anchor continues exactly where the call stopped
//! - Any error leaves every caller buffer and the anchor untouched

mod anchor;
mod async_run;
mod errors;
mod executor;
mod handle;
mod output;
mod parallel;
mod request;
mod source;

pub use anchor::{Anchor, AnchorState, ANCHOR_BODY_SIZE, ANCHOR_SIZE};
pub use async_run::RunHandle;
pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult, RequiredSize, Severity};
pub use executor::PipelineExecutor;
pub use handle::{ContainerHandle, ObjectHandle, ObjectId, OpFlags, TxHandle};
pub use output::{compute_checksum, split_keys, split_records, LayoutError};
pub use parallel::aggregate_partitions;
pub use request::{
    IoDescriptor, KeyDescriptor, OwnedRunRequest, RunArgs, RunOutcome, RunReport, RunStatus,
    ScanStats, CSUM_CRC32, CSUM_NONE,
};
pub use source::{FetchContext, Page, PageEntry, Record, RecordSource, SourceError, SourceResult};
