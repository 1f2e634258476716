//! Run arguments and report
//!
//! `RunArgs` borrows every caller-owned in/out parameter of one run.
//! Slice lengths are the in-counts; the report carries the out-counts.

use serde::Serialize;

use super::anchor::Anchor;
use super::handle::{ContainerHandle, OpFlags, TxHandle};
use crate::eval::AggregateBuffer;
use crate::pipeline::PipelineDoc;
use crate::types::ByteRange;

/// No checksum follows the key
pub const CSUM_NONE: u32 = 0;
/// A 4-byte little-endian CRC32 follows the key
pub const CSUM_CRC32: u32 = 1;

/// Names one attribute to fetch for every matching record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IoDescriptor {
    pub akey: Vec<u8>,
    pub range: Option<ByteRange>,
    /// Largest value size returned for this attribute by the last run
    pub size: u64,
}

impl IoDescriptor {
    pub fn new(akey: impl Into<Vec<u8>>) -> Self {
        Self {
            akey: akey.into(),
            range: None,
            size: 0,
        }
    }

    /// Returns only `len` bytes starting at `offset` of each value
    pub fn with_range(mut self, offset: usize, len: usize) -> Self {
        self.range = Some(ByteRange::new(offset, len));
        self
    }
}

/// Per-key metadata for the matching-keys buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct KeyDescriptor {
    pub key_len: u64,
    pub csum_type: u32,
    pub csum_len: u32,
}

/// In/out parameters of one run
#[derive(Debug)]
pub struct RunArgs<'r> {
    pub container: ContainerHandle,
    pub tx: Option<TxHandle>,
    pub flags: OpFlags,
    /// Evaluate only this distribution key; no enumeration
    pub dkey: Option<&'r [u8]>,
    pub iods: &'r mut [IoDescriptor],
    pub anchor: &'r mut Anchor,
    /// Length is the maximum number of matching keys to return
    pub key_descriptors: &'r mut [KeyDescriptor],
    pub keys: Option<&'r mut [u8]>,
    pub records: Option<&'r mut [u8]>,
    pub aggregates: Option<&'r mut AggregateBuffer>,
}

impl<'r> RunArgs<'r> {
    /// Arguments for a scan that returns no matching output
    pub fn new(container: ContainerHandle, anchor: &'r mut Anchor) -> Self {
        Self {
            container,
            tx: None,
            flags: OpFlags::NONE,
            dkey: None,
            iods: &mut [],
            anchor,
            key_descriptors: &mut [],
            keys: None,
            records: None,
            aggregates: None,
        }
    }

    pub fn with_tx(mut self, tx: TxHandle) -> Self {
        self.tx = Some(tx);
        self
    }

    pub fn with_flags(mut self, flags: OpFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_dkey(mut self, dkey: &'r [u8]) -> Self {
        self.dkey = Some(dkey);
        self
    }

    pub fn with_iods(mut self, iods: &'r mut [IoDescriptor]) -> Self {
        self.iods = iods;
        self
    }

    pub fn with_key_descriptors(mut self, kds: &'r mut [KeyDescriptor]) -> Self {
        self.key_descriptors = kds;
        self
    }

    pub fn with_keys(mut self, keys: &'r mut [u8]) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_records(mut self, records: &'r mut [u8]) -> Self {
        self.records = Some(records);
        self
    }

    pub fn with_aggregates(mut self, aggregates: &'r mut AggregateBuffer) -> Self {
        self.aggregates = Some(aggregates);
        self
    }

    /// True when the caller asked for matching keys or records
    pub fn wants_output(&self) -> bool {
        !self.key_descriptors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// End of stream reached; aggregate results are final
    Complete,
    /// Output capacity reached; resume from the returned anchor
    MoreData,
}

/// Record counts for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScanStats {
    pub scanned: u64,
    pub qualifying: u64,
    pub excluded: u64,
    /// Qualifying records an aggregate could not use
    pub aggregate_skips: u64,
}

/// Out-counts of one successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub nr_kds: usize,
    pub nr_iods: usize,
    pub keys_written: usize,
    pub records_written: usize,
    pub stats: ScanStats,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Complete
    }
}

/// Self-contained run request for asynchronous execution
#[derive(Debug, Clone)]
pub struct OwnedRunRequest {
    pub pipeline: PipelineDoc,
    pub container: ContainerHandle,
    pub tx: Option<TxHandle>,
    pub flags: OpFlags,
    pub dkey: Option<Vec<u8>>,
    pub iods: Vec<IoDescriptor>,
    /// Copy of the caller's cursor; the caller's own copy is never touched
    pub anchor: Anchor,
    pub max_keys: usize,
    pub keys_capacity: usize,
    pub records_capacity: usize,
    pub aggregates: Option<AggregateBuffer>,
}

impl OwnedRunRequest {
    pub fn new(pipeline: PipelineDoc, container: ContainerHandle, anchor: Anchor) -> Self {
        Self {
            pipeline,
            container,
            tx: None,
            flags: OpFlags::NONE,
            dkey: None,
            iods: Vec::new(),
            anchor,
            max_keys: 0,
            keys_capacity: 0,
            records_capacity: 0,
            aggregates: None,
        }
    }

    /// Requests up to `max_keys` matching keys and records
    pub fn with_output(mut self, max_keys: usize, keys_capacity: usize, records_capacity: usize) -> Self {
        self.max_keys = max_keys;
        self.keys_capacity = keys_capacity;
        self.records_capacity = records_capacity;
        self
    }
}

/// Everything a successful owned run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub anchor: Anchor,
    pub iods: Vec<IoDescriptor>,
    /// Only the descriptors that were written
    pub key_descriptors: Vec<KeyDescriptor>,
    /// Only the bytes that were written
    pub keys: Vec<u8>,
    pub records: Vec<u8>,
    pub aggregates: Option<AggregateBuffer>,
}
