//! Record source boundary
//!
//! The storage engine behind an object is external. The executor sees it
//! only through `RecordSource`: paged enumeration from an anchor, point
//! lookup by distribution key, and attribute resolution on each record.

use thiserror::Error;

use super::anchor::Anchor;
use super::handle::{ContainerHandle, ObjectId, OpFlags, TxHandle};
use crate::eval::KeyResolver;
use crate::pipeline::KeyRef;

/// Result type for record source calls
pub type SourceResult<T> = Result<T, SourceError>;

/// Failures reported by a record source; propagated verbatim
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Storage I/O failed
    #[error("Record source I/O failure: {0}")]
    Io(String),

    /// Storage state is inconsistent
    #[error("Record source inconsistent: {0}")]
    Inconsistent(String),

    /// Anchor body was not produced by this source
    #[error("Anchor not recognized by record source: {0}")]
    InvalidAnchor(String),

    /// Source cannot serve requests right now
    #[error("Record source unavailable: {0}")]
    Unavailable(String),
}

/// One stored record: a distribution key and its attribute values
pub trait Record {
    fn dkey(&self) -> &[u8];

    /// Value of the named attribute, or None if absent
    fn akey(&self, name: &[u8]) -> Option<&[u8]>;
}

/// Handles passed through to every source call, unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchContext {
    pub container: ContainerHandle,
    pub tx: Option<TxHandle>,
    pub flags: OpFlags,
}

/// A record and the anchor positioned just after it
#[derive(Debug, Clone)]
pub struct PageEntry<R> {
    pub record: R,
    pub resume: Anchor,
}

/// One batch of records in native enumeration order
#[derive(Debug, Clone)]
pub struct Page<R> {
    pub entries: Vec<PageEntry<R>>,
    /// Anchor after the last entry; EOF once the object is exhausted
    pub next: Anchor,
}

impl<R> Page<R> {
    pub fn is_last(&self) -> bool {
        self.next.is_eof()
    }
}

/// Storage-side enumeration of one object's records
pub trait RecordSource {
    type Record: Record;

    fn object_id(&self) -> ObjectId;

    /// Returns up to `limit` records starting at `anchor`.
    ///
    /// Enumeration order must be stable across calls over unchanged data.
    fn fetch_page(
        &self,
        ctx: &FetchContext,
        anchor: &Anchor,
        limit: usize,
    ) -> SourceResult<Page<Self::Record>>;

    /// Looks up a single record by distribution key
    fn fetch_key(&self, ctx: &FetchContext, dkey: &[u8]) -> SourceResult<Option<Self::Record>>;
}

/// Resolves filter leaves against one record
pub(crate) struct RecordView<'r, R> {
    oid: &'r [u8],
    record: &'r R,
}

impl<'r, R: Record> RecordView<'r, R> {
    pub(crate) fn new(oid: &'r [u8], record: &'r R) -> Self {
        Self { oid, record }
    }
}

impl<R: Record> KeyResolver for RecordView<'_, R> {
    fn resolve(&self, key: &KeyRef<'_>) -> Option<&[u8]> {
        match key {
            KeyRef::ObjectId => Some(self.oid),
            KeyRef::DistributionKey => Some(self.record.dkey()),
            KeyRef::AttributeKey(name) => self.record.akey(name),
        }
    }
}
