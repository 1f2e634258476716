//! In-memory record source
//!
//! Records are enumerated in insertion order. The anchor body is the
//! little-endian u64 index of the next record to return.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::executor::{
    Anchor, AnchorState, FetchContext, ObjectId, Page, PageEntry, Record, RecordSource,
    SourceError, SourceResult,
};

/// One distribution key and its attribute values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemRecord {
    dkey: Vec<u8>,
    akeys: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemRecord {
    pub fn new(dkey: impl Into<Vec<u8>>) -> Self {
        Self {
            dkey: dkey.into(),
            akeys: BTreeMap::new(),
        }
    }

    pub fn with_akey(mut self, name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.set_akey(name, value);
        self
    }

    pub fn set_akey(&mut self, name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.akeys.insert(name.into(), value.into());
    }

    pub fn akey_count(&self) -> usize {
        self.akeys.len()
    }
}

impl Record for MemRecord {
    fn dkey(&self) -> &[u8] {
        &self.dkey
    }

    fn akey(&self, name: &[u8]) -> Option<&[u8]> {
        self.akeys.get(name).map(Vec::as_slice)
    }
}

/// Record source over an in-memory vector
#[derive(Debug)]
pub struct MemoryStore {
    oid: ObjectId,
    records: Vec<MemRecord>,
    last_context: Mutex<Option<FetchContext>>,
    fetches: AtomicU64,
}

impl MemoryStore {
    pub fn new(oid: ObjectId) -> Self {
        Self::from_records(oid, Vec::new())
    }

    pub fn from_records(oid: ObjectId, records: Vec<MemRecord>) -> Self {
        Self {
            oid,
            records,
            last_context: Mutex::new(None),
            fetches: AtomicU64::new(0),
        }
    }

    /// Appends a record at the end of enumeration order
    pub fn insert(&mut self, record: MemRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[MemRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of `fetch_page` and `fetch_key` calls served
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Context passed with the most recent fetch
    pub fn last_context(&self) -> Option<FetchContext> {
        self.last_context.lock().ok().and_then(|guard| *guard)
    }

    fn note_fetch(&self, ctx: &FetchContext) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_context.lock() {
            *guard = Some(*ctx);
        }
    }

    fn position(&self, anchor: &Anchor) -> SourceResult<usize> {
        let index = match anchor.state() {
            AnchorState::Initial => 0,
            AnchorState::Eof => self.records.len(),
            AnchorState::Positioned => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&anchor.body()[..8]);
                u64::from_le_bytes(raw) as usize
            }
            AnchorState::Unknown(tag) => {
                return Err(SourceError::InvalidAnchor(format!("unknown tag {}", tag)))
            }
        };
        if index > self.records.len() {
            return Err(SourceError::InvalidAnchor(format!(
                "index {} past {} records",
                index,
                self.records.len()
            )));
        }
        Ok(index)
    }
}

fn anchor_at(index: usize) -> Anchor {
    Anchor::at(&(index as u64).to_le_bytes())
}

impl RecordSource for MemoryStore {
    type Record = MemRecord;

    fn object_id(&self) -> ObjectId {
        self.oid
    }

    fn fetch_page(
        &self,
        ctx: &FetchContext,
        anchor: &Anchor,
        limit: usize,
    ) -> SourceResult<Page<MemRecord>> {
        self.note_fetch(ctx);
        let start = self.position(anchor)?;
        let end = start.saturating_add(limit).min(self.records.len());

        let entries = self.records[start..end]
            .iter()
            .enumerate()
            .map(|(i, record)| PageEntry {
                record: record.clone(),
                resume: anchor_at(start + i + 1),
            })
            .collect();
        let next = if end == self.records.len() {
            Anchor::eof()
        } else {
            anchor_at(end)
        };

        Ok(Page { entries, next })
    }

    fn fetch_key(&self, ctx: &FetchContext, dkey: &[u8]) -> SourceResult<Option<MemRecord>> {
        self.note_fetch(ctx);
        Ok(self.records.iter().find(|r| r.dkey == dkey).cloned())
    }
}
