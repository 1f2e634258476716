//! Container, transaction and object handles
//!
//! Container and transaction handles are opaque tokens owned by the
//! caller; the executor only forwards them to the record source. An
//! object handle owns the source and admits one outstanding run at a time.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{ExecutorError, ExecutorResult};
use super::source::RecordSource;

/// 128-bit object identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectId {
    pub hi: u64,
    pub lo: u64,
}

impl ObjectId {
    pub fn new(hi: u64, lo: u64) -> Self {
        Self { hi, lo }
    }

    /// Bytes an `oid` leaf sees: `hi` then `lo`, little-endian
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.hi.to_le_bytes());
        out[8..].copy_from_slice(&self.lo.to_le_bytes());
        out
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.hi, self.lo)
    }
}

/// Open container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerHandle(Uuid);

impl ContainerHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ContainerHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Transaction the run reads under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHandle(pub u64);

/// Conditional-operation bits, forwarded unmodified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpFlags(pub u64);

impl OpFlags {
    pub const NONE: OpFlags = OpFlags(0);

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn contains(&self, other: OpFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Shared handle to one object's record source
pub struct ObjectHandle<S> {
    source: Arc<S>,
    busy: Arc<AtomicBool>,
}

impl<S> Clone for ObjectHandle<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            busy: Arc::clone(&self.busy),
        }
    }
}

impl<S: RecordSource> ObjectHandle<S> {
    pub fn new(source: S) -> Self {
        Self::from_arc(Arc::new(source))
    }

    pub fn from_arc(source: Arc<S>) -> Self {
        Self {
            source,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn id(&self) -> ObjectId {
        self.source.object_id()
    }

    /// True while a run holds this handle
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claims the handle for one run; released when the guard drops
    pub(crate) fn acquire(&self) -> ExecutorResult<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExecutorError::busy())?;
        Ok(BusyGuard {
            flag: Arc::clone(&self.busy),
        })
    }
}

/// Marks an object handle busy for its lifetime
pub(crate) struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorErrorCode;
    use crate::memstore::MemoryStore;

    #[test]
    fn test_object_id_bytes() {
        let oid = ObjectId::new(1, 2);
        let bytes = oid.to_bytes();
        assert_eq!(&bytes[..8], &1u64.to_le_bytes());
        assert_eq!(&bytes[8..], &2u64.to_le_bytes());
        assert_eq!(oid.to_string(), "1.2");
    }

    #[test]
    fn test_containers_distinct() {
        assert_ne!(ContainerHandle::new(), ContainerHandle::new());
    }

    #[test]
    fn test_flags_contains() {
        let flags = OpFlags(0b101);
        assert!(flags.contains(OpFlags(0b100)));
        assert!(!flags.contains(OpFlags(0b010)));
        assert!(flags.contains(OpFlags::NONE));
    }

    #[test]
    fn test_one_run_at_a_time() {
        let handle = ObjectHandle::new(MemoryStore::new(ObjectId::new(0, 1)));
        let other = handle.clone();

        let guard = handle.acquire().unwrap();
        assert!(other.is_busy());
        let err = other.acquire().err().unwrap();
        assert_eq!(err.code(), ExecutorErrorCode::Busy);

        drop(guard);
        assert!(!handle.is_busy());
        assert!(other.acquire().is_ok());
    }
}
