//! Source Failure Tests
//!
//! Tests for commit-on-success when the record source fails mid-scan:
//! - Pages already evaluated in the failing call are discarded
//! - Anchor, key descriptors, keys and records buffers stay byte-identical
//! - Descriptor sizes and the aggregate buffer keep their pre-call state
//! - A retry from the same anchor after recovery completes normally

use std::sync::atomic::{AtomicUsize, Ordering};

use kvpipe::config::ExecutorConfig;
use kvpipe::eval::{AggregateBuffer, AggregateValue};
use kvpipe::executor::{
    split_keys, Anchor, ContainerHandle, ExecutorErrorCode, FetchContext, IoDescriptor,
    KeyDescriptor, ObjectHandle, ObjectId, Page, PipelineExecutor, RecordSource, RunArgs,
    RunStatus, SourceError, SourceResult,
};
use kvpipe::memstore::{MemRecord, MemoryStore};
use kvpipe::pipeline::{Filter, FilterPart, Function, Pipeline};
use kvpipe::types::DataKind;

// =============================================================================
// Helper Functions
// =============================================================================

/// Memory store whose Nth page fetch (1-based, counted across calls) fails
struct FlakyStore {
    inner: MemoryStore,
    fetches: AtomicUsize,
    fail_at: AtomicUsize,
}

impl FlakyStore {
    fn new(records: usize, fail_at: usize) -> Self {
        let records = (0..records)
            .map(|i| {
                MemRecord::new(format!("key-{:02}", i))
                    .with_akey("n", (i as i64).to_le_bytes().to_vec())
            })
            .collect();
        Self {
            inner: MemoryStore::from_records(ObjectId::new(3, 4), records),
            fetches: AtomicUsize::new(0),
            fail_at: AtomicUsize::new(fail_at),
        }
    }

    fn recover(&self) {
        self.fail_at.store(usize::MAX, Ordering::SeqCst);
    }
}

impl RecordSource for FlakyStore {
    type Record = MemRecord;

    fn object_id(&self) -> ObjectId {
        self.inner.object_id()
    }

    fn fetch_page(
        &self,
        ctx: &FetchContext,
        anchor: &Anchor,
        limit: usize,
    ) -> SourceResult<Page<MemRecord>> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_at.load(Ordering::SeqCst) {
            return Err(SourceError::Io(format!("fetch {} failed", n)));
        }
        self.inner.fetch_page(ctx, anchor, limit)
    }

    fn fetch_key(&self, ctx: &FetchContext, dkey: &[u8]) -> SourceResult<Option<MemRecord>> {
        self.inner.fetch_key(ctx, dkey)
    }
}

fn sum_pipeline() -> Pipeline<'static> {
    Pipeline::new()
        .with_filter(
            Filter::aggregation()
                .with_part(FilterPart::akey(b"n", DataKind::Integer))
                .unwrap()
                .with_part(FilterPart::function(Function::Sum))
                .unwrap(),
        )
        .unwrap()
}

fn two_per_fetch() -> PipelineExecutor {
    PipelineExecutor::new(ExecutorConfig {
        fetch_batch: 2,
        log_runs: false,
    })
}

const SENTINEL_KD: KeyDescriptor = KeyDescriptor {
    key_len: 99,
    csum_type: 7,
    csum_len: 9,
};

/// Caller-owned buffers for one call, filled with recognizable bytes
struct CallerBuffers {
    iods: Vec<IoDescriptor>,
    kds: Vec<KeyDescriptor>,
    keys: Vec<u8>,
    records: Vec<u8>,
}

impl CallerBuffers {
    fn new(max_keys: usize) -> Self {
        let mut iod = IoDescriptor::new("n");
        iod.size = 123;
        Self {
            iods: vec![iod],
            kds: vec![SENTINEL_KD; max_keys],
            keys: vec![0xAA; 512],
            records: vec![0xBB; 512],
        }
    }

    fn run(
        &mut self,
        executor: &PipelineExecutor,
        object: &ObjectHandle<FlakyStore>,
        anchor: &mut Anchor,
        aggregates: &mut AggregateBuffer,
    ) -> kvpipe::executor::ExecutorResult<kvpipe::executor::RunReport> {
        let args = RunArgs::new(ContainerHandle::new(), anchor)
            .with_iods(&mut self.iods)
            .with_key_descriptors(&mut self.kds)
            .with_keys(&mut self.keys)
            .with_records(&mut self.records)
            .with_aggregates(aggregates);
        executor.run(object, &sum_pipeline(), args)
    }

    fn assert_untouched(&self, max_keys: usize) {
        assert_eq!(self.iods[0].size, 123);
        assert_eq!(self.kds, vec![SENTINEL_KD; max_keys]);
        assert_eq!(self.keys, vec![0xAA; 512]);
        assert_eq!(self.records, vec![0xBB; 512]);
    }
}

// =============================================================================
// Failure After Successful Pages
// =============================================================================

/// Failure on the third fetch of a fresh scan leaves every buffer as it was.
#[test]
fn test_failure_mid_scan_from_initial_anchor() {
    let executor = two_per_fetch();
    let object = ObjectHandle::new(FlakyStore::new(20, 3));

    let mut anchor = Anchor::new();
    let mut aggregates = AggregateBuffer::new();
    let mut buffers = CallerBuffers::new(64);

    let err = buffers
        .run(&executor, &object, &mut anchor, &mut aggregates)
        .unwrap_err();

    assert_eq!(err.code(), ExecutorErrorCode::Source);
    assert_eq!(object.source().fetches.load(Ordering::SeqCst), 3);
    assert!(anchor.is_initial());
    assert_eq!(aggregates, AggregateBuffer::new());
    buffers.assert_untouched(64);
}

/// Failure in a resumed call keeps the anchor and partial aggregates of the
/// previous successful call; a retry from there completes the scan.
#[test]
fn test_failure_mid_scan_from_positioned_anchor() {
    let executor = two_per_fetch();
    // first call fetches twice, the second call fails on its second fetch
    let object = ObjectHandle::new(FlakyStore::new(20, 4));

    let mut anchor = Anchor::new();
    let mut aggregates = AggregateBuffer::new();
    let mut first = CallerBuffers::new(3);
    let report = first
        .run(&executor, &object, &mut anchor, &mut aggregates)
        .unwrap();
    assert_eq!(report.status, RunStatus::MoreData);
    assert_eq!(report.nr_kds, 3);

    let anchor_before = anchor;
    let aggregates_before = aggregates.clone();
    assert_eq!(aggregates_before.partial(), vec![AggregateValue::Integer(3)]);

    let mut second = CallerBuffers::new(64);
    let err = second
        .run(&executor, &object, &mut anchor, &mut aggregates)
        .unwrap_err();

    assert_eq!(err.code(), ExecutorErrorCode::Source);
    assert_eq!(anchor.as_bytes(), anchor_before.as_bytes());
    assert_eq!(aggregates, aggregates_before);
    assert!(aggregates.results().is_none());
    second.assert_untouched(64);

    object.source().recover();
    let mut retry = CallerBuffers::new(64);
    let report = retry
        .run(&executor, &object, &mut anchor, &mut aggregates)
        .unwrap();
    assert_eq!(report.status, RunStatus::Complete);
    assert_eq!(report.nr_kds, 17);

    let keys = split_keys(&retry.keys[..report.keys_written], &retry.kds[..report.nr_kds]).unwrap();
    assert_eq!(keys[0], b"key-03");
    assert_eq!(
        aggregates.results(),
        Some(vec![AggregateValue::Integer((0..20).sum())])
    );
}
