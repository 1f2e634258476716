//! Pipeline run driver
//!
//! Run flow (strict order):
//! 1. Claim the object handle
//! 2. Re-validate the pipeline
//! 3. Seed or resume the aggregate state
//! 4. Enumerate records from the anchor (or fetch the single dkey)
//! 5. Condition prefix per record, short-circuit on first false
//! 6. Stage matching output until the caller's capacity is reached
//! 7. Feed every qualifying record to each aggregation filter
//! 8. Commit output, anchor and aggregates only on success

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::anchor::Anchor;
use super::errors::{ExecutorError, ExecutorErrorCode, ExecutorResult};
use super::handle::ObjectHandle;
use super::output::{OutputStage, Staged};
use super::request::{
    IoDescriptor, KeyDescriptor, OwnedRunRequest, RunArgs, RunOutcome, RunReport, RunStatus,
    ScanStats,
};
use super::source::{FetchContext, Record, RecordSource, RecordView, SourceError};
use crate::config::ExecutorConfig;
use crate::eval::{AggregateBuffer, Evaluator};
use crate::observability::{render_event, Event, Logger, MetricsRegistry, ObservationScope};
use crate::pipeline::{Filter, Pipeline, PipelinePlan, PipelineValidator};

/// What the scan does after one record
enum Visit {
    Continue,
    /// Record did not fit; leave it for the next call
    Stop,
}

/// Borrowed per-run state shared by every record
struct ScanState<'p, 'a> {
    conditions: &'p [Filter<'a>],
    aggregations: &'p [Filter<'a>],
    oid: [u8; 16],
    evaluator: Evaluator,
    stage: Option<OutputStage>,
    aggregates: Option<AggregateBuffer>,
    stats: ScanStats,
}

impl ScanState<'_, '_> {
    fn visit<R: Record>(&mut self, record: &R, iods: &[IoDescriptor]) -> ExecutorResult<Visit> {
        let view = RecordView::new(&self.oid, record);

        let mut qualifies = true;
        for filter in self.conditions {
            // Evaluation errors exclude the record
            if !matches!(self.evaluator.evaluate_condition(filter.parts(), &view), Ok(true)) {
                qualifies = false;
                break;
            }
        }
        if !qualifies {
            self.stats.scanned += 1;
            self.stats.excluded += 1;
            return Ok(Visit::Continue);
        }

        if let Some(stage) = self.stage.as_mut() {
            if let Staged::Full(need) = stage.try_push(record, iods) {
                if stage.is_empty() {
                    return Err(ExecutorError::capacity(need));
                }
                return Ok(Visit::Stop);
            }
        }
        self.stats.scanned += 1;
        self.stats.qualifying += 1;

        if let Some(buffer) = self.aggregates.as_mut() {
            for (filter, acc) in self.aggregations.iter().zip(buffer.accumulators_mut()) {
                if self.evaluator.accumulate(filter.parts(), &view, acc).is_err() {
                    self.stats.aggregate_skips += 1;
                }
            }
        }
        Ok(Visit::Continue)
    }
}

/// Executes validated pipelines against record sources
#[derive(Debug, Clone, Default)]
pub struct PipelineExecutor {
    config: ExecutorConfig,
    metrics: Arc<MetricsRegistry>,
}

impl PipelineExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self::with_metrics(config, Arc::new(MetricsRegistry::new()))
    }

    /// Executor reporting into a shared registry
    pub fn with_metrics(config: ExecutorConfig, metrics: Arc<MetricsRegistry>) -> Self {
        Self { config, metrics }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Validates a pipeline without touching any record
    pub fn check(&self, pipeline: &Pipeline<'_>) -> ExecutorResult<()> {
        PipelineValidator::check(pipeline).map_err(|e| {
            let err = ExecutorError::from_pipeline(e);
            self.log(
                Event::CheckRejected,
                &[("code", err.code().code()), ("reason", err.message())],
            );
            err
        })
    }

    /// Runs `pipeline` over one object, blocking until done.
    ///
    /// On success the anchor, output buffers, descriptor sizes and
    /// aggregate buffer in `args` are updated. On any error none of them
    /// are touched.
    pub fn run<S: RecordSource>(
        &self,
        object: &ObjectHandle<S>,
        pipeline: &Pipeline<'_>,
        args: RunArgs<'_>,
    ) -> ExecutorResult<RunReport> {
        let never = AtomicBool::new(false);
        self.run_cancellable(object, pipeline, args, &never)
    }

    /// Runs an owned request, returning owned output
    pub fn run_owned<S: RecordSource>(
        &self,
        object: &ObjectHandle<S>,
        request: OwnedRunRequest,
    ) -> ExecutorResult<RunOutcome> {
        let _guard = object.acquire()?;
        let never = AtomicBool::new(false);
        self.run_owned_acquired(object.source(), request, &never)
    }

    pub(crate) fn run_cancellable<S: RecordSource>(
        &self,
        object: &ObjectHandle<S>,
        pipeline: &Pipeline<'_>,
        args: RunArgs<'_>,
        cancel: &AtomicBool,
    ) -> ExecutorResult<RunReport> {
        let _guard = object.acquire()?;
        self.run_acquired(object.source(), pipeline, args, cancel)
    }

    /// Owned-request body; caller holds the object's busy guard
    pub(crate) fn run_owned_acquired<S: RecordSource>(
        &self,
        source: &S,
        request: OwnedRunRequest,
        cancel: &AtomicBool,
    ) -> ExecutorResult<RunOutcome> {
        let pipeline = request
            .pipeline
            .to_pipeline()
            .map_err(ExecutorError::from_pipeline)?;

        let mut anchor = request.anchor;
        let mut iods = request.iods;
        let mut kds = vec![KeyDescriptor::default(); request.max_keys];
        let mut keys = vec![0u8; request.keys_capacity];
        let mut records = vec![0u8; request.records_capacity];
        let mut aggregates = request.aggregates;

        let mut args = RunArgs::new(request.container, &mut anchor)
            .with_flags(request.flags)
            .with_iods(&mut iods)
            .with_key_descriptors(&mut kds);
        args.tx = request.tx;
        if let Some(dkey) = request.dkey.as_deref() {
            args = args.with_dkey(dkey);
        }
        if request.keys_capacity > 0 {
            args = args.with_keys(&mut keys);
        }
        if request.records_capacity > 0 {
            args = args.with_records(&mut records);
        }
        if let Some(buffer) = aggregates.as_mut() {
            args = args.with_aggregates(buffer);
        }

        let report = self.run_acquired(source, &pipeline, args, cancel)?;

        kds.truncate(report.nr_kds);
        keys.truncate(report.keys_written);
        records.truncate(report.records_written);
        Ok(RunOutcome {
            report,
            anchor,
            iods,
            key_descriptors: kds,
            keys,
            records,
            aggregates,
        })
    }

    /// Run body; caller holds the object's busy guard
    pub(crate) fn run_acquired<S: RecordSource>(
        &self,
        source: &S,
        pipeline: &Pipeline<'_>,
        mut args: RunArgs<'_>,
        cancel: &AtomicBool,
    ) -> ExecutorResult<RunReport> {
        self.metrics.increment_runs_started();
        let scope = self.config.log_runs.then(|| {
            ObservationScope::with_fields(
                "PIPELINE_RUN",
                &[
                    ("object", source.object_id().to_string()),
                    ("filters", pipeline.len().to_string()),
                ],
            )
        });

        let result = self.execute(source, pipeline, &mut args, cancel);

        match &result {
            Ok(report) => {
                self.metrics.increment_runs_completed();
                self.metrics.add_records(
                    report.stats.scanned,
                    report.stats.qualifying,
                    report.stats.excluded,
                );
                if report.status == RunStatus::MoreData {
                    let kds = report.nr_kds.to_string();
                    self.log(Event::RunMoreData, &[("nr_kds", &kds)]);
                }
                if let Some(scope) = scope {
                    let scanned = report.stats.scanned.to_string();
                    let qualifying = report.stats.qualifying.to_string();
                    scope.complete_with_fields(&[
                        ("scanned", &scanned),
                        ("qualifying", &qualifying),
                    ]);
                }
            }
            Err(err) => {
                self.metrics.increment_runs_failed();
                self.note_failure(err);
                if let Some(scope) = scope {
                    scope.fail(err.code().code(), err.message());
                }
            }
        }

        result
    }

    /// Writes `event` to the log when run logging is enabled
    pub(crate) fn log(&self, event: Event, fields: &[(&str, &str)]) {
        if let Some(line) = self.event_line(event, fields) {
            Logger::write_line(&line);
        }
    }

    fn event_line(&self, event: Event, fields: &[(&str, &str)]) -> Option<String> {
        self.config.log_runs.then(|| render_event(event, fields))
    }

    fn note_failure(&self, err: &ExecutorError) {
        let fields = [("reason", err.message())];
        match err.code() {
            ExecutorErrorCode::Capacity => {
                self.metrics.increment_capacity_errors();
                self.log(Event::CapacityShort, &fields);
            }
            ExecutorErrorCode::Cancelled => {
                self.metrics.increment_cancellations();
                self.log(Event::RunCancelled, &fields);
            }
            ExecutorErrorCode::Source => self.log(Event::SourceFailed, &fields),
            ExecutorErrorCode::InvalidPipeline | ExecutorErrorCode::Version => {
                self.log(Event::CheckRejected, &fields)
            }
            _ => {}
        }
    }

    fn execute<S: RecordSource>(
        &self,
        source: &S,
        pipeline: &Pipeline<'_>,
        args: &mut RunArgs<'_>,
        cancel: &AtomicBool,
    ) -> ExecutorResult<RunReport> {
        let plan = PipelineValidator::analyze(pipeline).map_err(ExecutorError::from_pipeline)?;
        let (conditions, aggregations) = pipeline.filters().split_at(plan.conditions());

        let aggregates = match args.aggregates.as_deref() {
            Some(buffer) => Some(Self::seed_aggregates(buffer, &plan, args)?),
            None => None,
        };

        let ctx = FetchContext {
            container: args.container,
            tx: args.tx,
            flags: args.flags,
        };
        let mut state = ScanState {
            conditions,
            aggregations,
            oid: source.object_id().to_bytes(),
            evaluator: Evaluator::new(plan.max_depth()),
            stage: args.wants_output().then(|| OutputStage::for_args(args)),
            aggregates,
            stats: ScanStats::default(),
        };
        let mut cursor = *args.anchor;

        let status = if let Some(dkey) = args.dkey {
            // Single key: no enumeration, anchor untouched
            let record = source
                .fetch_key(&ctx, dkey)
                .map_err(ExecutorError::source_failed)?;
            if let Some(record) = record {
                state.visit(&record, args.iods)?;
            }
            if let Some(buffer) = state.aggregates.as_mut() {
                buffer.mark_complete();
            }
            RunStatus::Complete
        } else if cursor.is_eof() {
            RunStatus::Complete
        } else {
            self.scan(source, &ctx, &mut state, &mut cursor, args.iods, cancel)?
        };

        // Commit
        let (nr_kds, keys_written, records_written) = match state.stage {
            Some(stage) => stage.commit(args),
            None => (0, 0, 0),
        };
        *args.anchor = cursor;
        if let (Some(dst), Some(src)) = (args.aggregates.as_deref_mut(), state.aggregates) {
            *dst = src;
        }

        Ok(RunReport {
            status,
            nr_kds,
            nr_iods: if args.wants_output() { args.iods.len() } else { 0 },
            keys_written,
            records_written,
            stats: state.stats,
        })
    }

    fn scan<S: RecordSource>(
        &self,
        source: &S,
        ctx: &FetchContext,
        state: &mut ScanState<'_, '_>,
        cursor: &mut Anchor,
        iods: &[IoDescriptor],
        cancel: &AtomicBool,
    ) -> ExecutorResult<RunStatus> {
        loop {
            if cancel.load(Ordering::Acquire) {
                return Err(ExecutorError::cancelled());
            }
            let page = source
                .fetch_page(ctx, cursor, self.config.fetch_batch)
                .map_err(ExecutorError::source_failed)?;
            if cancel.load(Ordering::Acquire) {
                return Err(ExecutorError::cancelled());
            }

            if page.entries.is_empty() && !page.is_last() && page.next == *cursor {
                return Err(ExecutorError::source_failed(SourceError::Inconsistent(
                    "page made no progress".to_string(),
                )));
            }

            for entry in &page.entries {
                match state.visit(&entry.record, iods)? {
                    Visit::Continue => *cursor = entry.resume,
                    Visit::Stop => return Ok(RunStatus::MoreData),
                }
            }

            if page.is_last() {
                *cursor = Anchor::eof();
                if let Some(buffer) = state.aggregates.as_mut() {
                    buffer.mark_complete();
                }
                return Ok(RunStatus::Complete);
            }
            *cursor = page.next;
        }
    }

    /// Working copy of the caller's aggregate state for this run
    fn seed_aggregates(
        buffer: &AggregateBuffer,
        plan: &PipelinePlan,
        args: &RunArgs<'_>,
    ) -> ExecutorResult<AggregateBuffer> {
        if args.dkey.is_some() || args.anchor.is_initial() {
            let mut fresh = AggregateBuffer::new();
            fresh.seed(plan.aggregates());
            return Ok(fresh);
        }
        if !buffer.is_seeded_for(plan.aggregates()) {
            return Err(ExecutorError::invalid_argument(
                "Aggregate buffer was not seeded for this pipeline; restart from the initial anchor",
            ));
        }
        Ok(buffer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::AggregateValue;
    use crate::executor::handle::{ContainerHandle, ObjectId};
    use crate::executor::source::{Page, PageEntry, SourceResult};
    use crate::memstore::{MemRecord, MemoryStore};
    use crate::pipeline::{FilterPart, Function};
    use crate::types::{DataKind, TypedValue};

    static THIRTY: [u8; 8] = 30i64.to_le_bytes();

    fn store() -> ObjectHandle<MemoryStore> {
        let mut store = MemoryStore::new(ObjectId::new(0, 7));
        for (dkey, age, score) in [("a", 10i64, 5i64), ("b", 45, 7), ("c", 50, 3)] {
            store.insert(
                MemRecord::new(dkey.as_bytes().to_vec())
                    .with_akey("age", age.to_le_bytes().to_vec())
                    .with_akey("score", score.to_le_bytes().to_vec()),
            );
        }
        ObjectHandle::new(store)
    }

    fn older_than_thirty() -> Pipeline<'static> {
        let cond = Filter::condition()
            .with_part(FilterPart::akey(b"age", DataKind::Integer))
            .unwrap()
            .with_part(FilterPart::constant(TypedValue::integer(&THIRTY)))
            .unwrap()
            .with_part(FilterPart::function(Function::Gt))
            .unwrap();
        Pipeline::new().with_filter(cond).unwrap()
    }

    fn sum_score(pipeline: Pipeline<'static>) -> Pipeline<'static> {
        let agg = Filter::aggregation()
            .with_part(FilterPart::akey(b"score", DataKind::Integer))
            .unwrap()
            .with_part(FilterPart::function(Function::Sum))
            .unwrap();
        pipeline.with_filter(agg).unwrap()
    }

    #[test]
    fn test_condition_selects_keys() {
        let object = store();
        let executor = PipelineExecutor::default();
        let mut anchor = Anchor::new();
        let mut kds = vec![KeyDescriptor::default(); 8];
        let mut keys = vec![0u8; 64];
        let args = RunArgs::new(ContainerHandle::new(), &mut anchor)
            .with_key_descriptors(&mut kds)
            .with_keys(&mut keys);

        let report = executor.run(&object, &older_than_thirty(), args).unwrap();
        assert_eq!(report.status, RunStatus::Complete);
        assert_eq!(report.nr_kds, 2);
        assert_eq!(report.stats.scanned, 3);
        assert_eq!(report.stats.excluded, 1);
        assert!(anchor.is_eof());

        let split = crate::executor::split_keys(&keys[..report.keys_written], &kds[..2]).unwrap();
        assert_eq!(split, vec![&b"b"[..], &b"c"[..]]);
    }

    #[test]
    fn test_sum_over_qualifying() {
        let object = store();
        let executor = PipelineExecutor::default();
        let mut anchor = Anchor::new();
        let mut aggregates = AggregateBuffer::new();
        let args = RunArgs::new(ContainerHandle::new(), &mut anchor).with_aggregates(&mut aggregates);

        let report = executor
            .run(&object, &sum_score(older_than_thirty()), args)
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.nr_kds, 0);
        assert_eq!(aggregates.results(), Some(vec![AggregateValue::Integer(10)]));
    }

    #[test]
    fn test_invalid_pipeline_rejected_before_reading() {
        let object = store();
        let executor = PipelineExecutor::default();
        let bad = Pipeline::new()
            .with_filter(
                Filter::condition()
                    .with_part(FilterPart::function(Function::And))
                    .unwrap(),
            )
            .unwrap();
        let mut anchor = Anchor::new();
        let args = RunArgs::new(ContainerHandle::new(), &mut anchor);

        let err = executor.run(&object, &bad, args).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::InvalidPipeline);
        assert_eq!(object.source().fetch_count(), 0);
        assert!(anchor.is_initial());
        assert!(executor.check(&bad).is_err());
    }

    #[test]
    fn test_resume_requires_seeded_buffer() {
        let object = store();
        let executor = PipelineExecutor::default();
        let mut anchor = Anchor::at(&1u64.to_le_bytes());
        let mut aggregates = AggregateBuffer::new();
        let args = RunArgs::new(ContainerHandle::new(), &mut anchor).with_aggregates(&mut aggregates);

        let err = executor
            .run(&object, &sum_score(older_than_thirty()), args)
            .unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::InvalidArgument);
    }

    #[test]
    fn test_eof_anchor_is_complete() {
        let object = store();
        let executor = PipelineExecutor::default();
        let mut anchor = Anchor::eof();
        let args = RunArgs::new(ContainerHandle::new(), &mut anchor);

        let report = executor.run(&object, &Pipeline::new(), args).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.stats.scanned, 0);
        assert_eq!(object.source().fetch_count(), 0);
    }

    #[test]
    fn test_event_logging_follows_config() {
        let fields = [("nr_kds", "3")];
        let quiet = PipelineExecutor::default();
        assert!(!quiet.config().log_runs);
        assert_eq!(quiet.event_line(Event::RunMoreData, &fields), None);

        let verbose = PipelineExecutor::new(ExecutorConfig {
            log_runs: true,
            ..ExecutorConfig::default()
        });
        let line = verbose.event_line(Event::RunMoreData, &fields).unwrap();
        assert_eq!(line, render_event(Event::RunMoreData, &fields));
        assert!(line.contains("PIPELINE_RUN_MORE_DATA"));
    }

    #[test]
    fn test_metrics_counted() {
        let object = store();
        let executor = PipelineExecutor::default();
        let mut anchor = Anchor::new();
        let args = RunArgs::new(ContainerHandle::new(), &mut anchor);
        executor.run(&object, &older_than_thirty(), args).unwrap();

        let snap = executor.metrics().snapshot();
        assert_eq!(snap.runs_started, 1);
        assert_eq!(snap.runs_completed, 1);
        assert_eq!(snap.records_scanned, 3);
        assert_eq!(snap.records_qualifying, 2);
    }

    struct Stuck;

    impl RecordSource for Stuck {
        type Record = MemRecord;

        fn object_id(&self) -> ObjectId {
            ObjectId::default()
        }

        fn fetch_page(
            &self,
            _ctx: &FetchContext,
            anchor: &Anchor,
            _limit: usize,
        ) -> SourceResult<Page<MemRecord>> {
            Ok(Page {
                entries: Vec::<PageEntry<MemRecord>>::new(),
                next: *anchor,
            })
        }

        fn fetch_key(&self, _ctx: &FetchContext, _dkey: &[u8]) -> SourceResult<Option<MemRecord>> {
            Err(SourceError::Io("disk gone".to_string()))
        }
    }

    #[test]
    fn test_stalled_source_is_an_error() {
        let object = ObjectHandle::new(Stuck);
        let executor = PipelineExecutor::default();
        let mut anchor = Anchor::new();
        let args = RunArgs::new(ContainerHandle::new(), &mut anchor);

        let err = executor.run(&object, &Pipeline::new(), args).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::Source);
        assert!(matches!(
            err.source_error(),
            Some(SourceError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_source_error_propagated_for_single_key() {
        let object = ObjectHandle::new(Stuck);
        let executor = PipelineExecutor::default();
        let mut anchor = Anchor::new();
        let args = RunArgs::new(ContainerHandle::new(), &mut anchor).with_dkey(b"a");

        let err = executor.run(&object, &Pipeline::new(), args).unwrap_err();
        assert_eq!(
            err.source_error(),
            Some(&SourceError::Io("disk gone".to_string()))
        );
        assert!(!object.is_busy());
    }
}
