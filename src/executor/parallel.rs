//! Partition-parallel aggregation
//!
//! Accumulators are associative and commutative, so independent
//! partitions of the key space can be scanned on separate threads and
//! their partial results merged at the end.

use std::thread;

use super::anchor::Anchor;
use super::errors::{ExecutorError, ExecutorResult};
use super::executor::PipelineExecutor;
use super::handle::{ContainerHandle, ObjectHandle};
use super::request::RunArgs;
use super::source::RecordSource;
use crate::eval::AggregateBuffer;
use crate::observability::Event;
use crate::pipeline::{Pipeline, PipelineValidator};

/// Scans every partition to end-of-stream and merges the aggregates.
///
/// The first failing partition's error is returned; no partial result
/// is produced in that case.
pub fn aggregate_partitions<S>(
    executor: &PipelineExecutor,
    container: ContainerHandle,
    pipeline: &Pipeline<'_>,
    partitions: &[ObjectHandle<S>],
) -> ExecutorResult<AggregateBuffer>
where
    S: RecordSource + Sync + Send,
{
    executor.check(pipeline)?;

    let results: Vec<ExecutorResult<AggregateBuffer>> = thread::scope(|scope| {
        let handles: Vec<_> = partitions
            .iter()
            .map(|object| scope.spawn(move || scan_partition(executor, container, pipeline, object)))
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(ExecutorError::invalid_argument("Partition worker panicked"))
                })
            })
            .collect()
    });

    let mut merged: Option<AggregateBuffer> = None;
    for result in results {
        let partial = result?;
        match merged.as_mut() {
            Some(total) => total.merge(&partial).map_err(|e| {
                ExecutorError::invalid_argument(format!("Partition merge failed: {}", e))
            })?,
            None => merged = Some(partial),
        }
    }

    let partitions_count = partitions.len().to_string();
    executor.log(Event::PartitionsMerged, &[("partitions", &partitions_count)]);

    match merged {
        Some(total) => Ok(total),
        None => {
            // No partitions: an empty, complete scan
            let mut empty = AggregateBuffer::new();
            let plan = PipelineValidator::analyze(pipeline)
                .map_err(ExecutorError::from_pipeline)?;
            empty.seed(plan.aggregates());
            empty.mark_complete();
            Ok(empty)
        }
    }
}

fn scan_partition<S: RecordSource>(
    executor: &PipelineExecutor,
    container: ContainerHandle,
    pipeline: &Pipeline<'_>,
    object: &ObjectHandle<S>,
) -> ExecutorResult<AggregateBuffer> {
    let mut anchor = Anchor::new();
    let mut aggregates = AggregateBuffer::new();
    let args = RunArgs::new(container, &mut anchor).with_aggregates(&mut aggregates);
    executor.run(object, pipeline, args)?;
    Ok(aggregates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::AggregateValue;
    use crate::executor::ObjectId;
    use crate::memstore::{MemRecord, MemoryStore};
    use crate::pipeline::{Filter, FilterPart, Function};
    use crate::types::DataKind;

    fn partition(id: u64, values: &[i64]) -> ObjectHandle<MemoryStore> {
        let mut store = MemoryStore::new(ObjectId::new(0, id));
        for (i, v) in values.iter().enumerate() {
            store.insert(
                MemRecord::new(format!("p{}-{}", id, i).into_bytes())
                    .with_akey("v", v.to_le_bytes().to_vec()),
            );
        }
        ObjectHandle::new(store)
    }

    fn aggregate(func: Function) -> Filter<'static> {
        Filter::aggregation()
            .with_part(FilterPart::akey(b"v", DataKind::Integer))
            .unwrap()
            .with_part(FilterPart::function(func))
            .unwrap()
    }

    #[test]
    fn test_partitions_merge_like_one_scan() {
        let pipeline = Pipeline::new()
            .with_filter(aggregate(Function::Sum))
            .unwrap()
            .with_filter(aggregate(Function::Max))
            .unwrap()
            .with_filter(aggregate(Function::Avg))
            .unwrap();
        let partitions = vec![
            partition(1, &[1, 2, 3]),
            partition(2, &[]),
            partition(3, &[10, 4]),
        ];

        let executor = PipelineExecutor::default();
        let merged =
            aggregate_partitions(&executor, ContainerHandle::new(), &pipeline, &partitions).unwrap();
        assert_eq!(
            merged.results(),
            Some(vec![
                AggregateValue::Integer(20),
                AggregateValue::Integer(10),
                AggregateValue::Real(4.0),
            ])
        );
    }

    #[test]
    fn test_no_partitions_is_no_data() {
        let pipeline = Pipeline::new()
            .with_filter(aggregate(Function::Min))
            .unwrap();
        let executor = PipelineExecutor::default();
        let partitions: Vec<ObjectHandle<MemoryStore>> = Vec::new();
        let merged =
            aggregate_partitions(&executor, ContainerHandle::new(), &pipeline, &partitions).unwrap();
        assert_eq!(merged.results(), Some(vec![AggregateValue::NoData]));
    }
}
