//! Typed one-shot events
//!
//! Run begin/complete/failed lines come from `ObservationScope`; the
//! events here mark points inside or around a run.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Validation refused a pipeline before any record was read
    CheckRejected,
    /// Run stopped early on a full output buffer
    RunMoreData,
    /// Not even one qualifying record fit the output buffers
    CapacityShort,
    /// Asynchronous run cancelled; no output committed
    RunCancelled,
    /// Record source reported a failure
    SourceFailed,
    /// Executor configuration loaded from disk
    ConfigLoaded,
    /// Partition accumulators merged
    PartitionsMerged,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::CheckRejected => "PIPELINE_CHECK_REJECTED",
            Event::RunMoreData => "PIPELINE_RUN_MORE_DATA",
            Event::CapacityShort => "PIPELINE_CAPACITY_SHORT",
            Event::RunCancelled => "PIPELINE_RUN_CANCELLED",
            Event::SourceFailed => "RECORD_SOURCE_FAILED",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::PartitionsMerged => "PARTITIONS_MERGED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Event::SourceFailed => Severity::Error,
            Event::CheckRejected | Event::CapacityShort | Event::RunCancelled => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
