//! Executor error types
//!
//! Error codes:
//! - PIPE_EXEC_INVALID_PIPELINE (REJECT)
//! - PIPE_EXEC_VERSION (FATAL)
//! - PIPE_EXEC_CAPACITY (ERROR, carries required sizes)
//! - PIPE_EXEC_SOURCE (ERROR, carries the source failure)
//! - PIPE_EXEC_CANCELLED (ERROR)
//! - PIPE_EXEC_BUSY (ERROR)
//! - PIPE_EXEC_INVALID_ARGUMENT (REJECT)
//!
//! Every executor error leaves the caller's anchor, output buffers and
//! aggregate buffer exactly as they were before the call.

use std::fmt;

use super::source::SourceError;
use crate::pipeline::{PipelineError, PipelineErrorCode};

/// Severity levels for executor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Request refused before any record was read
    Reject,
    /// Call failed; identical retry may succeed
    Error,
    /// Unsupported format, nothing attempted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorCode {
    /// Pipeline failed structural validation
    InvalidPipeline,
    /// Pipeline version not supported
    Version,
    /// Output buffers too small for the next qualifying record
    Capacity,
    /// Record source failed
    Source,
    /// Asynchronous run cancelled
    Cancelled,
    /// Object handle already has a run outstanding
    Busy,
    /// Arguments inconsistent with the pipeline or with each other
    InvalidArgument,
}

impl ExecutorErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::InvalidPipeline => "PIPE_EXEC_INVALID_PIPELINE",
            ExecutorErrorCode::Version => "PIPE_EXEC_VERSION",
            ExecutorErrorCode::Capacity => "PIPE_EXEC_CAPACITY",
            ExecutorErrorCode::Source => "PIPE_EXEC_SOURCE",
            ExecutorErrorCode::Cancelled => "PIPE_EXEC_CANCELLED",
            ExecutorErrorCode::Busy => "PIPE_EXEC_BUSY",
            ExecutorErrorCode::InvalidArgument => "PIPE_EXEC_INVALID_ARGUMENT",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ExecutorErrorCode::InvalidPipeline | ExecutorErrorCode::InvalidArgument => {
                Severity::Reject
            }
            ExecutorErrorCode::Version => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Output sizes needed to hold the next qualifying record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct RequiredSize {
    pub key_descriptors: usize,
    pub keys_bytes: usize,
    pub records_bytes: usize,
}

impl fmt::Display for RequiredSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} key descriptor(s), {} key byte(s), {} record byte(s)",
            self.key_descriptors, self.keys_bytes, self.records_bytes
        )
    }
}

/// Executor error with context
#[derive(Debug)]
pub struct ExecutorError {
    code: ExecutorErrorCode,
    message: String,
    required: Option<RequiredSize>,
    pipeline: Option<PipelineError>,
    source: Option<SourceError>,
}

impl ExecutorError {
    fn new(code: ExecutorErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            required: None,
            pipeline: None,
            source: None,
        }
    }

    /// Maps a validation failure; version errors keep their own code
    pub fn from_pipeline(err: PipelineError) -> Self {
        let code = if err.code() == PipelineErrorCode::VersionUnsupported {
            ExecutorErrorCode::Version
        } else {
            ExecutorErrorCode::InvalidPipeline
        };
        let mut e = Self::new(code, err.to_string());
        e.pipeline = Some(err);
        e
    }

    pub fn capacity(required: RequiredSize) -> Self {
        let mut e = Self::new(
            ExecutorErrorCode::Capacity,
            format!("Output buffers too small; next record needs {}", required),
        );
        e.required = Some(required);
        e
    }

    pub fn source_failed(err: SourceError) -> Self {
        let mut e = Self::new(ExecutorErrorCode::Source, err.to_string());
        e.source = Some(err);
        e
    }

    pub fn cancelled() -> Self {
        Self::new(
            ExecutorErrorCode::Cancelled,
            "Run cancelled before completion",
        )
    }

    pub fn busy() -> Self {
        Self::new(
            ExecutorErrorCode::Busy,
            "Object handle already has a run outstanding",
        )
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::InvalidArgument, reason)
    }

    pub fn code(&self) -> ExecutorErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Sizes the caller must provide; set for capacity errors
    pub fn required(&self) -> Option<RequiredSize> {
        self.required
    }

    /// Underlying validation failure, if any
    pub fn pipeline_error(&self) -> Option<&PipelineError> {
        self.pipeline.as_ref()
    }

    /// Underlying source failure, if any
    pub fn source_error(&self) -> Option<&SourceError> {
        self.source.as_ref()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Some(err) = &self.source {
            return Some(err as &(dyn std::error::Error + 'static));
        }
        self.pipeline
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;
