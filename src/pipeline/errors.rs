//! Pipeline error types
//!
//! Error codes:
//! - PIPE_VERSION_UNSUPPORTED (FATAL)
//! - PIPE_FILTER_EMPTY (REJECT)
//! - PIPE_ARITY_MISMATCH (REJECT)
//! - PIPE_STACK_UNDERFLOW (REJECT)
//! - PIPE_STACK_RESIDUE (REJECT)
//! - PIPE_OPERAND_TYPE (REJECT)
//! - PIPE_RESULT_TYPE (REJECT)
//! - PIPE_AGGREGATE_MISPLACED (REJECT)
//! - PIPE_CHAIN_ORDER (REJECT)
//! - PIPE_REFERENCE_MISSING (REJECT)
//! - PIPE_CONSTANT_INVALID (REJECT)
//! - PIPE_CAPACITY (ERROR)

use std::fmt;

/// Severity levels for pipeline errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Pipeline rejected, nothing executed
    Reject,
    /// Construction could not grow the structure
    Error,
    /// Unsupported format, no partial execution attempted
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

/// Pipeline-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorCode {
    /// Pipeline format version not supported
    VersionUnsupported,
    /// Filter has no parts
    FilterEmpty,
    /// Declared operand count differs from the function's arity
    ArityMismatch,
    /// Function needs more operands than the stack holds
    StackUnderflow,
    /// Expression does not reduce to exactly one value
    StackResidue,
    /// Operand types are incompatible with the function
    OperandType,
    /// Filter result type does not match the filter kind
    ResultType,
    /// Aggregate function used where it is not allowed
    AggregateMisplaced,
    /// Condition filter follows an aggregation filter
    ChainOrder,
    /// Attribute key or constant value missing
    ReferenceMissing,
    /// Constant or byte range is malformed
    ConstantInvalid,
    /// Append could not reserve room
    Capacity,
}

impl PipelineErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            PipelineErrorCode::VersionUnsupported => "PIPE_VERSION_UNSUPPORTED",
            PipelineErrorCode::FilterEmpty => "PIPE_FILTER_EMPTY",
            PipelineErrorCode::ArityMismatch => "PIPE_ARITY_MISMATCH",
            PipelineErrorCode::StackUnderflow => "PIPE_STACK_UNDERFLOW",
            PipelineErrorCode::StackResidue => "PIPE_STACK_RESIDUE",
            PipelineErrorCode::OperandType => "PIPE_OPERAND_TYPE",
            PipelineErrorCode::ResultType => "PIPE_RESULT_TYPE",
            PipelineErrorCode::AggregateMisplaced => "PIPE_AGGREGATE_MISPLACED",
            PipelineErrorCode::ChainOrder => "PIPE_CHAIN_ORDER",
            PipelineErrorCode::ReferenceMissing => "PIPE_REFERENCE_MISSING",
            PipelineErrorCode::ConstantInvalid => "PIPE_CONSTANT_INVALID",
            PipelineErrorCode::Capacity => "PIPE_CAPACITY",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            PipelineErrorCode::VersionUnsupported => Severity::Fatal,
            PipelineErrorCode::Capacity => Severity::Error,
            _ => Severity::Reject,
        }
    }

    /// Returns true if validation detects this error
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            PipelineErrorCode::VersionUnsupported | PipelineErrorCode::Capacity
        )
    }
}

impl fmt::Display for PipelineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Pipeline error type with location context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineError {
    /// Error code
    code: PipelineErrorCode,
    /// Human-readable message
    message: String,
    /// Index of the offending filter
    filter: Option<usize>,
    /// Index of the offending part within the filter
    part: Option<usize>,
}

impl PipelineError {
    fn new(code: PipelineErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            filter: None,
            part: None,
        }
    }

    /// Create an unsupported version error
    pub fn version_unsupported(version: u64) -> Self {
        Self::new(
            PipelineErrorCode::VersionUnsupported,
            format!("Pipeline version {} is not supported", version),
        )
    }

    /// Create an empty filter error
    pub fn filter_empty(filter: usize) -> Self {
        Self::new(PipelineErrorCode::FilterEmpty, "Filter has no parts").at_filter(filter)
    }

    /// Create an arity mismatch error
    pub fn arity_mismatch(func: &str, expected: usize, declared: u32) -> Self {
        Self::new(
            PipelineErrorCode::ArityMismatch,
            format!(
                "Function '{}' takes {} operand(s), part declares {}",
                func, expected, declared
            ),
        )
    }

    /// Create a stack underflow error
    pub fn stack_underflow(func: &str, needed: usize, available: usize) -> Self {
        Self::new(
            PipelineErrorCode::StackUnderflow,
            format!(
                "Function '{}' needs {} operand(s), only {} available",
                func, needed, available
            ),
        )
    }

    /// Create a stack residue error
    pub fn stack_residue(remaining: usize) -> Self {
        Self::new(
            PipelineErrorCode::StackResidue,
            format!("Expression leaves {} values, expected exactly 1", remaining),
        )
    }

    /// Create an operand type error
    pub fn operand_type(reason: impl Into<String>) -> Self {
        Self::new(PipelineErrorCode::OperandType, reason)
    }

    /// Create a result type error
    pub fn result_type(reason: impl Into<String>) -> Self {
        Self::new(PipelineErrorCode::ResultType, reason)
    }

    /// Create a misplaced aggregate error
    pub fn aggregate_misplaced(reason: impl Into<String>) -> Self {
        Self::new(PipelineErrorCode::AggregateMisplaced, reason)
    }

    /// Create a chaining order error
    pub fn chain_order(filter: usize) -> Self {
        Self::new(
            PipelineErrorCode::ChainOrder,
            "Condition filter cannot follow an aggregation filter",
        )
        .at_filter(filter)
    }

    /// Create a missing reference error
    pub fn reference_missing(reason: impl Into<String>) -> Self {
        Self::new(PipelineErrorCode::ReferenceMissing, reason)
    }

    /// Create an invalid constant error
    pub fn constant_invalid(reason: impl Into<String>) -> Self {
        Self::new(PipelineErrorCode::ConstantInvalid, reason)
    }

    /// Create a capacity error
    pub fn capacity(what: &str) -> Self {
        Self::new(
            PipelineErrorCode::Capacity,
            format!("Cannot grow {}: allocation failed", what),
        )
    }

    /// Attach the filter index
    pub fn at_filter(mut self, filter: usize) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Attach the part index
    pub fn at_part(mut self, part: usize) -> Self {
        self.part = Some(part);
        self
    }

    /// Returns the error code
    pub fn code(&self) -> PipelineErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the filter index if applicable
    pub fn filter(&self) -> Option<usize> {
        self.filter
    }

    /// Returns the part index if applicable
    pub fn part(&self) -> Option<usize> {
        self.part
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        match (self.filter, self.part) {
            (Some(filter), Some(part)) => write!(f, " (filter {}, part {})", filter, part)?,
            (Some(filter), None) => write!(f, " (filter {})", filter)?,
            _ => {}
        }
        Ok(())
    }
}

impl std::error::Error for PipelineError {}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
