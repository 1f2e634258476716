//! # Evaluation Errors
//!
//! Per-record failures. An evaluation error excludes one record (or one
//! aggregate contribution) and never aborts the scan.

use thiserror::Error;

/// Result type for per-record evaluation
pub type EvalResult<T> = Result<T, EvalError>;

/// Failures evaluating a filter against one record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    // ==================
    // Resolution Errors
    // ==================

    /// Byte range reaches past the resolved value
    #[error("Byte range {offset}+{len} exceeds value of {actual} bytes")]
    RangeOutOfBounds {
        offset: usize,
        len: usize,
        actual: usize,
    },

    /// Stored numeric value has an unsupported width
    #[error("{kind} value cannot be {width} bytes wide")]
    InvalidWidth { kind: &'static str, width: usize },

    // ==================
    // Function Errors
    // ==================

    /// Numeric function reached a null operand
    #[error("Function '{0}' requires a non-null numeric operand")]
    NullOperand(&'static str),

    /// Operands cannot be compared
    #[error("Function '{func}' cannot compare {left} with {right}")]
    IncomparableOperands {
        func: &'static str,
        left: &'static str,
        right: &'static str,
    },

    /// Operand has the wrong type for the function
    #[error("Function '{func}' expected {expected}, got {actual}")]
    TypeMismatch {
        func: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    // ==================
    // Stack Errors
    // ==================

    /// Function popped more operands than were pushed
    #[error("Operand stack underflow at '{0}'")]
    StackUnderflow(&'static str),

    /// Expression left other than one value
    #[error("Expression left {0} values on the stack")]
    StackResidue(usize),

    /// Aggregate buffers being merged have different slot counts
    #[error("Cannot merge aggregate buffers of {0} and {1} slots")]
    SlotMismatch(usize, usize),

    /// LIKE pattern could not be compiled
    #[error("Invalid LIKE pattern: {0}")]
    Pattern(String),
}
