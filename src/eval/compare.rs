//! Comparison functions
//!
//! - Binary and String compare byte-lexicographically and with each other
//! - Integer and Real compare numerically, promoting to Real when mixed
//! - Booleans support EQ and NE only
//!
//! A null byte value compares as the empty byte string. A null numeric
//! value has no order and fails the record instead.

use std::cmp::Ordering;

use super::errors::{EvalError, EvalResult};
use crate::pipeline::Function;
use crate::types::Datum;

/// Applies a comparison function to two operands
pub fn compare(func: Function, left: &Datum<'_>, right: &Datum<'_>) -> EvalResult<bool> {
    let incomparable = || EvalError::IncomparableOperands {
        func: func.as_str(),
        left: left.type_name(),
        right: right.type_name(),
    };

    let ordering = match (left.as_bytes(), right.as_bytes()) {
        (Some(a), Some(b)) => Some(a.cmp(b)),
        _ => match (left, right) {
            (Datum::Boolean(a), Datum::Boolean(b)) => {
                return match func {
                    Function::Eq => Ok(a == b),
                    Function::Ne => Ok(a != b),
                    _ => Err(incomparable()),
                };
            }
            (Datum::Null(kind), _) | (_, Datum::Null(kind)) if kind.is_numeric() => {
                return Err(EvalError::NullOperand(func.as_str()));
            }
            _ => match (left.as_number(), right.as_number()) {
                (Some(a), Some(b)) => a.compare(&b),
                _ => return Err(incomparable()),
            },
        },
    };

    // Unordered (NaN) operands are unequal to everything
    let Some(ordering) = ordering else {
        return Ok(func == Function::Ne);
    };

    match func {
        Function::Eq => Ok(ordering == Ordering::Equal),
        Function::Ne => Ok(ordering != Ordering::Equal),
        Function::Lt => Ok(ordering == Ordering::Less),
        Function::Le => Ok(ordering != Ordering::Greater),
        Function::Ge => Ok(ordering != Ordering::Less),
        Function::Gt => Ok(ordering == Ordering::Greater),
        _ => Err(EvalError::TypeMismatch {
            func: func.as_str(),
            expected: "comparison function",
            actual: func.as_str(),
        }),
    }
}
