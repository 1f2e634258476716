//! Per-record evaluation for kvpipe
//!
//! The evaluator runs one filter against one record with an explicit
//! operand stack, in postfix order. Errors here are per-record: the
//! executor excludes the record (or skips one aggregate contribution)
//! and keeps scanning.

mod aggregate;
mod compare;
mod errors;
mod evaluator;
mod like;

pub use aggregate::{Accumulator, AggregateBuffer, AggregateValue};
pub use compare::compare;
pub use errors::{EvalError, EvalResult};
pub use evaluator::{Evaluator, KeyResolver};
pub use like::{LikeMatcher, PatternMatcher, MAX_CACHED_PATTERNS};
