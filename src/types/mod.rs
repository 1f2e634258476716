//! Value model shared by pipelines and the evaluator
//!
//! - `TypedValue`: borrowed bytes + data kind (+ optional byte range)
//! - `Datum`: an evaluated operand on the stack
//! - `Number`: owned numeric state for accumulators

mod datum;
mod value;

pub use datum::{Datum, Number};
pub use value::{decode_integer, decode_real, ByteRange, DataKind, TypedValue};
