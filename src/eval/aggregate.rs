//! Aggregate accumulators
//!
//! Each aggregation filter owns one accumulator. Accumulators are seeded
//! before the first record, updated once per qualifying record, and
//! finalized only when the scan reaches end-of-stream. AVG carries its
//! running sum and count and divides in `finalize`.
//!
//! `merge` is associative and commutative, so partial accumulators from
//! independent workers combine into the same result as one serial scan.

use serde::Serialize;

use super::errors::{EvalError, EvalResult};
use crate::pipeline::Function;
use crate::types::Number;

/// Finalized aggregate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateValue {
    /// Zero records contributed; distinct from a zero result
    NoData,
    Integer(i64),
    Real(f64),
}

impl AggregateValue {
    pub fn is_no_data(&self) -> bool {
        matches!(self, AggregateValue::NoData)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AggregateValue::NoData => None,
            AggregateValue::Integer(i) => Some(*i as f64),
            AggregateValue::Real(r) => Some(*r),
        }
    }
}

impl From<Number> for AggregateValue {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(i) => AggregateValue::Integer(i),
            Number::Real(r) => AggregateValue::Real(r),
        }
    }
}

/// Running state of one aggregate function
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    func: Function,
    /// Running sum for SUM and AVG, current extreme for MIN and MAX
    value: Option<Number>,
    count: u64,
}

impl Accumulator {
    /// Seeds an accumulator; None if `func` is not an aggregate
    pub fn new(func: Function) -> Option<Self> {
        if !func.is_aggregate() {
            return None;
        }
        Some(Self {
            func,
            value: None,
            count: 0,
        })
    }

    pub fn func(&self) -> Function {
        self.func
    }

    /// Number of values folded in
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Folds one record's operand into the state
    pub fn update(&mut self, n: Number) {
        self.value = Some(match self.value {
            None => n,
            Some(current) => self.combine(current, n),
        });
        self.count += 1;
    }

    /// Folds another accumulator of the same function into this one.
    ///
    /// Matches a serial fold as long as no integer SUM or AVG overflows
    /// along the way. Overflow promotes to Real at the point it happens,
    /// so partitioning decides whether an intermediate sum overflows:
    /// `[MAX]` merged with `[1, -1]` stays Integer, while a serial fold
    /// of `MAX, 1, -1` ends Real.
    pub fn merge(&mut self, other: &Accumulator) -> EvalResult<()> {
        if self.func != other.func {
            return Err(EvalError::TypeMismatch {
                func: self.func.as_str(),
                expected: self.func.as_str(),
                actual: other.func.as_str(),
            });
        }
        self.value = match (self.value, other.value) {
            (Some(a), Some(b)) => Some(self.combine(a, b)),
            (a, b) => a.or(b),
        };
        self.count += other.count;
        Ok(())
    }

    fn combine(&self, current: Number, n: Number) -> Number {
        match self.func {
            Function::Min => match n.compare(&current) {
                Some(std::cmp::Ordering::Less) => n,
                _ => current,
            },
            Function::Max => match n.compare(&current) {
                Some(std::cmp::Ordering::Greater) => n,
                _ => current,
            },
            _ => current.add(&n),
        }
    }

    /// Result as of now; NoData when nothing was folded in
    pub fn finalize(&self) -> AggregateValue {
        match (self.value, self.count) {
            (None, _) | (_, 0) => AggregateValue::NoData,
            (Some(sum), count) if self.func == Function::Avg => {
                AggregateValue::Real(sum.as_f64() / count as f64)
            }
            (Some(value), _) => value.into(),
        }
    }
}

/// Caller-owned aggregate results, one slot per aggregation filter.
///
/// The buffer carries accumulator state between paginated calls. Values
/// are final only once a call reaches end-of-stream; until then use
/// `partial` for incremental values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateBuffer {
    accumulators: Vec<Accumulator>,
    complete: bool,
}

impl AggregateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets to fresh accumulators for `funcs`, in order
    pub(crate) fn seed(&mut self, funcs: &[Function]) {
        self.accumulators = funcs.iter().copied().filter_map(Accumulator::new).collect();
        self.complete = false;
    }

    /// True if the slots match `funcs` one for one
    pub(crate) fn is_seeded_for(&self, funcs: &[Function]) -> bool {
        self.accumulators.len() == funcs.len()
            && self
                .accumulators
                .iter()
                .zip(funcs)
                .all(|(acc, func)| acc.func == *func)
    }

    pub(crate) fn accumulators_mut(&mut self) -> &mut [Accumulator] {
        &mut self.accumulators
    }

    pub(crate) fn mark_complete(&mut self) {
        self.complete = true;
    }

    pub fn accumulators(&self) -> &[Accumulator] {
        &self.accumulators
    }

    pub fn len(&self) -> usize {
        self.accumulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulators.is_empty()
    }

    /// True once a scan feeding this buffer reached end-of-stream
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Final values in pipeline order, available only at end-of-stream
    pub fn results(&self) -> Option<Vec<AggregateValue>> {
        if self.complete {
            Some(self.partial())
        } else {
            None
        }
    }

    /// Values over the records seen so far
    pub fn partial(&self) -> Vec<AggregateValue> {
        self.accumulators.iter().map(Accumulator::finalize).collect()
    }

    /// Folds another buffer's state into this one, slot by slot.
    ///
    /// The result is complete only if both inputs are.
    pub fn merge(&mut self, other: &AggregateBuffer) -> EvalResult<()> {
        if self.accumulators.len() != other.accumulators.len() {
            return Err(EvalError::SlotMismatch(
                self.accumulators.len(),
                other.accumulators.len(),
            ));
        }
        for (mine, theirs) in self.accumulators.iter_mut().zip(&other.accumulators) {
            mine.merge(theirs)?;
        }
        self.complete = self.complete && other.complete;
        Ok(())
    }
}
