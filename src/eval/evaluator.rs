//! Postfix stack evaluator
//!
//! One pass per record over a filter's parts:
//! 1. Key leaves push the resolved (range-restricted) value
//! 2. Constant leaves push their literal
//! 3. Function parts pop their arity and push one result
//!
//! Evaluation is purely computational. It never blocks and never
//! touches storage except through the caller's `KeyResolver`.

use super::aggregate::Accumulator;
use super::compare::compare;
use super::errors::{EvalError, EvalResult};
use super::like::{LikeMatcher, PatternMatcher};
use crate::pipeline::{FilterPart, Function, KeyRef};
use crate::types::{ByteRange, DataKind, Datum};

/// Supplies the current record's keys and attribute values
pub trait KeyResolver {
    /// Bytes for `key`, or None if the record has no such key
    fn resolve(&self, key: &KeyRef<'_>) -> Option<&[u8]>;
}

/// Stack machine over filter parts.
///
/// The operand stack is allocated once and reused for every record.
#[derive(Debug)]
pub struct Evaluator<M = LikeMatcher> {
    matcher: M,
    depth: usize,
    /// Always empty between passes
    stack: Vec<Datum<'static>>,
}

impl Evaluator<LikeMatcher> {
    /// Evaluator whose operand stack starts with room for `depth` values
    pub fn new(depth: usize) -> Self {
        Self::with_matcher(LikeMatcher::new(), depth)
    }
}

impl<M: PatternMatcher> Evaluator<M> {
    pub fn with_matcher(matcher: M, depth: usize) -> Self {
        Self {
            matcher,
            depth,
            stack: Vec::with_capacity(depth),
        }
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    /// Evaluates a condition filter against one record
    pub fn evaluate_condition<'r, R>(
        &mut self,
        parts: &'r [FilterPart<'r>],
        resolver: &'r R,
    ) -> EvalResult<bool>
    where
        R: KeyResolver + ?Sized,
    {
        let result = self.run(parts, resolver)?;
        result.as_bool().ok_or(EvalError::TypeMismatch {
            func: "condition",
            expected: "boolean",
            actual: result.type_name(),
        })
    }

    /// Evaluates the operand under an aggregation filter's root and
    /// folds it into `acc`
    pub fn accumulate<'r, R>(
        &mut self,
        parts: &'r [FilterPart<'r>],
        resolver: &'r R,
        acc: &mut Accumulator,
    ) -> EvalResult<()>
    where
        R: KeyResolver + ?Sized,
    {
        let (root, operand) = match parts.split_last() {
            Some((FilterPart::Function { func, .. }, rest)) if func.is_aggregate() => (*func, rest),
            _ => {
                return Err(EvalError::TypeMismatch {
                    func: acc.func().as_str(),
                    expected: "aggregate root",
                    actual: parts.last().map(FilterPart::type_name).unwrap_or("nothing"),
                })
            }
        };

        let value = self.run(operand, resolver)?;
        match value.as_number() {
            Some(n) => {
                acc.update(n);
                Ok(())
            }
            None if value.is_null() => Err(EvalError::NullOperand(root.as_str())),
            None => Err(EvalError::TypeMismatch {
                func: root.as_str(),
                expected: "integer or real",
                actual: value.type_name(),
            }),
        }
    }

    fn run<'r, R>(&mut self, parts: &'r [FilterPart<'r>], resolver: &'r R) -> EvalResult<Datum<'r>>
    where
        R: KeyResolver + ?Sized,
    {
        let mut stack = recycle(std::mem::take(&mut self.stack));
        stack.reserve(self.depth);
        let result = self.run_on(parts, resolver, &mut stack);
        self.stack = recycle(stack);
        result
    }

    fn run_on<'r, R>(
        &mut self,
        parts: &'r [FilterPart<'r>],
        resolver: &'r R,
        stack: &mut Vec<Datum<'r>>,
    ) -> EvalResult<Datum<'r>>
    where
        R: KeyResolver + ?Sized,
    {
        for part in parts {
            let pushed = match part {
                FilterPart::Key { key, kind, range } => resolve_key(key, *kind, *range, resolver)?,
                FilterPart::Constant { kind, values } => match values.first() {
                    Some(value) => {
                        let bytes = value.view().ok_or_else(|| match value.range() {
                            Some(r) => EvalError::RangeOutOfBounds {
                                offset: r.offset,
                                len: r.len,
                                actual: value.bytes().len(),
                            },
                            None => EvalError::InvalidWidth {
                                kind: kind.as_str(),
                                width: value.bytes().len(),
                            },
                        })?;
                        decode(*kind, bytes)?
                    }
                    None => Datum::Null(*kind),
                },
                FilterPart::Function { func, .. } => {
                    let func = *func;
                    if func.is_aggregate() {
                        return Err(EvalError::TypeMismatch {
                            func: func.as_str(),
                            expected: "per-record function",
                            actual: "aggregate",
                        });
                    }
                    let last = stack.pop().ok_or(EvalError::StackUnderflow(func.as_str()))?;
                    let result = if func.arity() == 2 {
                        let first = stack.pop().ok_or(EvalError::StackUnderflow(func.as_str()))?;
                        self.apply_binary(func, &first, &last)?
                    } else {
                        apply_unary(func, &last)?
                    };
                    Datum::Boolean(result)
                }
            };
            stack.push(pushed);
        }

        match (stack.pop(), stack.len()) {
            (Some(result), 0) => Ok(result),
            (Some(_), rest) => Err(EvalError::StackResidue(rest + 1)),
            (None, _) => Err(EvalError::StackResidue(0)),
        }
    }

    fn apply_binary(&mut self, func: Function, left: &Datum<'_>, right: &Datum<'_>) -> EvalResult<bool> {
        match func {
            Function::Like => {
                let value = expect_bytes(func, left)?;
                let pattern = expect_bytes(func, right)?;
                self.matcher.matches(value, pattern)
            }
            Function::And => Ok(expect_bool(func, left)? && expect_bool(func, right)?),
            Function::Or => Ok(expect_bool(func, left)? || expect_bool(func, right)?),
            _ => compare(func, left, right),
        }
    }
}

/// Empties `stack` and hands its allocation over to a new lifetime
fn recycle<'a, 'b>(mut stack: Vec<Datum<'a>>) -> Vec<Datum<'b>> {
    stack.clear();
    stack.into_iter().filter_map(|_| None).collect()
}

fn apply_unary(func: Function, operand: &Datum<'_>) -> EvalResult<bool> {
    match func {
        Function::IsNull => Ok(operand.is_null()),
        Function::IsNotNull => Ok(!operand.is_null()),
        _ => Err(EvalError::TypeMismatch {
            func: func.as_str(),
            expected: "unary function",
            actual: func.as_str(),
        }),
    }
}

/// Resolves a key leaf. Absent and empty values are null, and a range
/// is only applied to a present value.
fn resolve_key<'r, R>(
    key: &KeyRef<'_>,
    kind: DataKind,
    range: Option<ByteRange>,
    resolver: &'r R,
) -> EvalResult<Datum<'r>>
where
    R: KeyResolver + ?Sized,
{
    let bytes = match resolver.resolve(key) {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return Ok(Datum::Null(kind)),
    };
    let bytes = match range {
        Some(r) => r.apply(bytes).ok_or(EvalError::RangeOutOfBounds {
            offset: r.offset,
            len: r.len,
            actual: bytes.len(),
        })?,
        None => bytes,
    };
    decode(kind, bytes)
}

fn decode(kind: DataKind, bytes: &[u8]) -> EvalResult<Datum<'_>> {
    Datum::decode(kind, bytes).ok_or(EvalError::InvalidWidth {
        kind: kind.as_str(),
        width: bytes.len(),
    })
}

fn expect_bytes<'d>(func: Function, datum: &Datum<'d>) -> EvalResult<&'d [u8]> {
    datum.as_bytes().ok_or(EvalError::TypeMismatch {
        func: func.as_str(),
        expected: "binary or string",
        actual: datum.type_name(),
    })
}

fn expect_bool(func: Function, datum: &Datum<'_>) -> EvalResult<bool> {
    datum.as_bool().ok_or(EvalError::TypeMismatch {
        func: func.as_str(),
        expected: "boolean",
        actual: datum.type_name(),
    })
}
