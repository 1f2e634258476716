//! Evaluated operands
//!
//! `Datum` is what sits on the evaluator's operand stack. Byte-typed
//! data stays borrowed from the record or constant it came from;
//! numbers are decoded once when the leaf is pushed.

use std::cmp::Ordering;

use serde::Serialize;

use super::value::{decode_integer, decode_real, DataKind};

/// One value on the operand stack
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Datum<'r> {
    /// Zero-length value (absent attribute or empty literal)
    Null(DataKind),
    Binary(&'r [u8]),
    String(&'r [u8]),
    Integer(i64),
    Real(f64),
    Boolean(bool),
}

impl<'r> Datum<'r> {
    /// Decodes resolved bytes of the given kind.
    ///
    /// Returns None for numeric data of an unsupported width.
    pub fn decode(kind: DataKind, bytes: &'r [u8]) -> Option<Self> {
        if bytes.is_empty() {
            return Some(Datum::Null(kind));
        }
        match kind {
            DataKind::Binary => Some(Datum::Binary(bytes)),
            DataKind::String => Some(Datum::String(bytes)),
            DataKind::Integer => decode_integer(bytes).map(Datum::Integer),
            DataKind::Real => decode_real(bytes).map(Datum::Real),
        }
    }

    /// Type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Null(_) => "null",
            Datum::Binary(_) => "binary",
            Datum::String(_) => "string",
            Datum::Integer(_) => "integer",
            Datum::Real(_) => "real",
            Datum::Boolean(_) => "boolean",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null(_))
    }

    /// Byte view for Binary/String data; null byte-kinds read as empty
    pub fn as_bytes(&self) -> Option<&'r [u8]> {
        match self {
            Datum::Binary(b) | Datum::String(b) => Some(*b),
            Datum::Null(kind) if kind.is_bytes() => Some(&[]),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Datum::Integer(i) => Some(Number::Integer(*i)),
            Datum::Real(r) => Some(Number::Real(*r)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// Owned numeric value used for accumulator state
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Number {
    Integer(i64),
    Real(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Integer(i) => *i as f64,
            Number::Real(r) => *r,
        }
    }

    /// Compares with Integer/Real promotion; None if either side is NaN
    pub fn compare(&self, other: &Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => Some(a.cmp(b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }

    /// Adds two numbers, staying integral until an overflow forces Real
    pub fn add(&self, other: &Number) -> Number {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => match a.checked_add(*b) {
                Some(sum) => Number::Integer(sum),
                None => Number::Real(*a as f64 + *b as f64),
            },
            _ => Number::Real(self.as_f64() + other.as_f64()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bytes_decode_to_null() {
        assert_eq!(Datum::decode(DataKind::Integer, &[]), Some(Datum::Null(DataKind::Integer)));
        assert_eq!(Datum::decode(DataKind::String, b""), Some(Datum::Null(DataKind::String)));
    }

    #[test]
    fn test_decode_bad_width() {
        assert_eq!(Datum::decode(DataKind::Integer, &[1, 2, 3]), None);
        assert_eq!(Datum::decode(DataKind::Binary, &[1, 2, 3]), Some(Datum::Binary(&[1, 2, 3])));
    }

    #[test]
    fn test_null_bytes_view_is_empty() {
        assert_eq!(Datum::Null(DataKind::Binary).as_bytes(), Some(&b""[..]));
        assert_eq!(Datum::Null(DataKind::Real).as_bytes(), None);
    }

    #[test]
    fn test_number_promotion() {
        assert_eq!(Number::Integer(3).compare(&Number::Real(2.5)), Some(Ordering::Greater));
        assert_eq!(Number::Integer(2).compare(&Number::Integer(2)), Some(Ordering::Equal));
        assert_eq!(Number::Real(f64::NAN).compare(&Number::Integer(1)), None);
    }

    #[test]
    fn test_integer_add_overflow_promotes() {
        assert_eq!(Number::Integer(2).add(&Number::Integer(3)), Number::Integer(5));
        match Number::Integer(i64::MAX).add(&Number::Integer(1)) {
            Number::Real(r) => assert_eq!(r, i64::MAX as f64 + 1.0),
            other => panic!("expected real, got {:?}", other),
        }
        assert_eq!(Number::Integer(1).add(&Number::Real(0.5)), Number::Real(1.5));
    }
}
