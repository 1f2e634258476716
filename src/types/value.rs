//! Typed values referenced by filter parts
//!
//! A typed value is a borrowed view over bytes plus the kind used to
//! interpret them. The view never owns its bytes: the caller keeps the
//! buffer alive until the call that uses the value returns.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Data kind of a key leaf or constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    /// Opaque bytes, compared lexicographically
    Binary,
    /// UTF-8 (or arbitrary) bytes, compared lexicographically
    String,
    /// Little-endian signed integer of width 1, 2, 4 or 8
    Integer,
    /// Little-endian IEEE-754 float of width 4 or 8
    Real,
}

impl DataKind {
    /// Returns the lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Binary => "binary",
            DataKind::String => "string",
            DataKind::Integer => "integer",
            DataKind::Real => "real",
        }
    }

    /// Returns true for Integer and Real
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataKind::Integer | DataKind::Real)
    }

    /// Returns true for Binary and String
    pub fn is_bytes(&self) -> bool {
        matches!(self, DataKind::Binary | DataKind::String)
    }

    /// Returns true if a value of this kind may be `width` bytes long
    pub fn accepts_width(&self, width: usize) -> bool {
        match self {
            DataKind::Binary | DataKind::String => true,
            DataKind::Integer => matches!(width, 1 | 2 | 4 | 8),
            DataKind::Real => matches!(width, 4 | 8),
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sub-range of a larger stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub offset: usize,
    pub len: usize,
}

impl ByteRange {
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// Exclusive end of the range, or None if it overflows
    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.len)
    }

    /// Restricts `bytes` to this range.
    ///
    /// Returns None if the range reaches past the end of `bytes`.
    pub fn apply<'b>(&self, bytes: &'b [u8]) -> Option<&'b [u8]> {
        let end = self.end()?;
        bytes.get(self.offset..end)
    }
}

/// A borrowed, typed view over bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypedValue<'a> {
    kind: DataKind,
    bytes: &'a [u8],
    range: Option<ByteRange>,
}

impl<'a> TypedValue<'a> {
    pub fn new(kind: DataKind, bytes: &'a [u8]) -> Self {
        Self {
            kind,
            bytes,
            range: None,
        }
    }

    pub fn binary(bytes: &'a [u8]) -> Self {
        Self::new(DataKind::Binary, bytes)
    }

    pub fn string(s: &'a str) -> Self {
        Self::new(DataKind::String, s.as_bytes())
    }

    /// Integer value over already-encoded little-endian bytes
    pub fn integer(bytes: &'a [u8]) -> Self {
        Self::new(DataKind::Integer, bytes)
    }

    /// Real value over already-encoded little-endian bytes
    pub fn real(bytes: &'a [u8]) -> Self {
        Self::new(DataKind::Real, bytes)
    }

    /// Restricts evaluation to `len` bytes starting at `offset`
    pub fn with_range(mut self, offset: usize, len: usize) -> Self {
        self.range = Some(ByteRange::new(offset, len));
        self
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    /// The full underlying bytes, ignoring any range
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn range(&self) -> Option<ByteRange> {
        self.range
    }

    /// The bytes evaluation sees, or None if the range is out of bounds
    pub fn view(&self) -> Option<&'a [u8]> {
        match self.range {
            Some(range) => range.apply(self.bytes),
            None => Some(self.bytes),
        }
    }
}

/// Decodes a little-endian signed integer of width 1, 2, 4 or 8
pub fn decode_integer(bytes: &[u8]) -> Option<i64> {
    match bytes.len() {
        1 => Some(bytes[0] as i8 as i64),
        2 => Some(i16::from_le_bytes([bytes[0], bytes[1]]) as i64),
        4 => Some(i32::from_le_bytes(bytes.try_into().ok()?) as i64),
        8 => Some(i64::from_le_bytes(bytes.try_into().ok()?)),
        _ => None,
    }
}

/// Decodes a little-endian IEEE-754 float of width 4 or 8
pub fn decode_real(bytes: &[u8]) -> Option<f64> {
    match bytes.len() {
        4 => Some(f32::from_le_bytes(bytes.try_into().ok()?) as f64),
        8 => Some(f64::from_le_bytes(bytes.try_into().ok()?)),
        _ => None,
    }
}
