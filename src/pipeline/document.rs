//! Owned JSON document form of a pipeline
//!
//! A `PipelineDoc` owns every byte the pipeline refers to. Converting it
//! with `to_pipeline` yields a `Pipeline` that borrows from the document,
//! so the document must outlive any run that uses the pipeline.
//!
//! ```json
//! {
//!   "version": 1,
//!   "filters": [
//!     {"kind": "condition", "parts": [
//!       {"part": "akey", "name": "age", "kind": "integer"},
//!       {"part": "constant", "values": [{"integer": 30}]},
//!       {"part": "function", "func": "gt"}
//!     ]}
//!   ]
//! }
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::errors::{PipelineError, PipelineResult};
use super::filter::{Filter, FilterKind, Pipeline, PIPELINE_VERSION};
use super::part::{FilterPart, Function, KeyRef};
use crate::types::{decode_integer, decode_real, ByteRange, DataKind, TypedValue};

fn default_version() -> u64 {
    PIPELINE_VERSION
}

/// Serializable pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDoc {
    #[serde(default = "default_version")]
    pub version: u64,
    #[serde(default)]
    pub filters: Vec<FilterDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDoc {
    pub kind: FilterKind,
    #[serde(default)]
    pub parts: Vec<PartDoc>,
}

/// Serializable filter part, tagged by `"part"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "part", rename_all = "snake_case")]
pub enum PartDoc {
    Oid {
        kind: DataKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        range: Option<ByteRange>,
    },
    Dkey {
        kind: DataKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        range: Option<ByteRange>,
    },
    Akey {
        name: String,
        kind: DataKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        range: Option<ByteRange>,
    },
    Constant {
        /// Defaults to the kind of the first value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<DataKind>,
        values: Vec<ValueBytes>,
        /// Applied to every value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        range: Option<ByteRange>,
    },
    Function {
        func: Function,
        /// Defaults to the function's arity
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operands: Option<u32>,
    },
}

/// JSON shape of one constant value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ValueRepr {
    Integer(i64),
    Real(f64),
    String(String),
    /// Standard base64
    Binary(String),
}

/// Constant value together with its encoded bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ValueRepr", into = "ValueRepr")]
pub struct ValueBytes {
    repr: ValueRepr,
    bytes: Vec<u8>,
}

impl ValueBytes {
    pub fn integer(value: i64) -> Self {
        Self {
            repr: ValueRepr::Integer(value),
            bytes: value.to_le_bytes().to_vec(),
        }
    }

    pub fn real(value: f64) -> Self {
        Self {
            repr: ValueRepr::Real(value),
            bytes: value.to_le_bytes().to_vec(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        let value = value.into();
        let bytes = value.as_bytes().to_vec();
        Self {
            repr: ValueRepr::String(value),
            bytes,
        }
    }

    pub fn binary(bytes: &[u8]) -> Self {
        Self {
            repr: ValueRepr::Binary(STANDARD.encode(bytes)),
            bytes: bytes.to_vec(),
        }
    }

    pub fn kind(&self) -> DataKind {
        match self.repr {
            ValueRepr::Integer(_) => DataKind::Integer,
            ValueRepr::Real(_) => DataKind::Real,
            ValueRepr::String(_) => DataKind::String,
            ValueRepr::Binary(_) => DataKind::Binary,
        }
    }

    /// Encoded bytes: 8-byte little-endian for numbers
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copies a borrowed constant, ignoring its range
    fn from_value(value: &TypedValue<'_>) -> PipelineResult<Self> {
        let bytes = value.bytes();
        match value.kind() {
            DataKind::Integer => decode_integer(bytes).map(Self::integer).ok_or_else(|| {
                PipelineError::constant_invalid(format!(
                    "Integer constant cannot be {} bytes wide",
                    bytes.len()
                ))
            }),
            DataKind::Real => decode_real(bytes).map(Self::real).ok_or_else(|| {
                PipelineError::constant_invalid(format!(
                    "Real constant cannot be {} bytes wide",
                    bytes.len()
                ))
            }),
            DataKind::String => std::str::from_utf8(bytes)
                .map(Self::string)
                .map_err(|_| PipelineError::constant_invalid("String constant is not UTF-8")),
            DataKind::Binary => Ok(Self::binary(bytes)),
        }
    }
}

impl TryFrom<ValueRepr> for ValueBytes {
    type Error = String;

    fn try_from(repr: ValueRepr) -> Result<Self, Self::Error> {
        let bytes = match &repr {
            ValueRepr::Integer(i) => i.to_le_bytes().to_vec(),
            ValueRepr::Real(r) => r.to_le_bytes().to_vec(),
            ValueRepr::String(s) => s.as_bytes().to_vec(),
            ValueRepr::Binary(encoded) => STANDARD
                .decode(encoded)
                .map_err(|e| format!("invalid base64 in binary constant: {}", e))?,
        };
        Ok(Self { repr, bytes })
    }
}

impl From<ValueBytes> for ValueRepr {
    fn from(value: ValueBytes) -> Self {
        value.repr
    }
}

impl PipelineDoc {
    /// Builds a pipeline borrowing from this document.
    ///
    /// No validation happens here; call `Pipeline::check` on the result.
    pub fn to_pipeline(&self) -> PipelineResult<Pipeline<'_>> {
        let mut pipeline = Pipeline::with_version(self.version);
        for doc in &self.filters {
            let mut filter = Filter::new(doc.kind);
            for part in &doc.parts {
                filter.add_part(part.to_part())?;
            }
            pipeline.add_filter(filter)?;
        }
        Ok(pipeline)
    }

    /// Captures a pipeline as an owned document.
    ///
    /// Fails for data JSON cannot carry: non-UTF-8 names or string
    /// constants, and numeric constants of an invalid width.
    pub fn from_pipeline(pipeline: &Pipeline<'_>) -> PipelineResult<Self> {
        let mut filters = Vec::with_capacity(pipeline.len());
        for (index, filter) in pipeline.filters().iter().enumerate() {
            let mut parts = Vec::with_capacity(filter.len());
            for (i, part) in filter.parts().iter().enumerate() {
                let doc = PartDoc::from_part(part).map_err(|e| e.at_filter(index).at_part(i))?;
                parts.push(doc);
            }
            filters.push(FilterDoc {
                kind: filter.kind(),
                parts,
            });
        }
        Ok(Self {
            version: pipeline.version(),
            filters,
        })
    }
}

impl PartDoc {
    fn to_part(&self) -> FilterPart<'_> {
        match self {
            PartDoc::Oid { kind, range } => keyed(KeyRef::ObjectId, *kind, *range),
            PartDoc::Dkey { kind, range } => keyed(KeyRef::DistributionKey, *kind, *range),
            PartDoc::Akey { name, kind, range } => {
                keyed(KeyRef::AttributeKey(name.as_bytes()), *kind, *range)
            }
            PartDoc::Constant {
                kind,
                values,
                range,
            } => {
                let kind = kind
                    .or_else(|| values.first().map(ValueBytes::kind))
                    .unwrap_or(DataKind::Binary);
                let values = values
                    .iter()
                    .map(|v| {
                        let value = TypedValue::new(v.kind(), v.bytes());
                        match range {
                            Some(r) => value.with_range(r.offset, r.len),
                            None => value,
                        }
                    })
                    .collect();
                FilterPart::constants(kind, values)
            }
            PartDoc::Function { func, operands } => match operands {
                Some(n) => FilterPart::function_with_operands(*func, *n),
                None => FilterPart::function(*func),
            },
        }
    }

    fn from_part(part: &FilterPart<'_>) -> PipelineResult<Self> {
        match part {
            FilterPart::Key { key, kind, range } => Ok(match key {
                KeyRef::ObjectId => PartDoc::Oid {
                    kind: *kind,
                    range: *range,
                },
                KeyRef::DistributionKey => PartDoc::Dkey {
                    kind: *kind,
                    range: *range,
                },
                KeyRef::AttributeKey(name) => PartDoc::Akey {
                    name: String::from_utf8(name.to_vec()).map_err(|_| {
                        PipelineError::constant_invalid("Attribute key name is not UTF-8")
                    })?,
                    kind: *kind,
                    range: *range,
                },
            }),
            FilterPart::Constant { kind, values } => {
                let docs = values
                    .iter()
                    .map(ValueBytes::from_value)
                    .collect::<PipelineResult<Vec<_>>>()?;
                Ok(PartDoc::Constant {
                    kind: Some(*kind),
                    values: docs,
                    range: values.first().and_then(|v| v.range()),
                })
            }
            FilterPart::Function { func, num_operands } => Ok(PartDoc::Function {
                func: *func,
                operands: if *num_operands as usize == func.arity() {
                    None
                } else {
                    Some(*num_operands)
                },
            }),
        }
    }
}

fn keyed(key: KeyRef<'_>, kind: DataKind, range: Option<ByteRange>) -> FilterPart<'_> {
    let part = FilterPart::key(key, kind);
    match range {
        Some(r) => part.with_range(r.offset, r.len),
        None => part,
    }
}
