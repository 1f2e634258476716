//! Filter parts: the nodes of a postfix expression

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ByteRange, DataKind, TypedValue};

/// Function codes a filter part can apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Function {
    // Logical
    Eq,
    Ne,
    Lt,
    Le,
    Ge,
    Gt,
    Like,
    IsNull,
    IsNotNull,
    And,
    Or,
    // Aggregate
    Sum,
    Min,
    Max,
    Avg,
}

impl Function {
    /// Number of operands the function pops
    pub fn arity(&self) -> usize {
        match self {
            Function::IsNull
            | Function::IsNotNull
            | Function::Sum
            | Function::Min
            | Function::Max
            | Function::Avg => 1,
            _ => 2,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Function::Sum | Function::Min | Function::Max | Function::Avg
        )
    }

    /// EQ, NE, LT, LE, GE, GT
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Function::Eq | Function::Ne | Function::Lt | Function::Le | Function::Ge | Function::Gt
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Function::Eq => "eq",
            Function::Ne => "ne",
            Function::Lt => "lt",
            Function::Le => "le",
            Function::Ge => "ge",
            Function::Gt => "gt",
            Function::Like => "like",
            Function::IsNull => "is_null",
            Function::IsNotNull => "is_not_null",
            Function::And => "and",
            Function::Or => "or",
            Function::Sum => "sum",
            Function::Min => "min",
            Function::Max => "max",
            Function::Avg => "avg",
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which key of the current record a leaf reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRef<'a> {
    ObjectId,
    DistributionKey,
    /// Named attribute; the name is borrowed from the caller
    AttributeKey(&'a [u8]),
}

impl KeyRef<'_> {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyRef::ObjectId => "oid",
            KeyRef::DistributionKey => "dkey",
            KeyRef::AttributeKey(_) => "akey",
        }
    }
}

/// One node of a filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPart<'a> {
    /// Pushes the current record's key or attribute value
    Key {
        key: KeyRef<'a>,
        kind: DataKind,
        range: Option<ByteRange>,
    },
    /// Pushes a literal
    Constant {
        kind: DataKind,
        values: Vec<TypedValue<'a>>,
    },
    /// Pops `num_operands` values and pushes one result
    Function { func: Function, num_operands: u32 },
}

impl<'a> FilterPart<'a> {
    /// Object id leaf
    pub fn oid(kind: DataKind) -> Self {
        Self::key(KeyRef::ObjectId, kind)
    }

    /// Distribution key leaf
    pub fn dkey(kind: DataKind) -> Self {
        Self::key(KeyRef::DistributionKey, kind)
    }

    /// Attribute value leaf for the attribute named `name`
    pub fn akey(name: &'a [u8], kind: DataKind) -> Self {
        Self::key(KeyRef::AttributeKey(name), kind)
    }

    pub fn key(key: KeyRef<'a>, kind: DataKind) -> Self {
        FilterPart::Key {
            key,
            kind,
            range: None,
        }
    }

    /// Single-value constant
    pub fn constant(value: TypedValue<'a>) -> Self {
        FilterPart::Constant {
            kind: value.kind(),
            values: vec![value],
        }
    }

    /// Constant carrying several values of one declared kind
    pub fn constants(kind: DataKind, values: Vec<TypedValue<'a>>) -> Self {
        FilterPart::Constant { kind, values }
    }

    /// Function part declaring the function's own arity
    pub fn function(func: Function) -> Self {
        FilterPart::Function {
            func,
            num_operands: func.arity() as u32,
        }
    }

    /// Function part with an explicit operand count
    pub fn function_with_operands(func: Function, num_operands: u32) -> Self {
        FilterPart::Function { func, num_operands }
    }

    /// Restricts a key leaf to a byte range of the stored value.
    ///
    /// Only key leaves carry a range; constants take theirs from
    /// `TypedValue::with_range`, and functions have no data.
    pub fn with_range(mut self, offset: usize, len: usize) -> Self {
        if let FilterPart::Key { range, .. } = &mut self {
            *range = Some(ByteRange::new(offset, len));
        }
        self
    }

    /// Declared data kind; None for functions
    pub fn data_kind(&self) -> Option<DataKind> {
        match self {
            FilterPart::Key { kind, .. } | FilterPart::Constant { kind, .. } => Some(*kind),
            FilterPart::Function { .. } => None,
        }
    }

    pub fn as_function(&self) -> Option<Function> {
        match self {
            FilterPart::Function { func, .. } => Some(*func),
            _ => None,
        }
    }

    /// Short name used in logs and errors
    pub fn type_name(&self) -> &'static str {
        match self {
            FilterPart::Key { key, .. } => key.as_str(),
            FilterPart::Constant { .. } => "const",
            FilterPart::Function { func, .. } => func.as_str(),
        }
    }
}
