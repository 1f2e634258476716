//! Structural validation of pipelines
//!
//! Checks run in strict order:
//! 1. Version is supported
//! 2. Every filter is a well-formed postfix expression (arity, stack, types)
//! 3. Condition filters precede aggregation filters
//! 4. Attribute keys and constants are present and well-formed
//!
//! Validation never mutates the pipeline and never touches storage.
//! Running it twice yields the same answer.

use super::errors::{PipelineError, PipelineResult};
use super::filter::{Filter, FilterKind, Pipeline, PIPELINE_VERSION};
use super::part::{FilterPart, Function, KeyRef};
use crate::types::{ByteRange, DataKind};

/// Static type of a value on the operand stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueType {
    Binary,
    String,
    Integer,
    Real,
    Boolean,
}

impl ValueType {
    fn is_bytes(&self) -> bool {
        matches!(self, ValueType::Binary | ValueType::String)
    }

    fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Real)
    }

    fn as_str(&self) -> &'static str {
        match self {
            ValueType::Binary => "binary",
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Real => "real",
            ValueType::Boolean => "boolean",
        }
    }
}

impl From<DataKind> for ValueType {
    fn from(kind: DataKind) -> Self {
        match kind {
            DataKind::Binary => ValueType::Binary,
            DataKind::String => ValueType::String,
            DataKind::Integer => ValueType::Integer,
            DataKind::Real => ValueType::Real,
        }
    }
}

/// What validation learned about one filter
#[derive(Debug, Clone, Copy)]
struct FilterShape {
    depth: usize,
    result: ValueType,
    aggregate: Option<Function>,
}

/// Execution facts derived from a validated pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePlan {
    conditions: usize,
    aggregates: Vec<Function>,
    max_depth: usize,
}

impl PipelinePlan {
    /// Number of leading condition filters
    pub fn conditions(&self) -> usize {
        self.conditions
    }

    /// Root aggregate of each aggregation filter, in pipeline order
    pub fn aggregates(&self) -> &[Function] {
        &self.aggregates
    }

    /// Deepest operand stack any filter needs
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn has_aggregates(&self) -> bool {
        !self.aggregates.is_empty()
    }
}

/// Pipeline structure validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validates a pipeline
    pub fn check(pipeline: &Pipeline<'_>) -> PipelineResult<()> {
        Self::analyze(pipeline).map(|_| ())
    }

    /// Validates a pipeline and returns the facts the executor needs
    pub fn analyze(pipeline: &Pipeline<'_>) -> PipelineResult<PipelinePlan> {
        // 1. Version
        if pipeline.version() != PIPELINE_VERSION {
            return Err(PipelineError::version_unsupported(pipeline.version()));
        }

        // 2. Per-filter stack consistency
        let mut max_depth = 0;
        let mut aggregates = Vec::new();
        for (index, filter) in pipeline.filters().iter().enumerate() {
            let shape = Self::check_filter(filter).map_err(|e| e.at_filter(index))?;
            Self::check_result(filter.kind(), &shape).map_err(|e| e.at_filter(index))?;
            max_depth = max_depth.max(shape.depth);
            if let Some(func) = shape.aggregate {
                aggregates.push(func);
            }
        }

        // 3. Condition prefix, aggregation suffix
        let mut conditions = 0;
        let mut seen_aggregation = false;
        for (index, filter) in pipeline.filters().iter().enumerate() {
            match filter.kind() {
                FilterKind::Condition if seen_aggregation => {
                    return Err(PipelineError::chain_order(index));
                }
                FilterKind::Condition => conditions += 1,
                FilterKind::Aggregation => seen_aggregation = true,
            }
        }

        // 4. References and constants
        for (index, filter) in pipeline.filters().iter().enumerate() {
            Self::check_references(filter).map_err(|e| e.at_filter(index))?;
        }

        Ok(PipelinePlan {
            conditions,
            aggregates,
            max_depth,
        })
    }

    /// Simulates the operand stack over the filter's parts
    fn check_filter(filter: &Filter<'_>) -> PipelineResult<FilterShape> {
        if filter.is_empty() {
            return Err(PipelineError::filter_empty(0));
        }

        let last = filter.len() - 1;
        let mut stack: Vec<ValueType> = Vec::with_capacity(filter.len());
        let mut depth = 0;
        let mut aggregate = None;

        for (i, part) in filter.parts().iter().enumerate() {
            let pushed = match part {
                FilterPart::Key { kind, .. } | FilterPart::Constant { kind, .. } => {
                    ValueType::from(*kind)
                }
                FilterPart::Function { func, num_operands } => {
                    let arity = func.arity();
                    if *num_operands as usize != arity {
                        return Err(
                            PipelineError::arity_mismatch(func.as_str(), arity, *num_operands)
                                .at_part(i),
                        );
                    }
                    if stack.len() < arity {
                        return Err(
                            PipelineError::stack_underflow(func.as_str(), arity, stack.len())
                                .at_part(i),
                        );
                    }
                    if func.is_aggregate() {
                        if aggregate.is_some() {
                            return Err(PipelineError::aggregate_misplaced(
                                "Filter may hold only one aggregate function",
                            )
                            .at_part(i));
                        }
                        if i != last {
                            return Err(PipelineError::aggregate_misplaced(
                                "Aggregate function must be the last part of its filter",
                            )
                            .at_part(i));
                        }
                        aggregate = Some(*func);
                    }
                    let operands = stack.split_off(stack.len() - arity);
                    Self::result_type(*func, &operands).map_err(|e| e.at_part(i))?
                }
            };
            stack.push(pushed);
            depth = depth.max(stack.len());
        }

        if stack.len() != 1 {
            return Err(PipelineError::stack_residue(stack.len()));
        }

        Ok(FilterShape {
            depth,
            result: stack[0],
            aggregate,
        })
    }

    /// Type produced by applying `func` to `operands`
    fn result_type(func: Function, operands: &[ValueType]) -> PipelineResult<ValueType> {
        let mismatch = || {
            let names: Vec<&str> = operands.iter().map(|t| t.as_str()).collect();
            PipelineError::operand_type(format!(
                "Function '{}' cannot take ({})",
                func,
                names.join(", ")
            ))
        };

        match func {
            Function::Eq | Function::Ne => {
                let (a, b) = (operands[0], operands[1]);
                let comparable = (a.is_bytes() && b.is_bytes())
                    || (a.is_numeric() && b.is_numeric())
                    || (a == ValueType::Boolean && b == ValueType::Boolean);
                if comparable {
                    Ok(ValueType::Boolean)
                } else {
                    Err(mismatch())
                }
            }
            Function::Lt | Function::Le | Function::Ge | Function::Gt => {
                let (a, b) = (operands[0], operands[1]);
                if (a.is_bytes() && b.is_bytes()) || (a.is_numeric() && b.is_numeric()) {
                    Ok(ValueType::Boolean)
                } else {
                    Err(mismatch())
                }
            }
            Function::Like => {
                if operands[0].is_bytes() && operands[1].is_bytes() {
                    Ok(ValueType::Boolean)
                } else {
                    Err(mismatch())
                }
            }
            Function::IsNull | Function::IsNotNull => {
                if operands[0] == ValueType::Boolean {
                    Err(mismatch())
                } else {
                    Ok(ValueType::Boolean)
                }
            }
            Function::And | Function::Or => {
                if operands[0] == ValueType::Boolean && operands[1] == ValueType::Boolean {
                    Ok(ValueType::Boolean)
                } else {
                    Err(mismatch())
                }
            }
            Function::Sum | Function::Min | Function::Max => {
                if operands[0].is_numeric() {
                    Ok(operands[0])
                } else {
                    Err(mismatch())
                }
            }
            Function::Avg => {
                if operands[0].is_numeric() {
                    Ok(ValueType::Real)
                } else {
                    Err(mismatch())
                }
            }
        }
    }

    /// Matches the filter's result against its kind
    fn check_result(kind: FilterKind, shape: &FilterShape) -> PipelineResult<()> {
        match kind {
            FilterKind::Condition => {
                if shape.aggregate.is_some() {
                    return Err(PipelineError::aggregate_misplaced(
                        "Condition filter cannot hold an aggregate function",
                    ));
                }
                if shape.result != ValueType::Boolean {
                    return Err(PipelineError::result_type(format!(
                        "Condition filter must produce boolean, produces {}",
                        shape.result.as_str()
                    )));
                }
            }
            FilterKind::Aggregation => {
                if shape.aggregate.is_none() {
                    return Err(PipelineError::aggregate_misplaced(
                        "Aggregation filter must end with an aggregate function",
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_references(filter: &Filter<'_>) -> PipelineResult<()> {
        for (i, part) in filter.parts().iter().enumerate() {
            match part {
                FilterPart::Key { key, range, .. } => {
                    if let KeyRef::AttributeKey(name) = key {
                        if name.is_empty() {
                            return Err(PipelineError::reference_missing(
                                "Attribute key name is empty",
                            )
                            .at_part(i));
                        }
                    }
                    if let Some(range) = range {
                        Self::check_range(range).map_err(|e| e.at_part(i))?;
                    }
                }
                FilterPart::Constant { kind, values } => {
                    let value = match values.as_slice() {
                        [] => {
                            return Err(PipelineError::reference_missing("Constant has no value")
                                .at_part(i));
                        }
                        [value] => value,
                        many => {
                            return Err(PipelineError::constant_invalid(format!(
                                "Constant holds {} values, functions take one",
                                many.len()
                            ))
                            .at_part(i));
                        }
                    };
                    if value.kind() != *kind {
                        return Err(PipelineError::constant_invalid(format!(
                            "Constant declared {} holds a {} value",
                            kind,
                            value.kind()
                        ))
                        .at_part(i));
                    }
                    if let Some(range) = value.range() {
                        Self::check_range(&range).map_err(|e| e.at_part(i))?;
                    }
                    let view = value.view().ok_or_else(|| {
                        PipelineError::constant_invalid("Byte range exceeds constant length")
                            .at_part(i)
                    })?;
                    if kind.is_numeric() && !kind.accepts_width(view.len()) {
                        return Err(PipelineError::constant_invalid(format!(
                            "{} constant cannot be {} bytes wide",
                            kind,
                            view.len()
                        ))
                        .at_part(i));
                    }
                }
                FilterPart::Function { .. } => {}
            }
        }
        Ok(())
    }

    fn check_range(range: &ByteRange) -> PipelineResult<()> {
        if range.len == 0 {
            return Err(PipelineError::constant_invalid("Byte range must be non-empty"));
        }
        if range.end().is_none() {
            return Err(PipelineError::constant_invalid("Byte range overflows"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::errors::PipelineErrorCode;
    use crate::types::TypedValue;

    const THIRTY: [u8; 8] = 30i64.to_le_bytes();

    fn age_gt_30() -> Filter<'static> {
        Filter::condition()
            .with_part(FilterPart::akey(b"age", DataKind::Integer))
            .unwrap()
            .with_part(FilterPart::constant(TypedValue::integer(&THIRTY)))
            .unwrap()
            .with_part(FilterPart::function(Function::Gt))
            .unwrap()
    }

    fn sum_of(name: &'static [u8]) -> Filter<'static> {
        Filter::aggregation()
            .with_part(FilterPart::akey(name, DataKind::Integer))
            .unwrap()
            .with_part(FilterPart::function(Function::Sum))
            .unwrap()
    }

    fn pipeline_of(filters: Vec<Filter<'static>>) -> Pipeline<'static> {
        let mut pipeline = Pipeline::new();
        for filter in filters {
            pipeline.add_filter(filter).unwrap();
        }
        pipeline
    }

    fn code_of(pipeline: &Pipeline<'_>) -> PipelineErrorCode {
        PipelineValidator::check(pipeline).unwrap_err().code()
    }

    #[test]
    fn test_plan_for_condition_and_aggregate() {
        let pipeline = pipeline_of(vec![age_gt_30(), sum_of(b"score")]);
        let plan = PipelineValidator::analyze(&pipeline).unwrap();
        assert_eq!(plan.conditions(), 1);
        assert_eq!(plan.aggregates(), &[Function::Sum]);
        assert_eq!(plan.max_depth(), 2);
    }

    #[test]
    fn test_empty_pipeline_is_valid() {
        let plan = PipelineValidator::analyze(&Pipeline::new()).unwrap();
        assert_eq!(plan.conditions(), 0);
        assert!(!plan.has_aggregates());
    }

    #[test]
    fn test_version_checked_first() {
        let mut pipeline = Pipeline::with_version(7);
        pipeline.add_filter(Filter::condition()).unwrap();
        assert_eq!(code_of(&pipeline), PipelineErrorCode::VersionUnsupported);
    }

    #[test]
    fn test_empty_filter_rejected() {
        let pipeline = pipeline_of(vec![Filter::condition()]);
        assert_eq!(code_of(&pipeline), PipelineErrorCode::FilterEmpty);
    }

    #[test]
    fn test_arity_mismatch() {
        let filter = Filter::condition()
            .with_part(FilterPart::dkey(DataKind::String))
            .unwrap()
            .with_part(FilterPart::function_with_operands(Function::IsNull, 2))
            .unwrap();
        let err = PipelineValidator::check(&pipeline_of(vec![filter])).unwrap_err();
        assert_eq!(err.code(), PipelineErrorCode::ArityMismatch);
        assert_eq!(err.filter(), Some(0));
        assert_eq!(err.part(), Some(1));
    }

    #[test]
    fn test_stack_underflow() {
        let filter = Filter::condition()
            .with_part(FilterPart::dkey(DataKind::String))
            .unwrap()
            .with_part(FilterPart::function(Function::Eq))
            .unwrap();
        assert_eq!(
            code_of(&pipeline_of(vec![filter])),
            PipelineErrorCode::StackUnderflow
        );
    }

    #[test]
    fn test_stack_residue() {
        let filter = Filter::condition()
            .with_part(FilterPart::dkey(DataKind::String))
            .unwrap()
            .with_part(FilterPart::dkey(DataKind::String))
            .unwrap();
        assert_eq!(
            code_of(&pipeline_of(vec![filter])),
            PipelineErrorCode::StackResidue
        );
    }

    #[test]
    fn test_incomparable_operands() {
        let filter = Filter::condition()
            .with_part(FilterPart::dkey(DataKind::String))
            .unwrap()
            .with_part(FilterPart::constant(TypedValue::integer(&THIRTY)))
            .unwrap()
            .with_part(FilterPart::function(Function::Lt))
            .unwrap();
        assert_eq!(
            code_of(&pipeline_of(vec![filter])),
            PipelineErrorCode::OperandType
        );
    }

    #[test]
    fn test_condition_must_be_boolean() {
        let filter = Filter::condition()
            .with_part(FilterPart::akey(b"age", DataKind::Integer))
            .unwrap();
        assert_eq!(
            code_of(&pipeline_of(vec![filter])),
            PipelineErrorCode::ResultType
        );
    }

    #[test]
    fn test_aggregation_requires_aggregate_root() {
        let filter = Filter::aggregation()
            .with_part(FilterPart::akey(b"score", DataKind::Integer))
            .unwrap();
        assert_eq!(
            code_of(&pipeline_of(vec![filter])),
            PipelineErrorCode::AggregateMisplaced
        );
    }

    #[test]
    fn test_aggregate_inside_condition_rejected() {
        let filter = Filter::condition()
            .with_part(FilterPart::akey(b"score", DataKind::Integer))
            .unwrap()
            .with_part(FilterPart::function(Function::Max))
            .unwrap();
        assert_eq!(
            code_of(&pipeline_of(vec![filter])),
            PipelineErrorCode::AggregateMisplaced
        );
    }

    #[test]
    fn test_aggregate_of_aggregate_rejected() {
        let filter = sum_of(b"score")
            .with_part(FilterPart::function(Function::Max))
            .unwrap();
        assert_eq!(
            code_of(&pipeline_of(vec![filter])),
            PipelineErrorCode::AggregateMisplaced
        );
    }

    #[test]
    fn test_aggregate_over_string_rejected() {
        let filter = Filter::aggregation()
            .with_part(FilterPart::akey(b"name", DataKind::String))
            .unwrap()
            .with_part(FilterPart::function(Function::Sum))
            .unwrap();
        assert_eq!(
            code_of(&pipeline_of(vec![filter])),
            PipelineErrorCode::OperandType
        );
    }

    #[test]
    fn test_chain_order() {
        let pipeline = pipeline_of(vec![sum_of(b"score"), age_gt_30()]);
        let err = PipelineValidator::check(&pipeline).unwrap_err();
        assert_eq!(err.code(), PipelineErrorCode::ChainOrder);
        assert_eq!(err.filter(), Some(1));
    }

    #[test]
    fn test_sibling_aggregations_allowed() {
        let pipeline = pipeline_of(vec![age_gt_30(), sum_of(b"score"), sum_of(b"age")]);
        let plan = PipelineValidator::analyze(&pipeline).unwrap();
        assert_eq!(plan.aggregates().len(), 2);
    }

    #[test]
    fn test_empty_attribute_name() {
        let filter = Filter::condition()
            .with_part(FilterPart::akey(b"", DataKind::Binary))
            .unwrap()
            .with_part(FilterPart::function(Function::IsNull))
            .unwrap();
        assert_eq!(
            code_of(&pipeline_of(vec![filter])),
            PipelineErrorCode::ReferenceMissing
        );
    }

    #[test]
    fn test_constant_without_value() {
        let filter = Filter::condition()
            .with_part(FilterPart::dkey(DataKind::String))
            .unwrap()
            .with_part(FilterPart::constants(DataKind::String, Vec::new()))
            .unwrap()
            .with_part(FilterPart::function(Function::Eq))
            .unwrap();
        assert_eq!(
            code_of(&pipeline_of(vec![filter])),
            PipelineErrorCode::ReferenceMissing
        );
    }

    #[test]
    fn test_bad_integer_constant_width() {
        let filter = Filter::condition()
            .with_part(FilterPart::akey(b"age", DataKind::Integer))
            .unwrap()
            .with_part(FilterPart::constant(TypedValue::integer(&[1, 2, 3])))
            .unwrap()
            .with_part(FilterPart::function(Function::Eq))
            .unwrap();
        assert_eq!(
            code_of(&pipeline_of(vec![filter])),
            PipelineErrorCode::ConstantInvalid
        );
    }

    #[test]
    fn test_zero_length_range_rejected() {
        let filter = Filter::condition()
            .with_part(FilterPart::dkey(DataKind::Binary).with_range(2, 0))
            .unwrap()
            .with_part(FilterPart::function(Function::IsNull))
            .unwrap();
        assert_eq!(
            code_of(&pipeline_of(vec![filter])),
            PipelineErrorCode::ConstantInvalid
        );
    }

    #[test]
    fn test_check_is_idempotent() {
        let pipeline = pipeline_of(vec![age_gt_30(), sum_of(b"score")]);
        let before = pipeline.clone();
        for _ in 0..3 {
            assert!(PipelineValidator::check(&pipeline).is_ok());
        }
        assert_eq!(pipeline, before);
    }
}
