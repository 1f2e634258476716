//! Filters and pipelines: append-only containers of parts and filters

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{PipelineError, PipelineResult};
use super::part::FilterPart;
use super::validator::PipelineValidator;

/// Current (and only supported) pipeline format version
pub const PIPELINE_VERSION: u64 = 1;

/// What a filter produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Records in, records meeting the condition out
    Condition,
    /// Records in, one running scalar out
    Aggregation,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Condition => "condition",
            FilterKind::Aggregation => "aggregation",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered parts read as a postfix expression
#[derive(Debug, Clone, PartialEq)]
pub struct Filter<'a> {
    kind: FilterKind,
    parts: Vec<FilterPart<'a>>,
}

impl<'a> Filter<'a> {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            parts: Vec::new(),
        }
    }

    pub fn condition() -> Self {
        Self::new(FilterKind::Condition)
    }

    pub fn aggregation() -> Self {
        Self::new(FilterKind::Aggregation)
    }

    /// Pushes a part onto the end of the filter.
    ///
    /// Type and arity errors surface at validation, not here.
    pub fn add_part(&mut self, part: FilterPart<'a>) -> PipelineResult<()> {
        self.parts
            .try_reserve(1)
            .map_err(|_| PipelineError::capacity("filter"))?;
        self.parts.push(part);
        Ok(())
    }

    /// Builder form of `add_part`
    pub fn with_part(mut self, part: FilterPart<'a>) -> PipelineResult<Self> {
        self.add_part(part)?;
        Ok(self)
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn parts(&self) -> &[FilterPart<'a>] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Versioned sequence of filters
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline<'a> {
    version: u64,
    filters: Vec<Filter<'a>>,
}

impl<'a> Pipeline<'a> {
    /// Creates an empty pipeline at the current version
    pub fn new() -> Self {
        Self::with_version(PIPELINE_VERSION)
    }

    pub fn with_version(version: u64) -> Self {
        Self {
            version,
            filters: Vec::new(),
        }
    }

    /// Pushes a filter onto the end of the pipeline
    pub fn add_filter(&mut self, filter: Filter<'a>) -> PipelineResult<()> {
        self.filters
            .try_reserve(1)
            .map_err(|_| PipelineError::capacity("pipeline"))?;
        self.filters.push(filter);
        Ok(())
    }

    /// Builder form of `add_filter`
    pub fn with_filter(mut self, filter: Filter<'a>) -> PipelineResult<Self> {
        self.add_filter(filter)?;
        Ok(self)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn filters(&self) -> &[Filter<'a>] {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Validates structure. Read-only and repeatable.
    pub fn check(&self) -> PipelineResult<()> {
        PipelineValidator::check(self)
    }
}

impl Default for Pipeline<'_> {
    fn default() -> Self {
        Self::new()
    }
}
