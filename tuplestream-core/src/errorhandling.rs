//! Errors raised while building pipelines and while processing single tuples.
use thiserror::Error;

use crate::lookup::LookupError;
use crate::sinks::SinkError;
use crate::slice::SliceError;
use crate::sources::SourceError;
use crate::types::{Schema, TypeMismatch, ValueType};

/// Errors detected while a pipeline is assembled. These always abort the assembly, no tuple
/// is ever processed by an invalid pipeline.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// Operator names must be unique within one pipeline
    #[error("operator name '{0}' is used more than once")]
    NonUniqueName(String),
    /// A field list names a field the stream does not declare
    #[error("operator '{operator}' refers to unknown field '{field}'")]
    UnknownField {
        /// name of the operator being added
        operator: String,
        /// the unknown field
        field: String,
    },
    /// A field list names the same field twice
    #[error("operator '{operator}' names field '{field}' more than once")]
    DuplicateField {
        /// name of the operator being added
        operator: String,
        /// the repeated field
        field: String,
    },
    /// The function consumes a different number of fields than were given
    #[error("function of operator '{operator}' takes {expected} fields but {found} were given")]
    InputArity {
        /// name of the operator being added
        operator: String,
        /// parameters of the function
        expected: usize,
        /// source fields given
        found: usize,
    },
    /// The function produces a different number of values than target fields were given
    #[error(
        "function of operator '{operator}' produces {expected} values \
         but {found} target fields were given"
    )]
    OutputArity {
        /// name of the operator being added
        operator: String,
        /// values the function returns
        expected: usize,
        /// target fields given
        found: usize,
    },
    /// A parameter type does not accept the declared type of its source field
    #[error(
        "operator '{operator}' expects field '{field}' of type {expected}, \
         stream declares {found}"
    )]
    FieldType {
        /// name of the operator being added
        operator: String,
        /// the source field
        field: String,
        /// type the function expects
        expected: ValueType,
        /// type the stream declares
        found: ValueType,
    },
    /// An augmenting operator would overwrite an existing field. Use `rename` first.
    #[error("operator '{operator}' would overwrite existing field '{field}'")]
    FieldCollision {
        /// name of the operator being added
        operator: String,
        /// the colliding field
        field: String,
    },
    /// Both sides of a join must name the same number of key fields
    #[error("join '{operator}' has {left} left but {right} right key fields")]
    JoinKeyArity {
        /// name of the join
        operator: String,
        /// number of left key fields
        left: usize,
        /// number of right key fields
        right: usize,
    },
    /// Key fields at the same position must have equal types
    #[error(
        "join '{operator}' compares {left} of type {left_type} \
         with {right} of type {right_type}"
    )]
    JoinKeyType {
        /// name of the join
        operator: String,
        /// left key field
        left: String,
        /// right key field
        right: String,
        /// declared type of the left key
        left_type: ValueType,
        /// declared type of the right key
        right_type: ValueType,
    },
    /// Ordered reductions need a declared sort order
    #[error("ordered reduction '{operator}' requires sort_by on the grouped stream")]
    UnorderedReduction {
        /// name of the reduction
        operator: String,
    },
    /// Unioned streams must have the same field names in the same order
    #[error("operator '{operator}' combines streams with different layouts {expected} and {found}")]
    LayoutMismatch {
        /// name of the union
        operator: String,
        /// layout of the first stream
        expected: Schema,
        /// layout of the mismatching stream
        found: Schema,
    },
    /// Streams of different pipelines can not be combined
    #[error("operator '{operator}' combines streams of different pipelines")]
    ForeignPipeline {
        /// name of the combining operator
        operator: String,
    },
    /// The source can not produce a valid stream layout
    #[error("source '{operator}' is invalid: {source}")]
    Source {
        /// name of the source
        operator: String,
        /// reason given by the source
        #[source]
        source: SourceError,
    },
    /// The sink does not accept the stream layout
    #[error("sink '{operator}' rejected the stream: {source}")]
    Sink {
        /// name of the sink
        operator: String,
        /// reason given by the sink
        #[source]
        source: SinkError,
    },
}

/// Failure processing a single tuple
#[derive(Debug, Error)]
pub enum OperatorError {
    /// A slice selection or reduction failed
    #[error(transparent)]
    Slice(#[from] SliceError),
    /// A value had an unexpected type
    #[error(transparent)]
    Type(#[from] TypeMismatch),
    /// A lookup into an external store failed
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// The tuple lacks a field the operator reads
    #[error("tuple has no field '{0}'")]
    MissingField(String),
    /// A variadic function returned the wrong number of values
    #[error("expected {expected} values, found {found}")]
    Arity {
        /// number of target fields
        expected: usize,
        /// number of values returned
        found: usize,
    },
    /// Custom error message raised by a user function
    #[error("{0}")]
    Failed(String),
    /// Any other error raised by a user function
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl OperatorError {
    /// Wrap any error raised by a user function
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<String> for OperatorError {
    fn from(value: String) -> Self {
        Self::Failed(value)
    }
}

impl From<&str> for OperatorError {
    fn from(value: &str) -> Self {
        Self::Failed(value.to_owned())
    }
}

/// What to do when an operator fails on a single tuple
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole run with the first failure
    #[default]
    FailFast,
    /// Drop the failing tuple, log it and count it
    SkipAndCount,
}
