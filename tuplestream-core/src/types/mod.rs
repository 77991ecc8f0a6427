//! Types and traits describing the data flowing through tuplestream pipelines
mod schema;
mod signature;
mod tuple;
mod value;

pub use schema::{Fields, Schema};
pub use signature::{FieldInput, FieldOutput, FilterOutput, Values};
pub use tuple::Tuple;
pub use value::{FromValue, IntoValue, TypeMismatch, Value, ValueType};

/// Identifies a node within one pipeline
pub type NodeId = u64;
