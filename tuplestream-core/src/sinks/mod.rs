//! Sinks for writing tuples out of a pipeline
mod column;
mod file;
mod stdout;
mod table;
mod vec_sink;

use thiserror::Error;

use crate::keys::KeyError;
use crate::types::{Schema, Tuple, ValueType};

pub use column::{CellWriter, ColumnSink, VersionPolicy};
pub use file::{FileFormat, FileSink};
pub use stdout::StdOutSink;
pub use table::{InMemoryTable, TableLookup, TableReader};
pub use vec_sink::VecSink;

/// Errors raised by sinks
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing to the output failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A tuple could not be serialized
    #[error("failed to encode tuple: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    /// An entity key could not be built or encoded
    #[error(transparent)]
    Key(#[from] KeyError),
    /// The stream lacks a field the sink needs
    #[error("sink requires field '{0}'")]
    MissingField(String),
    /// A field the sink needs has the wrong type
    #[error("field '{field}' must be of type {expected}, found {found}")]
    FieldType {
        /// the offending field
        field: String,
        /// type the sink needs
        expected: ValueType,
        /// type the stream declares
        found: ValueType,
    },
    /// The sink is misconfigured or received data it can not write
    #[error("{0}")]
    Invalid(String),
}

/// A stream output which takes tuples, usually writing them to some external system.
/// For users it is normally not necessary to implement this trait unless they are writing
/// custom outputs.
pub trait TupleSink: Send + 'static {
    /// Check the schema of the stream when the sink is registered.
    /// Rejecting the schema fails the pipeline construction.
    fn validate(&mut self, _name: &str, _schema: &Schema) -> Result<(), SinkError> {
        Ok(())
    }

    /// Called once at the start of every run, before any tuple is written
    fn start(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Write a single tuple
    fn write(&mut self, tuple: Tuple) -> Result<(), SinkError>;

    /// Called once after the last tuple of a run
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Check that `schema` declares `field` with one of the `allowed` types
pub(crate) fn require_field(
    schema: &Schema,
    field: &str,
    allowed: &[ValueType],
) -> Result<(), SinkError> {
    let found = schema
        .get(field)
        .ok_or_else(|| SinkError::MissingField(field.to_owned()))?;
    if found == ValueType::Any || allowed.contains(&found) {
        Ok(())
    } else {
        Err(SinkError::FieldType {
            field: field.to_owned(),
            expected: allowed.first().copied().unwrap_or(ValueType::Any),
            found,
        })
    }
}
