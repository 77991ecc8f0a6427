use std::sync::Arc;

use super::{SourceError, StreamSource, TupleIter};
use crate::types::{Schema, Tuple, ValueType};

/// A source emitting tuples held in memory, mainly useful for tests and demos.
///
/// Every tuple is checked against the declared schema when the source is scanned.
/// `Null` is accepted for every field.
#[derive(Debug, Clone)]
pub struct TupleSource {
    schema: Schema,
    tuples: Arc<Vec<Tuple>>,
}

impl TupleSource {
    /// Create a source with an explicit schema
    pub fn new(schema: Schema, tuples: Vec<Tuple>) -> Self {
        Self {
            schema,
            tuples: Arc::new(tuples),
        }
    }

    /// Create a source taking its schema from the first tuple.
    /// `Null` values declare a dynamically typed field.
    pub fn infer(tuples: Vec<Tuple>) -> Self {
        let schema = tuples
            .first()
            .map(|t| {
                t.iter()
                    .map(|(name, value)| match value.value_type() {
                        ValueType::Null => (name, ValueType::Any),
                        other => (name, other),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self::new(schema, tuples)
    }

    fn check(&self, tuple: &Tuple) -> Result<(), SourceError> {
        let layout_matches = tuple.len() == self.schema.len()
            && tuple.names().zip(self.schema.names()).all(|(a, b)| a == b);
        if !layout_matches {
            return Err(SourceError::Invalid(format!(
                "tuple {tuple} does not match schema {}",
                self.schema
            )));
        }
        for ((name, value), (_, declared)) in tuple.iter().zip(self.schema.iter()) {
            if !value.is_null() && !declared.accepts(value.value_type()) {
                return Err(SourceError::Invalid(format!(
                    "field '{name}' holds a {} but is declared as {declared}",
                    value.value_type()
                )));
            }
        }
        Ok(())
    }
}

impl StreamSource for TupleSource {
    fn schema(&self) -> Result<Schema, SourceError> {
        Ok(self.schema.clone())
    }

    fn scan(&self) -> Result<TupleIter<'_>, SourceError> {
        Ok(Box::new(self.tuples.iter().map(|t| {
            self.check(t)?;
            Ok(t.clone())
        })))
    }
}
