use std::sync::Arc;

use super::transform::{transform, FieldTransform, Mode, Signature};
use crate::errorhandling::{ConstructionError, OperatorError};
use crate::stream::StreamBuilder;
use crate::types::{Fields, IntoValue, Value};

/// Add constant fields
pub trait Insert: super::sealed::Sealed {
    /// Append a field holding the same value in every tuple
    fn insert(
        self,
        name: &str,
        field: &str,
        value: impl IntoValue,
    ) -> Result<StreamBuilder, ConstructionError>;
}

impl Insert for StreamBuilder {
    fn insert(
        self,
        name: &str,
        field: &str,
        value: impl IntoValue,
    ) -> Result<StreamBuilder, ConstructionError> {
        let value = value.into_value();
        let spec = FieldTransform {
            inputs: Fields::none(),
            outputs: Fields::from(field),
            mode: Mode::Augment,
            input_sig: Signature {
                arity: Some(0),
                types: Vec::new(),
            },
            output_sig: Signature {
                arity: Some(1),
                types: vec![value.value_type()],
            },
        };
        let constant = Arc::new(
            move |_: Vec<Value>, emit: &mut dyn FnMut(Vec<Value>)| -> Result<(), OperatorError> {
                emit(vec![value.clone()]);
                Ok(())
            },
        );
        transform(self, name, spec, constant)
    }
}

#[cfg(test)]
mod tests {
    use crate::errorhandling::ConstructionError;
    use crate::operators::*;
    use crate::stream::Pipeline;
    use crate::testing::{collect, numbers};
    use crate::types::{Value, ValueType};

    #[test]
    fn inserts_constant() {
        let stream = Pipeline::new()
            .source("numbers", numbers(3))
            .unwrap()
            .insert("source-tag", "origin", "test")
            .unwrap();
        assert_eq!(stream.schema().get("origin"), Some(ValueType::Str));
        assert!(collect(stream)
            .iter()
            .all(|t| t.get("origin") == Some(&Value::from("test"))));
    }

    #[test]
    fn insert_does_not_overwrite() {
        let err = Pipeline::new()
            .source("numbers", numbers(3))
            .unwrap()
            .insert("i", "n", 1i64)
            .unwrap_err();
        assert!(matches!(err, ConstructionError::FieldCollision { .. }));
    }
}
