use std::sync::Arc;

use super::transform::{transform, FieldTransform, Mode, Signature};
use crate::errorhandling::{ConstructionError, OperatorError};
use crate::stream::StreamBuilder;
use crate::types::{Fields, Value, ValueType};

/// Select which fields a stream carries
pub trait Project: super::sealed::Sealed {
    /// Keep only the given fields, in the given order.
    /// This is a [map_to](super::Map::map_to) with the identity function, the field types
    /// stay as declared.
    fn project(self, name: &str, fields: impl Into<Fields>)
        -> Result<StreamBuilder, ConstructionError>;

    /// Remove the given fields, keeping all others in their order
    fn discard(self, name: &str, fields: impl Into<Fields>)
        -> Result<StreamBuilder, ConstructionError>;
}

impl Project for StreamBuilder {
    fn project(
        self,
        name: &str,
        fields: impl Into<Fields>,
    ) -> Result<StreamBuilder, ConstructionError> {
        let fields = fields.into();
        let types: Vec<ValueType> = fields
            .names()
            .map(|f| self.schema().get(f).unwrap_or(ValueType::Any))
            .collect();
        let spec = FieldTransform {
            input_sig: Signature {
                arity: Some(fields.len()),
                types: vec![ValueType::Any; fields.len()],
            },
            output_sig: Signature {
                arity: Some(fields.len()),
                types,
            },
            inputs: fields.clone(),
            outputs: fields,
            mode: Mode::Replace,
        };
        let identity = Arc::new(
            |values: Vec<Value>, emit: &mut dyn FnMut(Vec<Value>)| -> Result<(), OperatorError> {
                emit(values);
                Ok(())
            },
        );
        transform(self, name, spec, identity)
    }

    fn discard(
        self,
        name: &str,
        fields: impl Into<Fields>,
    ) -> Result<StreamBuilder, ConstructionError> {
        let fields = fields.into();
        super::transform::check_unique(name, &fields)?;
        if let Some(field) = fields.names().find(|f| !self.schema().contains(f)) {
            return Err(ConstructionError::UnknownField {
                operator: name.to_owned(),
                field: field.to_owned(),
            });
        }
        let keep: Vec<&str> = self
            .schema()
            .names()
            .filter(|f| !fields.contains(f))
            .collect();
        let keep = Fields::from(keep);
        self.project(name, keep)
    }
}
