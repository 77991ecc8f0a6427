//! Shared core of all operators which compute new fields from existing ones.
//!
//! `map`, `flat_map`, `map_to`, `flat_map_to`, `project` and `insert` all bind a list of
//! source fields to a function and write what it returns to a list of target fields. They
//! only differ in whether the targets are appended to the input tuple ([Mode::Augment]) or
//! replace it ([Mode::Replace]) and in how many results the function returns.
use std::sync::Arc;

use super::stateless_op::StatelessOp;
use crate::errorhandling::{ConstructionError, OperatorError};
use crate::stream::{Output, StreamBuilder};
use crate::types::{FieldInput, FieldOutput, Fields, Schema, Tuple, Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// output = input fields followed by the target fields
    Augment,
    /// output = target fields only
    Replace,
}

/// Declared arity and field types of one side of a field function
#[derive(Debug, Clone)]
pub(crate) struct Signature {
    pub(crate) arity: Option<usize>,
    pub(crate) types: Vec<ValueType>,
}

impl Signature {
    pub(crate) fn input<I: FieldInput>(fields: usize) -> Self {
        Self {
            arity: I::ARITY,
            types: I::value_types(fields),
        }
    }

    pub(crate) fn output<O: FieldOutput>(fields: usize) -> Self {
        Self {
            arity: O::ARITY,
            types: O::value_types(fields),
        }
    }
}

/// Type-erased field function: receives the source values and emits zero or more lists of
/// target values
pub(crate) type ApplyFn =
    dyn Fn(Vec<Value>, &mut dyn FnMut(Vec<Value>)) -> Result<(), OperatorError> + Send + Sync;

/// Check that `fields` exist in `schema`, are unique and fit the function's parameters
pub(crate) fn bind_inputs(
    operator: &str,
    schema: &Schema,
    fields: &Fields,
    signature: &Signature,
) -> Result<(), ConstructionError> {
    check_unique(operator, fields)?;
    for field in fields.names() {
        if !schema.contains(field) {
            return Err(ConstructionError::UnknownField {
                operator: operator.to_owned(),
                field: field.to_owned(),
            });
        }
    }
    if let Some(expected) = signature.arity {
        if expected != fields.len() {
            return Err(ConstructionError::InputArity {
                operator: operator.to_owned(),
                expected,
                found: fields.len(),
            });
        }
    }
    for (field, expected) in fields.names().zip(signature.types.iter()) {
        let found = schema.get(field).unwrap_or(ValueType::Any);
        if !expected.accepts(found) {
            return Err(ConstructionError::FieldType {
                operator: operator.to_owned(),
                field: field.to_owned(),
                expected: *expected,
                found,
            });
        }
    }
    Ok(())
}

pub(crate) fn check_unique(operator: &str, fields: &Fields) -> Result<(), ConstructionError> {
    match fields.first_duplicate() {
        Some(field) => Err(ConstructionError::DuplicateField {
            operator: operator.to_owned(),
            field: field.to_owned(),
        }),
        None => Ok(()),
    }
}

/// Read the values of the given fields from a tuple
pub(crate) fn gather(tuple: &Tuple, fields: &[String]) -> Result<Vec<Value>, OperatorError> {
    fields
        .iter()
        .map(|f| {
            tuple
                .get(f)
                .cloned()
                .ok_or_else(|| OperatorError::MissingField(f.clone()))
        })
        .collect()
}

/// Source and target fields of a transformation with the declared function signature
pub(crate) struct FieldTransform {
    pub(crate) inputs: Fields,
    pub(crate) outputs: Fields,
    pub(crate) mode: Mode,
    pub(crate) input_sig: Signature,
    pub(crate) output_sig: Signature,
}

/// Append the field transformation to the stream
pub(crate) fn transform(
    stream: StreamBuilder,
    name: &str,
    spec: FieldTransform,
    apply: Arc<ApplyFn>,
) -> Result<StreamBuilder, ConstructionError> {
    let FieldTransform {
        inputs,
        outputs,
        mode,
        input_sig,
        output_sig,
    } = spec;
    let schema = stream.schema();
    bind_inputs(name, schema, &inputs, &input_sig)?;
    check_unique(name, &outputs)?;
    if let Some(expected) = output_sig.arity {
        if expected != outputs.len() {
            return Err(ConstructionError::OutputArity {
                operator: name.to_owned(),
                expected,
                found: outputs.len(),
            });
        }
    }

    let mut out_schema = match mode {
        Mode::Augment => {
            if let Some(field) = outputs.names().find(|f| schema.contains(f)) {
                return Err(ConstructionError::FieldCollision {
                    operator: name.to_owned(),
                    field: field.to_owned(),
                });
            }
            schema.clone()
        }
        Mode::Replace => Schema::new(),
    };
    for (i, field) in outputs.names().enumerate() {
        let ty = output_sig.types.get(i).copied().unwrap_or(ValueType::Any);
        out_schema.insert(field, ty);
    }

    let inputs = inputs.as_slice().to_vec();
    let outputs = outputs.as_slice().to_vec();
    let logic = move |tuple: &Tuple, output: &mut Output| -> Result<(), OperatorError> {
        let args = gather(tuple, &inputs)?;
        let mut produced = Vec::new();
        apply(args, &mut |values: Vec<Value>| produced.push(values))?;
        for values in produced {
            if values.len() != outputs.len() {
                return Err(OperatorError::Arity {
                    expected: outputs.len(),
                    found: values.len(),
                });
            }
            let mut result = match mode {
                Mode::Augment => tuple.clone(),
                Mode::Replace => Tuple::new(),
            };
            for (field, value) in outputs.iter().zip(values) {
                result.insert(field.clone(), value);
            }
            output.send(result);
        }
        Ok(())
    };
    stream.stateless_op(name, out_schema, logic)
}

/// Erase a one-to-one field function
pub(crate) fn apply_one<I, O>(f: impl Fn(I) -> O + Send + Sync + 'static) -> Arc<ApplyFn>
where
    I: FieldInput + 'static,
    O: FieldOutput + 'static,
{
    Arc::new(
        move |args: Vec<Value>, emit: &mut dyn FnMut(Vec<Value>)| -> Result<(), OperatorError> {
            emit(f(I::from_values(args)?).into_values()?);
            Ok(())
        },
    )
}

/// Erase a one-to-many field function
pub(crate) fn apply_flat<I, It>(f: impl Fn(I) -> It + Send + Sync + 'static) -> Arc<ApplyFn>
where
    I: FieldInput + 'static,
    It: IntoIterator + 'static,
    It::Item: FieldOutput,
{
    Arc::new(
        move |args: Vec<Value>, emit: &mut dyn FnMut(Vec<Value>)| -> Result<(), OperatorError> {
            for item in f(I::from_values(args)?) {
                emit(item.into_values()?);
            }
            Ok(())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::plays_schema;

    #[test]
    fn bind_reports_first_problem() {
        let schema = plays_schema();
        let sig = Signature::input::<i64>(1);
        assert!(matches!(
            bind_inputs("m", &schema, &"missing".into(), &sig),
            Err(ConstructionError::UnknownField { field, .. }) if field == "missing"
        ));
        assert!(matches!(
            bind_inputs("m", &schema, &["id", "id"].into(), &sig),
            Err(ConstructionError::DuplicateField { .. })
        ));
        assert!(matches!(
            bind_inputs("m", &schema, &["id", "plays"].into(), &sig),
            Err(ConstructionError::InputArity {
                expected: 1,
                found: 2,
                ..
            })
        ));
        assert!(matches!(
            bind_inputs("m", &schema, &"plays".into(), &sig),
            Err(ConstructionError::FieldType {
                expected: ValueType::Int,
                found: ValueType::Slice,
                ..
            })
        ));
        assert!(bind_inputs("m", &schema, &"id".into(), &sig).is_ok());
    }

    #[test]
    fn gather_reports_missing_field() {
        let t = crate::tuple! {"a" => 1i64};
        assert!(matches!(
            gather(&t, &["b".to_owned()]),
            Err(OperatorError::MissingField(f)) if f == "b"
        ));
    }
}
