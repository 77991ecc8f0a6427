use super::transform::{apply_one, transform, FieldTransform, Mode, Signature};
use crate::errorhandling::ConstructionError;
use crate::stream::StreamBuilder;
use crate::types::{FieldInput, FieldOutput, Fields};

/// Compute new fields from existing ones, one result per tuple
pub trait Map: super::sealed::Sealed {
    /// Map applies a function to the `inputs` fields of every tuple and appends the result
    /// as the `outputs` fields. All input fields are kept.
    ///
    /// The function receives a single value for one input field or a Rust tuple for several,
    /// and returns one value per output field in the same way. Its signature is checked
    /// against the stream when the operator is added: field names must exist, arity and
    /// types must match and outputs must not collide with existing fields.
    ///
    /// # Example
    /// ```rust
    /// use tuplestream::operators::*;
    /// use tuplestream::slice::{Cell, Slice};
    /// use tuplestream::sinks::VecSink;
    /// use tuplestream::sources::TupleSource;
    /// use tuplestream::stream::Pipeline;
    /// use tuplestream::tuple;
    /// use tuplestream::types::Value;
    ///
    /// let plays = Slice::new([Cell::new(3, 3i64), Cell::new(2, 7i64), Cell::new(1, 2i64)]);
    /// let source = TupleSource::infer(vec![tuple! {"id" => 1i64, "plays" => plays}]);
    /// let sink = VecSink::new();
    ///
    /// Pipeline::new()
    ///     .source("plays", source).unwrap()
    ///     .map("total", "plays", "total", |s: Slice| s.sum()).unwrap()
    ///     .write("sink", sink.clone()).unwrap();
    ///
    /// let out = sink.drain_vec(..);
    /// assert_eq!(out[0].get("total"), Some(&Value::Int(12)));
    /// assert_eq!(out[0].len(), 3);
    /// ```
    fn map<I, O>(
        self,
        name: &str,
        inputs: impl Into<Fields>,
        outputs: impl Into<Fields>,
        mapper: impl Fn(I) -> O + Send + Sync + 'static,
    ) -> Result<StreamBuilder, ConstructionError>
    where
        I: FieldInput + 'static,
        O: FieldOutput + 'static;

    /// Like [Map::map], but the output tuples consist of the `outputs` fields only.
    fn map_to<I, O>(
        self,
        name: &str,
        inputs: impl Into<Fields>,
        outputs: impl Into<Fields>,
        mapper: impl Fn(I) -> O + Send + Sync + 'static,
    ) -> Result<StreamBuilder, ConstructionError>
    where
        I: FieldInput + 'static,
        O: FieldOutput + 'static;
}

fn map_with_mode<I, O>(
    stream: StreamBuilder,
    name: &str,
    inputs: Fields,
    outputs: Fields,
    mode: Mode,
    mapper: impl Fn(I) -> O + Send + Sync + 'static,
) -> Result<StreamBuilder, ConstructionError>
where
    I: FieldInput + 'static,
    O: FieldOutput + 'static,
{
    let spec = FieldTransform {
        input_sig: Signature::input::<I>(inputs.len()),
        output_sig: Signature::output::<O>(outputs.len()),
        inputs,
        outputs,
        mode,
    };
    transform(stream, name, spec, apply_one(mapper))
}

impl Map for StreamBuilder {
    fn map<I, O>(
        self,
        name: &str,
        inputs: impl Into<Fields>,
        outputs: impl Into<Fields>,
        mapper: impl Fn(I) -> O + Send + Sync + 'static,
    ) -> Result<StreamBuilder, ConstructionError>
    where
        I: FieldInput + 'static,
        O: FieldOutput + 'static,
    {
        map_with_mode(
            self,
            name,
            inputs.into(),
            outputs.into(),
            Mode::Augment,
            mapper,
        )
    }

    fn map_to<I, O>(
        self,
        name: &str,
        inputs: impl Into<Fields>,
        outputs: impl Into<Fields>,
        mapper: impl Fn(I) -> O + Send + Sync + 'static,
    ) -> Result<StreamBuilder, ConstructionError>
    where
        I: FieldInput + 'static,
        O: FieldOutput + 'static,
    {
        map_with_mode(
            self,
            name,
            inputs.into(),
            outputs.into(),
            Mode::Replace,
            mapper,
        )
    }
}
