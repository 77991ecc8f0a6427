use super::stateless_op::StatelessOp;
use super::transform::{bind_inputs, gather, Signature};
use crate::errorhandling::{ConstructionError, OperatorError};
use crate::stream::{Output, StreamBuilder};
use crate::types::{FieldInput, Fields, FilterOutput, Tuple};

/// Drop tuples not matching a predicate
pub trait Filter: super::sealed::Sealed {
    /// Filters the stream based on a given predicate.
    ///
    /// The predicate receives the values of the `inputs` fields of every tuple, bound the
    /// same way as for [map](super::Map::map). If it returns `true`, the tuple is retained
    /// and passed downstream, if it returns `false`, the tuple is discarded. Predicates may
    /// also return `Result<bool, E>` to fail on a tuple.
    ///
    /// # Example
    ///
    /// Only retain numbers <= 42
    /// ```rust
    /// use tuplestream::operators::*;
    /// use tuplestream::sinks::VecSink;
    /// use tuplestream::sources::TupleSource;
    /// use tuplestream::stream::Pipeline;
    /// use tuplestream::tuple;
    /// use tuplestream::types::Value;
    ///
    /// let sink = VecSink::new();
    /// let source = TupleSource::infer((0..100i64).map(|n| tuple! {"n" => n}).collect());
    ///
    /// Pipeline::new()
    ///     .source("numbers", source).unwrap()
    ///     .filter("small", "n", |n: i64| n <= 42).unwrap()
    ///     .write("sink", sink.clone()).unwrap();
    ///
    /// let out: Vec<Value> = sink.into_iter().filter_map(|t| t.get("n").cloned()).collect();
    /// let expected: Vec<Value> = (0..=42i64).map(Value::Int).collect();
    /// assert_eq!(out, expected);
    /// ```
    fn filter<I, P>(
        self,
        name: &str,
        inputs: impl Into<Fields>,
        predicate: impl Fn(I) -> P + Send + Sync + 'static,
    ) -> Result<StreamBuilder, ConstructionError>
    where
        I: FieldInput + 'static,
        P: FilterOutput + 'static;
}

impl Filter for StreamBuilder {
    fn filter<I, P>(
        self,
        name: &str,
        inputs: impl Into<Fields>,
        predicate: impl Fn(I) -> P + Send + Sync + 'static,
    ) -> Result<StreamBuilder, ConstructionError>
    where
        I: FieldInput + 'static,
        P: FilterOutput + 'static,
    {
        let inputs = inputs.into();
        bind_inputs(
            name,
            self.schema(),
            &inputs,
            &Signature::input::<I>(inputs.len()),
        )?;
        let schema = self.schema().clone();
        let inputs = inputs.as_slice().to_vec();
        self.stateless_op(
            name,
            schema,
            move |tuple: &Tuple, out: &mut Output| -> Result<(), OperatorError> {
                let args = I::from_values(gather(tuple, &inputs)?)?;
                if predicate(args).into_bool()? {
                    out.send(tuple.clone())
                }
                Ok(())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::errorhandling::ConstructionError;
    use crate::operators::*;
    use crate::slice::Slice;
    use crate::stream::Pipeline;
    use crate::testing::{collect, numbers, plays};
    use crate::types::Value;

    #[test]
    fn test_filter() {
        let stream = Pipeline::new()
            .source("numbers", numbers(100))
            .unwrap()
            .filter("less-than-42", "n", |n: i64| n < 42)
            .unwrap();
        let collected: Vec<Value> = collect(stream)
            .into_iter()
            .filter_map(|t| t.get("n").cloned())
            .collect();
        let expected: Vec<Value> = (0..42).map(Value::Int).collect();
        assert_eq!(expected, collected)
    }

    #[test]
    fn fallible_predicate() {
        let stream = Pipeline::new()
            .source("plays", plays())
            .unwrap()
            .filter("many", "plays", |s: Slice| s.sum().map(|v| v > Value::Int(10)))
            .unwrap();
        let out = collect(stream);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("id"), Some(&Value::Int(1)));
    }

    #[test]
    fn unknown_field() {
        let err = Pipeline::new()
            .source("numbers", numbers(1))
            .unwrap()
            .filter("f", "m", |_: i64| true)
            .unwrap_err();
        assert!(matches!(err, ConstructionError::UnknownField { .. }));
    }
}
