use super::transform::{apply_flat, transform, FieldTransform, Mode, Signature};
use crate::errorhandling::ConstructionError;
use crate::stream::StreamBuilder;
use crate::types::{FieldInput, FieldOutput, Fields};

/// Compute new fields from existing ones, any number of results per tuple
pub trait FlatMap: super::sealed::Sealed {
    /// Apply a function returning an iterator to the `inputs` fields of every tuple. For
    /// every item the iterator yields, one tuple is emitted: the input tuple extended by the
    /// item as the `outputs` fields. An empty iterator drops the input tuple.
    ///
    /// Items are emitted in iterator order, directly after each other. Items may be
    /// `Result`s, a failing item fails the whole input tuple.
    ///
    /// # Example
    /// ```rust
    /// use tuplestream::operators::*;
    /// use tuplestream::sinks::VecSink;
    /// use tuplestream::sources::TupleSource;
    /// use tuplestream::stream::Pipeline;
    /// use tuplestream::tuple;
    ///
    /// let source = TupleSource::infer(vec![tuple! {"line" => "hello big world"}]);
    /// let sink = VecSink::new();
    ///
    /// Pipeline::new()
    ///     .source("lines", source).unwrap()
    ///     .flat_map("split", "line", "word", |line: String| {
    ///         line.split_whitespace().map(str::to_owned).collect::<Vec<_>>()
    ///     }).unwrap()
    ///     .write("sink", sink.clone()).unwrap();
    ///
    /// let words: Vec<_> = sink
    ///     .into_iter()
    ///     .map(|t| t.get("word").unwrap().to_string())
    ///     .collect();
    /// assert_eq!(words, vec!["hello", "big", "world"]);
    /// ```
    fn flat_map<I, It>(
        self,
        name: &str,
        inputs: impl Into<Fields>,
        outputs: impl Into<Fields>,
        mapper: impl Fn(I) -> It + Send + Sync + 'static,
    ) -> Result<StreamBuilder, ConstructionError>
    where
        I: FieldInput + 'static,
        It: IntoIterator + 'static,
        It::Item: FieldOutput;

    /// Like [FlatMap::flat_map], but the output tuples consist of the `outputs` fields only.
    fn flat_map_to<I, It>(
        self,
        name: &str,
        inputs: impl Into<Fields>,
        outputs: impl Into<Fields>,
        mapper: impl Fn(I) -> It + Send + Sync + 'static,
    ) -> Result<StreamBuilder, ConstructionError>
    where
        I: FieldInput + 'static,
        It: IntoIterator + 'static,
        It::Item: FieldOutput;
}

fn flat_map_with_mode<I, It>(
    stream: StreamBuilder,
    name: &str,
    inputs: Fields,
    outputs: Fields,
    mode: Mode,
    mapper: impl Fn(I) -> It + Send + Sync + 'static,
) -> Result<StreamBuilder, ConstructionError>
where
    I: FieldInput + 'static,
    It: IntoIterator + 'static,
    It::Item: FieldOutput,
{
    let spec = FieldTransform {
        input_sig: Signature::input::<I>(inputs.len()),
        output_sig: Signature::output::<It::Item>(outputs.len()),
        inputs,
        outputs,
        mode,
    };
    transform(stream, name, spec, apply_flat(mapper))
}

impl FlatMap for StreamBuilder {
    fn flat_map<I, It>(
        self,
        name: &str,
        inputs: impl Into<Fields>,
        outputs: impl Into<Fields>,
        mapper: impl Fn(I) -> It + Send + Sync + 'static,
    ) -> Result<StreamBuilder, ConstructionError>
    where
        I: FieldInput + 'static,
        It: IntoIterator + 'static,
        It::Item: FieldOutput,
    {
        flat_map_with_mode(
            self,
            name,
            inputs.into(),
            outputs.into(),
            Mode::Augment,
            mapper,
        )
    }

    fn flat_map_to<I, It>(
        self,
        name: &str,
        inputs: impl Into<Fields>,
        outputs: impl Into<Fields>,
        mapper: impl Fn(I) -> It + Send + Sync + 'static,
    ) -> Result<StreamBuilder, ConstructionError>
    where
        I: FieldInput + 'static,
        It: IntoIterator + 'static,
        It::Item: FieldOutput,
    {
        flat_map_with_mode(
            self,
            name,
            inputs.into(),
            outputs.into(),
            Mode::Replace,
            mapper,
        )
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use proptest::prelude::*;

    use crate::operators::*;
    use crate::slice::{Cell, Slice};
    use crate::sources::TupleSource;
    use crate::stream::Pipeline;
    use crate::testing::{collect, plays};
    use crate::tuple;
    use crate::types::{Schema, Value, ValueType};

    #[test]
    fn test_flat_map_splits_words() {
        let source = TupleSource::infer(vec![
            tuple! {"id" => 1i64, "line" => "a b"},
            tuple! {"id" => 2i64, "line" => ""},
            tuple! {"id" => 3i64, "line" => "c"},
        ]);
        let stream = Pipeline::new()
            .source("lines", source)
            .unwrap()
            .flat_map("split", "line", "word", |line: String| {
                line.split(' ')
                    .filter(|w| !w.is_empty())
                    .map(str::to_owned)
                    .collect_vec()
            })
            .unwrap();
        let out = collect(stream);
        assert_eq!(
            out,
            vec![
                tuple! {"id" => 1i64, "line" => "a b", "word" => "a"},
                tuple! {"id" => 1i64, "line" => "a b", "word" => "b"},
                tuple! {"id" => 3i64, "line" => "c", "word" => "c"},
            ]
        );
    }

    #[test]
    fn test_flat_map_to_emits_cells() {
        let stream = Pipeline::new()
            .source("plays", plays())
            .unwrap()
            .flat_map_to("cells", "plays", ["version", "count"], |s: Slice| {
                s.iter()
                    .map(|c| (c.version, c.value.clone()))
                    .collect_vec()
            })
            .unwrap();
        assert_eq!(
            stream.schema(),
            &Schema::new()
                .with("version", ValueType::Int)
                .with("count", ValueType::Any)
        );
        let out = collect(stream);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], tuple! {"version" => 3i64, "count" => 3i64});
    }

    #[test]
    fn failing_item_drops_whole_tuple() {
        let stream = Pipeline::new()
            .source("plays", plays())
            .unwrap()
            .flat_map("checked", "plays", "v", |s: Slice| {
                s.values()
                    .map(|v| match v {
                        Value::Int(i) if *i < 7 => Ok(*i),
                        _ => Err("too large"),
                    })
                    .collect_vec()
            })
            .unwrap()
            .skip_on_error();
        let out = collect(stream);
        // first tuple holds 7 and is skipped entirely
        let plays = Slice::new([Cell::new(1, 5i64)]);
        assert_eq!(out, vec![tuple! {"id" => 2i64, "plays" => plays, "v" => 5i64}]);
    }

    proptest! {
        #[test]
        fn empty_results_drop_tuples(keep in prop::collection::vec(any::<bool>(), 0..30)) {
            let input = keep.iter().map(|k| tuple! {"keep" => *k}).collect_vec();
            let schema = Schema::new().with("keep", ValueType::Bool);
            let stream = Pipeline::new()
                .source("flags", TupleSource::new(schema, input))
                .unwrap()
                .flat_map("maybe", "keep", "copy", |k: bool| if k { vec![1i64] } else { vec![] })
                .unwrap();
            prop_assert_eq!(collect(stream).len(), keep.iter().filter(|k| **k).count());
        }
    }
}
