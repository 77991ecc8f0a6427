//! Helpers shared by the unit tests of this crate
use crate::operators::Sink;
use crate::runtime::ExecutionError;
use crate::sinks::VecSink;
use crate::slice::{Cell, Slice};
use crate::sources::TupleSource;
use crate::stream::StreamBuilder;
use crate::tuple;
use crate::types::{Schema, Tuple, ValueType};

/// Layout of [plays]
pub(crate) fn plays_schema() -> Schema {
    Schema::new()
        .with("id", ValueType::Int)
        .with("plays", ValueType::Slice)
}

/// Two users with the versioned play counts of a song
pub(crate) fn plays() -> TupleSource {
    TupleSource::new(
        plays_schema(),
        vec![
            tuple! {
                "id" => 1i64,
                "plays" => Slice::new([Cell::new(3, 3i64), Cell::new(2, 7i64), Cell::new(1, 2i64)])
            },
            tuple! {"id" => 2i64, "plays" => Slice::new([Cell::new(1, 5i64)])},
        ],
    )
}

/// The integers `0..n` in the field `n`
pub(crate) fn numbers(n: i64) -> TupleSource {
    TupleSource::new(
        Schema::new().with("n", ValueType::Int),
        (0..n).map(|i| tuple! {"n" => i}).collect(),
    )
}

/// Run the pipeline of `stream` and return everything the stream produced
pub(crate) fn try_collect(stream: StreamBuilder) -> Result<Vec<Tuple>, ExecutionError> {
    let sink = VecSink::new();
    let name = format!("collect-{}", stream.name());
    stream.write(&name, sink.clone())?;
    Ok(sink.drain_vec(..))
}

/// Like [try_collect], panicking if the run fails
pub(crate) fn collect(stream: StreamBuilder) -> Vec<Tuple> {
    match try_collect(stream) {
        Ok(tuples) => tuples,
        Err(e) => panic!("pipeline failed: {e:?}"),
    }
}
