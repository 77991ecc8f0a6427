//! End to end scenarios over the public API
use tuplestream::lookup::Lookup;
use tuplestream::operators::*;
use tuplestream::sinks::{ColumnSink, InMemoryTable, VecSink, VersionPolicy};
use tuplestream::slice::{Cell, Slice};
use tuplestream::sources::{StorageSource, TupleSource};
use tuplestream::stream::Pipeline;
use tuplestream::tuple;
use tuplestream::types::{Tuple, Value};

#[test]
fn slice_sum() {
    let plays = Slice::new([Cell::new(3, 3i64), Cell::new(2, 7i64), Cell::new(1, 2i64)]);
    let sink = VecSink::new();
    Pipeline::new()
        .source("plays", TupleSource::infer(vec![tuple! {"id" => 1i64, "plays" => plays}]))
        .unwrap()
        .map_to("total", "plays", "total", |s: Slice| s.sum())
        .unwrap()
        .write("sink", sink.clone())
        .unwrap();
    assert_eq!(sink.drain_vec(..), vec![tuple! {"total" => 12i64}]);
}

#[test]
fn word_split() {
    let sink = VecSink::new();
    Pipeline::new()
        .source(
            "lines",
            TupleSource::infer(vec![
                tuple! {"line" => "the quick fox"},
                tuple! {"line" => ""},
                tuple! {"line" => "jumps"},
            ]),
        )
        .unwrap()
        .flat_map_to("words", "line", "word", |line: String| {
            line.split_whitespace()
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .unwrap()
        .write("sink", sink.clone())
        .unwrap();
    let words: Vec<Value> = sink
        .into_iter()
        .filter_map(|t| t.get("word").cloned())
        .collect();
    assert_eq!(
        words,
        ["the", "quick", "fox", "jumps"].map(Value::from).to_vec()
    );
}

#[test]
fn inner_join_produces_two_tuples() {
    let pipeline = Pipeline::new();
    let plays = pipeline
        .source(
            "plays",
            TupleSource::infer(vec![
                tuple! {"user" => "a", "song" => "x"},
                tuple! {"user" => "b", "song" => "y"},
                tuple! {"user" => "c", "song" => "z"},
            ]),
        )
        .unwrap();
    let users = pipeline
        .source(
            "users",
            TupleSource::infer(vec![
                tuple! {"uid" => "a", "country" => "de"},
                tuple! {"uid" => "b", "country" => "fr"},
            ]),
        )
        .unwrap();
    let sink = VecSink::new();
    plays
        .join(
            "plays-users",
            users,
            JoinSpec::builder().left_on("user").right_on("uid").build(),
        )
        .unwrap()
        .write("sink", sink.clone())
        .unwrap();
    let out = sink.drain_vec(..);
    assert_eq!(out.len(), 2);
    assert_eq!(
        out[0],
        tuple! {"user" => "a", "song" => "x", "uid" => "a", "country" => "de"}
    );
}

#[test]
fn read_transform_write() {
    let table = InMemoryTable::new();
    table.put("ada", "plays", Cell::new(1, 2i64));
    table.put("ada", "plays", Cell::new(2, 7i64));
    table.put("bob", "plays", Cell::new(1, 5i64));
    table.put("ada", "country", Cell::new(1, "de"));

    let countries: Lookup<Value, String> =
        Lookup::new(table.lookup("country")).with_default("unknown".to_owned());

    let pipeline = Pipeline::new();
    let stream = pipeline
        .source(
            "plays",
            StorageSource::new(table.reader(["plays"]).partitions(2)).key_field("user"),
        )
        .unwrap()
        .map("total", "plays", "total", |s: Slice| s.sum())
        .unwrap()
        .map("country", "user", "country", move |user: Value| countries.try_get(user))
        .unwrap()
        .insert("day", "day", 10i64)
        .unwrap();
    let report = stream
        .write(
            "store",
            ColumnSink::new(table.clone(), "user")
                .map("total", "plays_total")
                .map("country", "country_seen")
                .version(VersionPolicy::Field("day".to_owned())),
        )
        .unwrap();

    assert_eq!(report.rows_read, 2);
    assert_eq!(
        table.cells(&"ada".into(), "plays_total"),
        vec![Cell::new(10, 9i64)]
    );
    assert_eq!(
        table.cells(&"bob".into(), "country_seen"),
        vec![Cell::new(10, "unknown")]
    );

    // the written cells are visible to the next pipeline
    let sink = VecSink::new();
    Pipeline::new()
        .source("totals", StorageSource::new(table.reader(["plays_total"])))
        .unwrap()
        .map_to("newest", "plays_total", "newest", |s: Slice| {
            s.first().cloned()
        })
        .unwrap()
        .write("sink", sink.clone())
        .unwrap();
    let newest: Vec<Tuple> = sink.drain_vec(..);
    assert_eq!(
        newest,
        vec![tuple! {"newest" => 9i64}, tuple! {"newest" => 5i64}]
    );
}
