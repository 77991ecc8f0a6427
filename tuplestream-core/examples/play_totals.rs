//! Sum versioned play counts per user and write the totals back to storage
use tuplestream::operators::*;
use tuplestream::runtime::LocalRuntime;
use tuplestream::sinks::{ColumnSink, InMemoryTable, StdOutSink};
use tuplestream::slice::{Cell, Slice};
use tuplestream::sources::StorageSource;
use tuplestream::stream::Pipeline;

fn main() {
    tracing_subscriber::fmt::init();

    let table = InMemoryTable::new();
    for (user, version, plays) in [("ada", 1, 3i64), ("ada", 2, 7), ("ada", 3, 2), ("bob", 1, 5)] {
        table.put(user, "plays", Cell::new(version, plays));
    }

    let pipeline = Pipeline::new();
    let totals = pipeline
        .source("plays", StorageSource::new(table.reader(["plays"])).key_field("user"))
        .unwrap()
        .map("total", "plays", "total", |s: Slice| s.sum())
        .unwrap()
        .map("latest", "plays", "latest", |s: Slice| s.first().cloned())
        .unwrap()
        .skip_on_error();

    totals
        .clone()
        .project("select", ["user", "total", "latest"])
        .unwrap()
        .sink("print", StdOutSink)
        .unwrap();
    totals
        .sink(
            "store",
            ColumnSink::new(table.clone(), "user").map("total", "plays_total"),
        )
        .unwrap();

    let runtime = LocalRuntime::from_env().unwrap();
    let report = runtime.execute(&pipeline).unwrap();
    println!("{report:?}");
}
