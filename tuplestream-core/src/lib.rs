//! Tuplestream is a declarative tuple-stream dataflow engine over versioned, multi-valued cells.
//!
//! Pipelines are built lazily from [sources], extended with [operators] and terminated by
//! [sinks]. Every storage cell is read as a [Slice](slice::Slice) of all its versioned values,
//! which operators treat as an ordinary, strongly typed field value.
//!
//! ```rust
//! use tuplestream::operators::*;
//! use tuplestream::sinks::VecSink;
//! use tuplestream::slice::{Cell, Slice};
//! use tuplestream::sources::TupleSource;
//! use tuplestream::stream::Pipeline;
//! use tuplestream::tuple;
//!
//! let source = TupleSource::infer(vec![tuple! {
//!     "user" => "ada",
//!     "plays" => Slice::new([Cell::new(3, 3i64), Cell::new(2, 7i64), Cell::new(1, 2i64)]),
//! }]);
//! let sink = VecSink::new();
//! Pipeline::new()
//!     .source("plays", source).unwrap()
//!     .map_to("total", ["user", "plays"], ["user", "total"], |(user, plays): (String, Slice)| {
//!         plays.sum().map(|total| (user, total))
//!     }).unwrap()
//!     .write("sink", sink.clone()).unwrap();
//!
//! assert_eq!(sink.drain_vec(..), vec![tuple! {"user" => "ada", "total" => 12i64}]);
//! ```
pub mod errorhandling;
pub mod keys;
pub mod lookup;
pub mod operators;
pub mod runtime;
pub mod sinks;
pub mod slice;
pub mod sources;
pub mod stream;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
