use crate::errorhandling::ConstructionError;
use crate::runtime::{ExecutionError, ExecutionReport};
use crate::sinks::TupleSink;
use crate::stream::StreamBuilder;

/// Output tuples from a stream somewhere
pub trait Sink: super::sealed::Sealed {
    /// Register `sink` as an output of this stream. The sink receives tuples once the
    /// pipeline runs. To write a stream to multiple outputs, clone the stream.
    fn sink(self, name: &str, sink: impl TupleSink) -> Result<(), ConstructionError>;

    /// Register `sink` as an output of this stream and run the whole pipeline.
    ///
    /// # Example
    ///
    /// ```
    /// use tuplestream::operators::*;
    /// use tuplestream::sinks::VecSink;
    /// use tuplestream::sources::TupleSource;
    /// use tuplestream::stream::Pipeline;
    /// use tuplestream::tuple;
    ///
    /// let sink = VecSink::new();
    /// let report = Pipeline::new()
    ///     .source("numbers", TupleSource::infer((0..10i64).map(|n| tuple! {"n" => n}).collect()))
    ///     .unwrap()
    ///     .write("sink", sink.clone())
    ///     .unwrap();
    ///
    /// assert_eq!(report.rows_read, 10);
    /// assert_eq!(sink.len(), 10);
    /// ```
    fn write(self, name: &str, sink: impl TupleSink) -> Result<ExecutionReport, ExecutionError>;
}

impl Sink for StreamBuilder {
    fn sink(self, name: &str, sink: impl TupleSink) -> Result<(), ConstructionError> {
        self.pipeline()
            .add_sink(name, self.tail().clone(), Box::new(sink))
    }

    fn write(self, name: &str, sink: impl TupleSink) -> Result<ExecutionReport, ExecutionError> {
        let pipeline = self.pipeline().clone();
        self.sink(name, sink)?;
        pipeline.run()
    }
}
