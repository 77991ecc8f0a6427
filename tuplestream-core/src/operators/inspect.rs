use super::stateless_op::StatelessOp;
use crate::errorhandling::{ConstructionError, OperatorError};
use crate::stream::{Output, StreamBuilder};
use crate::types::Tuple;

/// Observe tuples without changing them
pub trait Inspect: super::sealed::Sealed {
    /// Observe the tuples in a stream without modifying them.
    /// This is often useful for debugging or metrics.
    ///
    /// # Example
    /// ```rust
    /// use tuplestream::operators::*;
    /// use tuplestream::sinks::VecSink;
    /// use tuplestream::sources::TupleSource;
    /// use tuplestream::stream::Pipeline;
    /// use tuplestream::tuple;
    ///
    /// let source = TupleSource::infer(vec![tuple! {"n" => 1i64}, tuple! {"n" => 2i64}]);
    ///
    /// Pipeline::new()
    ///     .source("numbers", source).unwrap()
    ///     .inspect("print", |t| println!("{t}")).unwrap()
    ///     .write("sink", VecSink::new()).unwrap();
    /// ```
    fn inspect(
        self,
        name: &str,
        inspector: impl Fn(&Tuple) + Send + Sync + 'static,
    ) -> Result<StreamBuilder, ConstructionError>;
}

impl Inspect for StreamBuilder {
    fn inspect(
        self,
        name: &str,
        inspector: impl Fn(&Tuple) + Send + Sync + 'static,
    ) -> Result<StreamBuilder, ConstructionError> {
        let schema = self.schema().clone();
        self.stateless_op(
            name,
            schema,
            move |tuple: &Tuple, out: &mut Output| -> Result<(), OperatorError> {
                inspector(tuple);
                out.send(tuple.clone());
                Ok(())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::operators::*;
    use crate::stream::Pipeline;
    use crate::testing::{collect, numbers};

    #[test]
    fn test_inspect() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_moved = Arc::clone(&seen);
        let stream = Pipeline::new()
            .source("numbers", numbers(5))
            .unwrap()
            .inspect("count", move |_| {
                seen_moved.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(collect(stream).len(), 5);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }
}
