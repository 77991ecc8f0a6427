use std::sync::Arc;

use crate::{
    errorhandling::{ConstructionError, OperatorError},
    stream::{node::NodeKind, Output, StreamBuilder},
    types::{Schema, Tuple},
};

/// A custom stateless operator for tuplestream pipelines.
///
/// `on_data` is called once per input tuple and may emit any number of output tuples. When
/// it returns an error, everything it emitted for this tuple is discarded.
pub trait StatelessLogic: Send + Sync + 'static {
    /// Process one tuple
    fn on_data(&self, tuple: &Tuple, output: &mut Output) -> Result<(), OperatorError>;
}

impl<X> StatelessLogic for X
where
    X: Fn(&Tuple, &mut Output) -> Result<(), OperatorError> + Send + Sync + 'static,
{
    fn on_data(&self, tuple: &Tuple, output: &mut Output) -> Result<(), OperatorError> {
        self(tuple, output)
    }
}

/// Add a custom stateless operator to the stream. See [StatelessLogic] for how to implement a
/// custom stateless operator
pub trait StatelessOp: super::sealed::Sealed {
    /// Append an operator applying `logic` to every tuple. `schema` declares the layout of
    /// the tuples the logic emits; downstream operators are checked against it.
    fn stateless_op(
        self,
        name: &str,
        schema: Schema,
        logic: impl StatelessLogic,
    ) -> Result<StreamBuilder, ConstructionError>;
}

impl StatelessOp for StreamBuilder {
    fn stateless_op(
        self,
        name: &str,
        schema: Schema,
        logic: impl StatelessLogic,
    ) -> Result<StreamBuilder, ConstructionError> {
        self.then(name, NodeKind::Stateless(Arc::new(logic)), schema)
    }
}
