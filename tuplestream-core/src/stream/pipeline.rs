use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexSet;
use tracing::debug;

use super::node::{NodeKind, PipelineNode};
use super::StreamBuilder;
use crate::errorhandling::{ConstructionError, FailurePolicy};
use crate::runtime::{ExecutionError, ExecutionReport, LocalRuntime};
use crate::sinks::TupleSink;
use crate::sources::StreamSource;
use crate::types::{NodeId, Schema};

/// Lifecycle of a pipeline.
///
/// A pipeline is `Building` while operators are appended. Running it compiles the graph
/// (`Materializing`), streams all sources through it (`Executing`) and ends `Completed` or
/// `Failed`. A finished pipeline can be run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Operators and sinks may be added
    Building,
    /// The graph is being compiled into a plan
    Materializing,
    /// Tuples are flowing
    Executing,
    /// The last run finished successfully
    Completed,
    /// The last run was aborted by an error
    Failed,
}

pub(crate) struct SinkRegistration {
    pub(crate) name: String,
    pub(crate) node: Arc<PipelineNode>,
    pub(crate) sink: Box<dyn TupleSink>,
}

pub(crate) struct InnerPipeline {
    next_id: NodeId,
    names: IndexSet<String>,
    policies: HashMap<NodeId, FailurePolicy>,
    sinks: Vec<SinkRegistration>,
    state: PipelineState,
}

/// A lazily executed graph of operators.
///
/// Streams are started with [Pipeline::source], extended by the methods of
/// [operators](crate::operators) and terminated with a sink. Nothing is executed until
/// [Pipeline::run] (or [Sink::write](crate::operators::Sink::write)) is called.
/// The pipeline is a cheap handle, clones refer to the same graph.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Mutex<InnerPipeline>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Create a new, empty pipeline
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(InnerPipeline {
                next_id: 0,
                names: IndexSet::new(),
                policies: HashMap::new(),
                sinks: Vec::new(),
                state: PipelineState::Building,
            })),
        }
    }

    /// Start a new stream reading from the given source
    pub fn source(
        &self,
        name: &str,
        source: impl StreamSource,
    ) -> Result<StreamBuilder, ConstructionError> {
        let schema = source
            .schema()
            .map_err(|source| ConstructionError::Source {
                operator: name.to_owned(),
                source,
            })?;
        let node = self.add_node(name, Vec::new(), NodeKind::Source(Arc::new(source)), schema)?;
        Ok(StreamBuilder::new(node, self.clone()))
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        self.lock().state
    }

    /// Names of all operators in order of creation
    pub fn operator_names(&self) -> Vec<String> {
        self.lock().names.iter().cloned().collect()
    }

    /// Execute all registered sinks with the default [LocalRuntime]
    pub fn run(&self) -> Result<ExecutionReport, ExecutionError> {
        LocalRuntime::default().execute(self)
    }

    fn lock(&self) -> MutexGuard<'_, InnerPipeline> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn same_as(&self, other: &Pipeline) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn register_name(inner: &mut InnerPipeline, name: &str) -> Result<(), ConstructionError> {
        if !inner.names.insert(name.to_owned()) {
            return Err(ConstructionError::NonUniqueName(name.to_owned()));
        }
        Ok(())
    }

    pub(crate) fn add_node(
        &self,
        name: &str,
        upstream: Vec<Arc<PipelineNode>>,
        kind: NodeKind,
        schema: Schema,
    ) -> Result<Arc<PipelineNode>, ConstructionError> {
        let mut inner = self.lock();
        Self::register_name(&mut inner, name)?;
        let id = inner.next_id;
        inner.next_id += 1;
        let node = Arc::new(PipelineNode {
            id,
            name: name.to_owned(),
            upstream,
            kind,
            schema,
        });
        debug!(?node, "added node");
        Ok(node)
    }

    pub(crate) fn add_sink(
        &self,
        name: &str,
        node: Arc<PipelineNode>,
        mut sink: Box<dyn TupleSink>,
    ) -> Result<(), ConstructionError> {
        sink.validate(name, &node.schema)
            .map_err(|source| ConstructionError::Sink {
                operator: name.to_owned(),
                source,
            })?;
        let mut inner = self.lock();
        Self::register_name(&mut inner, name)?;
        inner.sinks.push(SinkRegistration {
            name: name.to_owned(),
            node,
            sink,
        });
        Ok(())
    }

    pub(crate) fn set_policy(&self, node: NodeId, policy: FailurePolicy) {
        self.lock().policies.insert(node, policy);
    }

    /// Take the sinks out of the pipeline for the duration of a run
    pub(crate) fn begin_run(
        &self,
    ) -> Result<(Vec<SinkRegistration>, HashMap<NodeId, FailurePolicy>), ExecutionError> {
        let mut inner = self.lock();
        if matches!(
            inner.state,
            PipelineState::Materializing | PipelineState::Executing
        ) {
            return Err(ExecutionError::Busy);
        }
        inner.state = PipelineState::Materializing;
        Ok((std::mem::take(&mut inner.sinks), inner.policies.clone()))
    }

    pub(crate) fn set_state(&self, state: PipelineState) {
        self.lock().state = state;
    }

    /// Hand the sinks back after a run
    pub(crate) fn end_run(&self, mut sinks: Vec<SinkRegistration>, state: PipelineState) {
        let mut inner = self.lock();
        sinks.append(&mut inner.sinks);
        inner.sinks = sinks;
        inner.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::Sink;
    use crate::sinks::VecSink;
    use crate::testing::numbers;

    #[test]
    fn names_must_be_unique() {
        let pipeline = Pipeline::new();
        pipeline.source("numbers", numbers(3)).unwrap();
        let err = pipeline.source("numbers", numbers(3)).unwrap_err();
        assert!(matches!(err, ConstructionError::NonUniqueName(n) if n == "numbers"));
    }

    #[test]
    fn building_does_not_execute() {
        let pipeline = Pipeline::new();
        let sink = VecSink::new();
        let stream = pipeline.source("numbers", numbers(3)).unwrap();
        stream.sink("out", sink.clone()).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Building);
        assert!(sink.is_empty());
        pipeline.run().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Completed);
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn pipelines_can_be_replayed() {
        let pipeline = Pipeline::new();
        let sink = VecSink::new();
        let stream = pipeline.source("numbers", numbers(2)).unwrap();
        stream.sink("out", sink.clone()).unwrap();
        pipeline.run().unwrap();
        pipeline.run().unwrap();
        assert_eq!(sink.len(), 4);
        assert_eq!(pipeline.operator_names(), vec!["numbers", "out"]);
    }
}
