//! Builder for datastreams

use std::fmt::Debug;
use std::sync::Arc;

use super::node::{NodeKind, PipelineNode};
use super::Pipeline;
use crate::errorhandling::{ConstructionError, FailurePolicy};
use crate::types::Schema;

/// The StreamBuilder allows building datastreams by calling operator methods like `.map` or
/// `.filter` on it. Every operator returns a new StreamBuilder for the extended stream,
/// the stream itself is only executed once the pipeline runs.
///
/// Cloning a StreamBuilder branches the stream: every clone can be extended independently
/// and the tuples of the shared part are computed once per run.
#[derive(Clone)]
pub struct StreamBuilder {
    tail: Arc<PipelineNode>,
    // the pipeline this stream is registered to
    pipeline: Pipeline,
}

impl StreamBuilder {
    pub(crate) fn new(tail: Arc<PipelineNode>, pipeline: Pipeline) -> Self {
        Self { tail, pipeline }
    }

    /// Field layout of the tuples in this stream
    pub fn schema(&self) -> &Schema {
        &self.tail.schema
    }

    /// Name of the last operator of this stream
    pub fn name(&self) -> &str {
        &self.tail.name
    }

    /// The pipeline this stream belongs to
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub(crate) fn tail(&self) -> &Arc<PipelineNode> {
        &self.tail
    }

    /// add an operator to the end of this stream
    /// and return a new stream where the new operator is last
    pub(crate) fn then(
        self,
        name: &str,
        kind: NodeKind,
        schema: Schema,
    ) -> Result<StreamBuilder, ConstructionError> {
        let node = self
            .pipeline
            .add_node(name, vec![self.tail], kind, schema)?;
        Ok(StreamBuilder {
            tail: node,
            pipeline: self.pipeline,
        })
    }

    /// Let the last operator of this stream skip tuples it fails on instead of aborting the
    /// run. Skipped tuples are logged and counted in the
    /// [ExecutionReport](crate::runtime::ExecutionReport).
    ///
    /// Only per-tuple operators can skip, failures of sources, joins and reductions always
    /// abort the run.
    pub fn skip_on_error(self) -> Self {
        if matches!(self.tail.kind, NodeKind::Stateless(_)) {
            self.pipeline
                .set_policy(self.tail.id, FailurePolicy::SkipAndCount);
        } else {
            tracing::warn!(
                operator = %self.tail.name,
                "skip_on_error has no effect on this operator"
            );
        }
        self
    }
}

impl Debug for StreamBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBuilder")
            .field("tail", &self.tail)
            .finish_non_exhaustive()
    }
}
