use std::fmt::Debug;
use std::sync::Arc;

use crate::operators::group::GroupLayout;
use crate::operators::join::JoinLayout;
use crate::operators::stateless_op::StatelessLogic;
use crate::sources::StreamSource;
use crate::types::{NodeId, Schema};

/// What a node of the pipeline graph does
pub(crate) enum NodeKind {
    /// Produces the tuples of a source
    Source(Arc<dyn StreamSource>),
    /// Applies a per-tuple function
    Stateless(Arc<dyn StatelessLogic>),
    /// Emits all tuples of all upstream nodes, one upstream after the other
    Union,
    /// Joins upstream 0 (left) with upstream 1 (right)
    Join(Arc<JoinLayout>),
    /// Groups and reduces upstream 0
    Group(Arc<GroupLayout>),
}

impl NodeKind {
    /// Nodes which must see all their input before emitting anything
    pub(crate) fn is_barrier(&self) -> bool {
        matches!(self, NodeKind::Join(_) | NodeKind::Group(_))
    }

    fn label(&self) -> &'static str {
        match self {
            NodeKind::Source(_) => "source",
            NodeKind::Stateless(_) => "stateless",
            NodeKind::Union => "union",
            NodeKind::Join(_) => "join",
            NodeKind::Group(_) => "group",
        }
    }
}

/// An immutable node of the pipeline graph.
/// Appending an operator creates a new node pointing at its upstream, no node is ever
/// changed after creation.
pub(crate) struct PipelineNode {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) upstream: Vec<Arc<PipelineNode>>,
    pub(crate) kind: NodeKind,
    pub(crate) schema: Schema,
}

impl Debug for PipelineNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind.label())
            .field(
                "upstream",
                &self.upstream.iter().map(|u| u.id).collect::<Vec<_>>(),
            )
            .field("schema", &self.schema.to_string())
            .finish()
    }
}
