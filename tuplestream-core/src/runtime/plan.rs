//! Compilation of the pipeline graph into executable segments.
//!
//! A segment is a chain of per-tuple operators fed by a single root: a source, the buffered
//! output of another node, or a union of other segments. Nodes are buffered if they are
//! barriers (joins and reductions) or if more than one operator or sink consumes them, so
//! that every node is computed at most once per run.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::errorhandling::FailurePolicy;
use crate::operators::group::GroupLayout;
use crate::operators::join::JoinLayout;
use crate::operators::StatelessLogic;
use crate::sources::StreamSource;
use crate::stream::node::{NodeKind, PipelineNode};
use crate::stream::SinkRegistration;
use crate::types::NodeId;

pub(crate) enum Root {
    Source {
        node: Arc<PipelineNode>,
        source: Arc<dyn StreamSource>,
    },
    Buffered(NodeId),
    Union(Vec<Segment>),
}

pub(crate) struct SegmentOp {
    pub(crate) node: Arc<PipelineNode>,
    pub(crate) logic: Arc<dyn StatelessLogic>,
    pub(crate) policy: FailurePolicy,
}

pub(crate) struct Segment {
    pub(crate) root: Root,
    pub(crate) ops: Vec<SegmentOp>,
}

impl Segment {
    fn rooted(root: Root) -> Self {
        Self {
            root,
            ops: Vec::new(),
        }
    }
}

/// A node whose complete output is collected before anything downstream runs
pub(crate) enum Barrier {
    Join {
        node: Arc<PipelineNode>,
        layout: Arc<JoinLayout>,
        build: Segment,
        probe: Segment,
    },
    Group {
        node: Arc<PipelineNode>,
        layout: Arc<GroupLayout>,
        input: Segment,
    },
    /// Output consumed more than once
    Shared {
        node: Arc<PipelineNode>,
        input: Segment,
    },
}

pub(crate) struct Plan {
    /// in dependency order
    pub(crate) barriers: Vec<Barrier>,
    /// one segment per registered sink, in registration order
    pub(crate) outputs: Vec<Segment>,
}

struct Compiler<'a> {
    buffered: BTreeSet<NodeId>,
    policies: &'a HashMap<NodeId, FailurePolicy>,
}

impl Compiler<'_> {
    fn segment_for(&self, node: &Arc<PipelineNode>) -> Segment {
        if self.buffered.contains(&node.id) {
            Segment::rooted(Root::Buffered(node.id))
        } else {
            self.segment_body(node)
        }
    }

    /// Segment computing `node` without reading its own buffer
    fn segment_body(&self, node: &Arc<PipelineNode>) -> Segment {
        match &node.kind {
            NodeKind::Source(source) => Segment::rooted(Root::Source {
                node: Arc::clone(node),
                source: Arc::clone(source),
            }),
            NodeKind::Stateless(logic) => {
                let mut segment = match node.upstream.first() {
                    Some(upstream) => self.segment_for(upstream),
                    None => Segment::rooted(Root::Union(Vec::new())),
                };
                segment.ops.push(SegmentOp {
                    node: Arc::clone(node),
                    logic: Arc::clone(logic),
                    policy: self.policies.get(&node.id).copied().unwrap_or_default(),
                });
                segment
            }
            NodeKind::Union => Segment::rooted(Root::Union(
                node.upstream.iter().map(|u| self.segment_for(u)).collect(),
            )),
            NodeKind::Join(_) | NodeKind::Group(_) => Segment::rooted(Root::Buffered(node.id)),
        }
    }

    fn input(&self, node: &PipelineNode, index: usize) -> Segment {
        match node.upstream.get(index) {
            Some(upstream) => self.segment_for(upstream),
            None => Segment::rooted(Root::Union(Vec::new())),
        }
    }

    fn barrier(&self, node: &Arc<PipelineNode>) -> Barrier {
        match &node.kind {
            NodeKind::Join(layout) => {
                let build = layout.build_input();
                Barrier::Join {
                    node: Arc::clone(node),
                    layout: Arc::clone(layout),
                    build: self.input(node, build),
                    probe: self.input(node, 1 - build),
                }
            }
            NodeKind::Group(layout) => Barrier::Group {
                node: Arc::clone(node),
                layout: Arc::clone(layout),
                input: self.input(node, 0),
            },
            _ => Barrier::Shared {
                node: Arc::clone(node),
                input: self.segment_body(node),
            },
        }
    }
}

fn visit(
    node: &Arc<PipelineNode>,
    nodes: &mut BTreeMap<NodeId, Arc<PipelineNode>>,
    consumers: &mut HashMap<NodeId, usize>,
) {
    if nodes.contains_key(&node.id) {
        return;
    }
    nodes.insert(node.id, Arc::clone(node));
    for upstream in &node.upstream {
        *consumers.entry(upstream.id).or_default() += 1;
        visit(upstream, nodes, consumers);
    }
}

impl Plan {
    /// Compile the graph reachable from the given sinks. Nodes no sink depends on are not
    /// executed.
    pub(crate) fn compile(
        sinks: &[SinkRegistration],
        policies: &HashMap<NodeId, FailurePolicy>,
    ) -> Self {
        let mut nodes = BTreeMap::new();
        let mut consumers: HashMap<NodeId, usize> = HashMap::new();
        for sink in sinks {
            *consumers.entry(sink.node.id).or_default() += 1;
            visit(&sink.node, &mut nodes, &mut consumers);
        }
        let buffered: BTreeSet<NodeId> = nodes
            .values()
            .filter(|n| n.kind.is_barrier() || consumers.get(&n.id).copied().unwrap_or(0) > 1)
            .map(|n| n.id)
            .collect();

        let compiler = Compiler {
            buffered,
            policies,
        };
        // upstream nodes always have smaller ids than their consumers
        let barriers: Vec<Barrier> = compiler
            .buffered
            .iter()
            .filter_map(|id| nodes.get(id))
            .map(|node| compiler.barrier(node))
            .collect();
        let outputs = sinks.iter().map(|s| compiler.segment_for(&s.node)).collect();
        debug!(
            nodes = nodes.len(),
            barriers = barriers.len(),
            sinks = sinks.len(),
            "compiled plan"
        );
        Plan { barriers, outputs }
    }
}
