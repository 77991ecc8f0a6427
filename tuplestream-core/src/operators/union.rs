use std::iter;

use crate::errorhandling::ConstructionError;
use crate::stream::{node::NodeKind, StreamBuilder};

/// Merge streams
pub trait Union: super::sealed::Sealed {
    /// Combine multiple streams into a single stream of all their tuples.
    ///
    /// All streams must belong to the same pipeline and have the same field names in the same
    /// order. Field types which differ between the streams become dynamically typed.
    /// Tuples of this stream come first, followed by those of `others` in order.
    fn union(
        self,
        name: &str,
        others: impl IntoIterator<Item = StreamBuilder>,
    ) -> Result<StreamBuilder, ConstructionError>;
}

impl Union for StreamBuilder {
    fn union(
        self,
        name: &str,
        others: impl IntoIterator<Item = StreamBuilder>,
    ) -> Result<StreamBuilder, ConstructionError> {
        let others: Vec<StreamBuilder> = others.into_iter().collect();
        let mut schema = self.schema().clone();
        for other in &others {
            if !other.pipeline().same_as(self.pipeline()) {
                return Err(ConstructionError::ForeignPipeline {
                    operator: name.to_owned(),
                });
            }
            if !schema.same_layout(other.schema()) {
                return Err(ConstructionError::LayoutMismatch {
                    operator: name.to_owned(),
                    expected: self.schema().clone(),
                    found: other.schema().clone(),
                });
            }
            schema = schema
                .iter()
                .zip(other.schema().iter())
                .map(|((f, a), (_, b))| (f, a.unify(b)))
                .collect();
        }
        let upstream = iter::once(&self)
            .chain(others.iter())
            .map(|s| s.tail().clone())
            .collect();
        let node = self
            .pipeline()
            .add_node(name, upstream, NodeKind::Union, schema)?;
        Ok(StreamBuilder::new(node, self.pipeline().clone()))
    }
}
