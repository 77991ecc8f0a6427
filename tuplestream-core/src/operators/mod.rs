//! Operators for building tuple streams
// public API operators
mod filter;
mod flat_map;
mod insert;
mod inspect;
mod map;
mod project;
mod rename;
mod sink;
mod union;

// Public Api operators reexported for convenience
pub use filter::Filter;
pub use flat_map::FlatMap;
pub use group::{Group, GroupBy, GroupedStream, Reduction};
pub use insert::Insert;
pub use inspect::Inspect;
pub use join::{Join, JoinMode, JoinSpec, JoinStrategy};
pub use map::Map;
pub use project::Project;
pub use rename::Rename;
pub use sink::Sink;
pub use stateless_op::{StatelessLogic, StatelessOp};
pub use union::Union;

// the runtime needs access to the state of barriers
pub(crate) mod group;
pub(crate) mod join;
pub(crate) mod stateless_op;
pub(crate) mod transform;

// marker used to seal the traits implementing operators
// on StreamBuilder
mod sealed {
    use crate::stream::StreamBuilder;

    pub trait Sealed {}

    impl Sealed for StreamBuilder {}
}
