//! Pipelines and the streams they are built from
mod builder;
pub(crate) mod node;
mod output;
mod pipeline;

pub use builder::StreamBuilder;
pub use output::Output;
pub use pipeline::{Pipeline, PipelineState};
pub(crate) use pipeline::SinkRegistration;
