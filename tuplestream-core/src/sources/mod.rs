//! Sources feeding tuples into a pipeline
mod storage;
mod tuple_source;

use thiserror::Error;

use crate::types::{Schema, Tuple};

pub use storage::{Row, RowPartition, RowSource, StorageSource};
pub use tuple_source::TupleSource;

/// Errors raised while reading from a source
#[derive(Debug, Error)]
pub enum SourceError {
    /// Reading from the underlying storage failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The source produced data not matching its declared layout
    #[error("invalid source data: {0}")]
    Invalid(String),
    /// The external system could not be reached
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Iterator over the tuples of one scan of a source
pub type TupleIter<'a> = Box<dyn Iterator<Item = Result<Tuple, SourceError>> + 'a>;

/// A source of tuples which can be added to a pipeline with
/// [Pipeline::source](crate::stream::Pipeline::source).
///
/// A source is scanned once per pipeline run. For users it is normally not necessary to
/// implement this trait, storage systems should rather implement [RowSource] and be wrapped
/// in a [StorageSource].
pub trait StreamSource: Send + Sync + 'static {
    /// Field layout of every tuple this source produces.
    /// An error rejects the source when it is added to a pipeline.
    fn schema(&self) -> Result<Schema, SourceError>;

    /// Read all tuples of this source
    fn scan(&self) -> Result<TupleIter<'_>, SourceError>;
}
