//! Runtimes determine how pipelines are executed.
//!
//! Running a pipeline compiles its graph into a [plan] of segments and barriers, which the
//! [LocalRuntime] then executes on the calling thread.
mod config;
mod executor;
pub(crate) mod plan;

use indexmap::IndexMap;
use thiserror::Error;

use crate::errorhandling::{ConstructionError, OperatorError};
use crate::sinks::SinkError;
use crate::sources::SourceError;
use crate::types::Tuple;

pub use config::RuntimeConfig;
pub use executor::LocalRuntime;

/// Errors aborting a pipeline run
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The pipeline could not be assembled
    #[error("invalid pipeline")]
    Construction(#[from] ConstructionError),
    /// A per-tuple operator failed and was not set to skip failures
    #[error("operator '{operator}' failed on tuple {tuple}")]
    Operator {
        /// name of the failing operator
        operator: String,
        /// the tuple it failed on
        tuple: Tuple,
        /// what went wrong
        source: OperatorError,
    },
    /// A join or reduction failed
    #[error("barrier '{operator}' failed")]
    Barrier {
        /// name of the join or reduction
        operator: String,
        /// what went wrong
        source: OperatorError,
    },
    /// Reading a source failed
    #[error("source '{operator}' failed")]
    Source {
        /// name of the source
        operator: String,
        /// what went wrong
        source: SourceError,
    },
    /// Writing to a sink failed
    #[error("sink '{operator}' failed")]
    Sink {
        /// name of the sink
        operator: String,
        /// what went wrong
        source: SinkError,
    },
    /// [RuntimeConfig::max_skipped] was exceeded
    #[error("more than {limit} tuples were skipped")]
    SkipBudgetExceeded {
        /// the configured limit
        limit: u64,
    },
    /// Another run of the same pipeline is in progress
    #[error("pipeline is already running")]
    Busy,
}

/// Statistics of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Tuples read from all sources
    pub rows_read: u64,
    /// Tuples written per sink
    pub tuples_written: IndexMap<String, u64>,
    /// Tuples skipped per operator
    pub skipped: IndexMap<String, u64>,
}

impl ExecutionReport {
    /// Tuples skipped by all operators
    pub fn total_skipped(&self) -> u64 {
        self.skipped.values().sum()
    }
}
