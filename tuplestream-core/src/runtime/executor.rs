use std::collections::HashMap;
use std::sync::Arc;

use envconfig::Envconfig;
use tracing::{debug, error, info, info_span, warn};

use super::config::RuntimeConfig;
use super::plan::{Barrier, Plan, Root, Segment, SegmentOp};
use super::{ExecutionError, ExecutionReport};
use crate::errorhandling::{FailurePolicy, OperatorError};
use crate::operators::group::GroupState;
use crate::operators::join::JoinState;
use crate::stream::node::PipelineNode;
use crate::stream::{Output, Pipeline, PipelineState, SinkRegistration};
use crate::types::{NodeId, Tuple};

/// Runs pipelines sequentially on the calling thread.
///
/// Sources are scanned partition by partition, every tuple is pushed through its segment of
/// per-tuple operators depth first. Input order is preserved by every operator.
#[derive(Debug, Clone, Default)]
pub struct LocalRuntime {
    config: RuntimeConfig,
}

type Emit<'e> = dyn FnMut(Tuple) -> Result<(), ExecutionError> + 'e;

impl LocalRuntime {
    /// Create a runtime with the given settings
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// Create a runtime configured by `TUPLESTREAM_*` environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Ok(Self::new(RuntimeConfig::init_from_env()?))
    }

    /// Execute all sinks registered on the pipeline
    pub fn execute(&self, pipeline: &Pipeline) -> Result<ExecutionReport, ExecutionError> {
        let (mut sinks, policies) = pipeline.begin_run()?;
        let span = info_span!("pipeline", sinks = sinks.len());
        let _guard = span.enter();

        let plan = Plan::compile(&sinks, &policies);
        pipeline.set_state(PipelineState::Executing);
        let mut execution = Execution {
            config: &self.config,
            buffers: HashMap::new(),
            report: ExecutionReport::default(),
            skipped_total: 0,
        };
        let result = execution.run(&plan, &mut sinks);
        match result {
            Ok(()) => {
                pipeline.end_run(sinks, PipelineState::Completed);
                let report = execution.report;
                info!(
                    rows_read = report.rows_read,
                    tuples_written = report.tuples_written.values().sum::<u64>(),
                    skipped = report.total_skipped(),
                    "pipeline completed"
                );
                Ok(report)
            }
            Err(e) => {
                pipeline.end_run(sinks, PipelineState::Failed);
                error!(error = %e, "pipeline failed");
                Err(e)
            }
        }
    }
}

struct Execution<'a> {
    config: &'a RuntimeConfig,
    buffers: HashMap<NodeId, Arc<Vec<Tuple>>>,
    report: ExecutionReport,
    skipped_total: u64,
}

fn barrier_error(node: &PipelineNode) -> impl Fn(OperatorError) -> ExecutionError + Copy + '_ {
    move |source| ExecutionError::Barrier {
        operator: node.name.clone(),
        source,
    }
}

impl Execution<'_> {
    fn run(&mut self, plan: &Plan, sinks: &mut [SinkRegistration]) -> Result<(), ExecutionError> {
        for registration in sinks.iter_mut() {
            registration
                .sink
                .start()
                .map_err(|source| ExecutionError::Sink {
                    operator: registration.name.clone(),
                    source,
                })?;
        }
        for barrier in &plan.barriers {
            self.materialize(barrier)?;
        }
        for (registration, segment) in sinks.iter_mut().zip(&plan.outputs) {
            let name = registration.name.clone();
            let sink = &mut registration.sink;
            let sink_error = |source| ExecutionError::Sink {
                operator: name.clone(),
                source,
            };
            let mut written = 0u64;
            self.run_segment(segment, &[], &mut |tuple| {
                written += 1;
                sink.write(tuple).map_err(sink_error)
            })?;
            sink.finish().map_err(sink_error)?;
            debug!(sink = %name, written, "sink finished");
            self.report.tuples_written.insert(name, written);
        }
        Ok(())
    }

    fn materialize(&mut self, barrier: &Barrier) -> Result<(), ExecutionError> {
        let mut out = Vec::new();
        let node = match barrier {
            Barrier::Join {
                node,
                layout,
                build,
                probe,
            } => {
                let err = barrier_error(node);
                let mut state = JoinState::new(layout);
                self.run_segment(build, &[], &mut |t| state.build(t).map_err(err))?;
                self.run_segment(probe, &[], &mut |t| state.probe(&t, &mut out).map_err(err))?;
                state.finish(&mut out);
                node
            }
            Barrier::Group {
                node,
                layout,
                input,
            } => {
                let err = barrier_error(node);
                let mut state = GroupState::new(layout);
                self.run_segment(input, &[], &mut |t| state.add(t).map_err(err))?;
                state.finish(&mut out).map_err(err)?;
                node
            }
            Barrier::Shared { node, input } => {
                self.run_segment(input, &[], &mut |t| {
                    out.push(t);
                    Ok(())
                })?;
                node
            }
        };
        debug!(operator = %node.name, tuples = out.len(), "materialized barrier");
        self.buffers.insert(node.id, Arc::new(out));
        Ok(())
    }

    /// Run a segment, passing its output through the operators of the enclosing segments
    fn run_segment(
        &mut self,
        segment: &Segment,
        outer: &[&[SegmentOp]],
        emit: &mut Emit<'_>,
    ) -> Result<(), ExecutionError> {
        let mut chain = Vec::with_capacity(outer.len() + 1);
        chain.push(segment.ops.as_slice());
        chain.extend_from_slice(outer);

        match &segment.root {
            Root::Source { node, source } => {
                debug!(source = %node.name, "scanning source");
                let source_error = |source| ExecutionError::Source {
                    operator: node.name.clone(),
                    source,
                };
                for tuple in source.scan().map_err(source_error)? {
                    let tuple = tuple.map_err(source_error)?;
                    self.count_row();
                    self.push(&chain, 0, 0, tuple, emit)?;
                }
            }
            Root::Buffered(id) => {
                let tuples = self.buffers.get(id).cloned().unwrap_or_default();
                for tuple in tuples.iter() {
                    self.push(&chain, 0, 0, tuple.clone(), emit)?;
                }
            }
            Root::Union(children) => {
                for child in children {
                    self.run_segment(child, &chain, emit)?;
                }
            }
        }
        Ok(())
    }

    /// Apply the operator at `chain[stage][index]` and everything after it
    fn push(
        &mut self,
        chain: &[&[SegmentOp]],
        mut stage: usize,
        mut index: usize,
        tuple: Tuple,
        emit: &mut Emit<'_>,
    ) -> Result<(), ExecutionError> {
        while chain.get(stage).is_some_and(|ops| index >= ops.len()) {
            stage += 1;
            index = 0;
        }
        let Some(op) = chain.get(stage).and_then(|ops| ops.get(index)) else {
            return emit(tuple);
        };

        let mut output = Output::default();
        if let Err(source) = op.logic.on_data(&tuple, &mut output) {
            return match op.policy {
                FailurePolicy::FailFast => Err(ExecutionError::Operator {
                    operator: op.node.name.clone(),
                    tuple,
                    source,
                }),
                FailurePolicy::SkipAndCount => {
                    warn!(operator = %op.node.name, %tuple, error = %source, "skipping tuple");
                    self.count_skip(&op.node.name)
                }
            };
        }
        for produced in output.drain() {
            self.push(chain, stage, index + 1, produced, emit)?;
        }
        Ok(())
    }

    fn count_row(&mut self) {
        self.report.rows_read += 1;
        let interval = self.config.progress_interval;
        if interval > 0 && self.report.rows_read % interval == 0 {
            info!(rows_read = self.report.rows_read, "progress");
        }
    }

    fn count_skip(&mut self, operator: &str) -> Result<(), ExecutionError> {
        *self
            .report
            .skipped
            .entry(operator.to_owned())
            .or_default() += 1;
        self.skipped_total += 1;
        match self.config.max_skipped {
            Some(limit) if self.skipped_total > limit => {
                Err(ExecutionError::SkipBudgetExceeded { limit })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::*;
    use crate::sinks::VecSink;
    use crate::testing::numbers;

    fn failing_pipeline() -> (Pipeline, VecSink) {
        let pipeline = Pipeline::new();
        let sink = VecSink::new();
        pipeline
            .source("numbers", numbers(10))
            .unwrap()
            .filter("odd-fails", "n", |n: i64| -> Result<bool, OperatorError> {
                if n % 2 == 1 {
                    Err("odd".into())
                } else {
                    Ok(true)
                }
            })
            .unwrap()
            .skip_on_error()
            .sink("out", sink.clone())
            .unwrap();
        (pipeline, sink)
    }

    #[test]
    fn skipped_tuples_are_counted() {
        let (pipeline, sink) = failing_pipeline();
        let report = pipeline.run().unwrap();
        assert_eq!(sink.len(), 5);
        assert_eq!(report.skipped.get("odd-fails"), Some(&5));
        assert_eq!(report.total_skipped(), 5);
        assert_eq!(report.tuples_written.get("out"), Some(&5));
    }

    #[test]
    fn skip_budget() {
        let (pipeline, _) = failing_pipeline();
        let runtime = LocalRuntime::new(RuntimeConfig::builder().max_skipped(2).build());
        let err = runtime.execute(&pipeline).unwrap_err();
        assert!(matches!(err, ExecutionError::SkipBudgetExceeded { limit: 2 }));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        // the pipeline can be run again
        LocalRuntime::default().execute(&pipeline).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Completed);
    }

    #[test]
    fn union_of_branches_runs_outer_operators() {
        let pipeline = Pipeline::new();
        let sink = VecSink::new();
        let a = pipeline.source("a", numbers(2)).unwrap();
        let b = pipeline.source("b", numbers(3)).unwrap();
        a.union("u", [b])
            .unwrap()
            .map("double", "n", "d", |n: i64| n * 2)
            .unwrap()
            .sink("out", sink.clone())
            .unwrap();
        let report = pipeline.run().unwrap();
        assert_eq!(report.rows_read, 5);
        let doubled: Vec<i64> = sink
            .drain_vec(..)
            .iter()
            .map(|t| t.get_as::<i64>("d").unwrap().unwrap())
            .collect();
        assert_eq!(doubled, vec![0, 2, 0, 2, 4]);
    }
}
