//! Iteration execution over a built pipeline.
//!
//! One iteration walks the plan in order, wires each stage's inputs from its
//! producers' cached outputs, and dispatches through the executor registry.
//! Dispatch is fail-fast: the first stage error aborts the iteration and no
//! downstream stage runs. Earlier stages' caches from the failed iteration
//! stay in place; a retry of the full iteration overwrites them wholesale.

use super::mapreduce::MapReduceEngine;
use super::node::{NodeId, Pipeline};
use crate::config::StageType;
use crate::errors::IterationError;
use crate::registry::{StageExecutor, StageRegistry};
use crate::report::{IterationReport, NoOpPresentationSink, PresentationSink};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Runtime knobs for the executor.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Upper bound on a single stage invocation. Elapsing it drops the
    /// collaborator future, which cancels the call.
    pub stage_timeout: Option<Duration>,
    /// Upper bound on a whole iteration, checked before each stage and
    /// capped into the per-stage timeout.
    pub iteration_deadline: Option<Duration>,
    /// Worker-pool size for the map-reduce compute phase, independent of
    /// the scatter width.
    pub compute_workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            stage_timeout: None,
            iteration_deadline: None,
            compute_workers: 4,
        }
    }
}

/// Runs iterations of a built pipeline against an executor registry.
pub struct Executor {
    registry: Arc<StageRegistry>,
    config: ExecutorConfig,
    sink: Arc<dyn PresentationSink>,
}

impl Executor {
    /// Creates an executor with default config and no presentation sink.
    #[must_use]
    pub fn new(registry: Arc<StageRegistry>) -> Self {
        Self {
            registry,
            config: ExecutorConfig::default(),
            sink: Arc::new(NoOpPresentationSink),
        }
    }

    /// Sets the runtime config.
    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the presentation sink that receives iteration reports.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn PresentationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Runs one full iteration of the plan.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure; stages after it do not run in this
    /// iteration. The pipeline stays valid for a retry.
    pub async fn run_iteration(
        &self,
        pipeline: &mut Pipeline,
    ) -> Result<IterationReport, IterationError> {
        let started = Instant::now();
        let deadline = self.config.iteration_deadline.map(|d| started + d);
        let plan = pipeline.plan().clone();

        for id in plan {
            let timeout = match self.effective_timeout(deadline) {
                Ok(timeout) => timeout,
                Err(()) => {
                    return Err(IterationError::DeadlineExceeded {
                        stage: pipeline.node(id).name().to_string(),
                    })
                }
            };
            let inputs = gather_inputs(pipeline, id);
            self.run_stage(pipeline, id, inputs, timeout).await?;
        }

        pipeline.iterations += 1;
        let report = snapshot(pipeline);
        debug!(
            iteration = report.iteration,
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            "iteration completed"
        );
        self.sink.publish(&report).await;
        Ok(report)
    }

    /// Executes one stage and overwrites its output cache.
    async fn run_stage(
        &self,
        pipeline: &mut Pipeline,
        id: NodeId,
        inputs: Vec<serde_json::Value>,
        timeout: Option<Duration>,
    ) -> Result<(), IterationError> {
        let definition = pipeline.node(id).definition.clone();
        debug!(
            stage = %definition.name,
            stage_type = %definition.stage_type,
            subtype = %definition.subtype,
            "stage started"
        );

        let result = match definition.stage_type {
            StageType::MapReduce => {
                MapReduceEngine::new(&self.registry, self.config.compute_workers)
                    .run(&definition, &inputs, timeout)
                    .await
            }
            _ => {
                dispatch(
                    &self.registry,
                    &definition.name,
                    definition.stage_type,
                    &definition.subtype,
                    &definition.config,
                    &inputs,
                    timeout,
                )
                .await
            }
        };

        let outputs = match result {
            Ok(outputs) => outputs,
            Err(err) => {
                error!(stage = %definition.name, error = %err, "stage failed");
                return Err(err);
            }
        };

        if outputs.len() != definition.output_data.len() {
            return Err(IterationError::OutputArityMismatch {
                stage: definition.name.clone(),
                expected: definition.output_data.len(),
                actual: outputs.len(),
            });
        }

        pipeline.node_mut(id).set_latest_output_data(outputs);
        debug!(stage = %definition.name, "stage completed");
        Ok(())
    }

    /// Per-stage timeout capped by the remaining iteration budget.
    /// `Err(())` means the deadline has already elapsed.
    fn effective_timeout(&self, deadline: Option<Instant>) -> Result<Option<Duration>, ()> {
        let Some(deadline) = deadline else {
            return Ok(self.config.stage_timeout);
        };
        let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
            return Err(());
        };
        Ok(Some(match self.config.stage_timeout {
            Some(per_stage) => per_stage.min(remaining),
            None => remaining,
        }))
    }
}

/// Gathers a stage's inputs from its producers' caches, positionally.
fn gather_inputs(pipeline: &Pipeline, id: NodeId) -> Vec<serde_json::Value> {
    pipeline
        .node(id)
        .input_sources
        .iter()
        .map(|&(producer, position)| {
            pipeline
                .node(producer)
                .latest_output_data()
                .get(position)
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}

/// Snapshots every registered field's latest value into a report.
fn snapshot(pipeline: &Pipeline) -> IterationReport {
    let mut report = IterationReport::new(pipeline.iterations_completed());
    for (field, _) in pipeline.fields().iter() {
        if let Some(value) = pipeline.latest_field_value(field) {
            report.fields.insert(field.to_string(), value.clone());
        }
    }
    report
}

/// Routes a stage invocation through the registry's type table.
pub(crate) async fn dispatch(
    registry: &StageRegistry,
    stage: &str,
    stage_type: StageType,
    subtype: &str,
    config: &serde_json::Value,
    inputs: &[serde_json::Value],
    timeout: Option<Duration>,
) -> Result<Vec<serde_json::Value>, IterationError> {
    let Some(executor) = registry.get(stage_type) else {
        return Err(IterationError::UnsupportedStageType {
            stage: stage.to_string(),
            stage_type,
        });
    };
    invoke(executor.as_ref(), stage, stage_type, subtype, config, inputs, timeout).await
}

/// Invokes one collaborator with timeout and error wrapping.
pub(crate) async fn invoke(
    executor: &dyn StageExecutor,
    stage: &str,
    stage_type: StageType,
    subtype: &str,
    config: &serde_json::Value,
    inputs: &[serde_json::Value],
    timeout: Option<Duration>,
) -> Result<Vec<serde_json::Value>, IterationError> {
    let call = executor.execute(subtype, config, inputs);
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                return Err(IterationError::StageTimeout {
                    stage: stage.to_string(),
                    timeout: limit,
                })
            }
        },
        None => call.await,
    };

    result.map_err(|source| IterationError::StageFailed {
        stage: stage.to_string(),
        stage_type,
        subtype: subtype.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, PipelineEdge, StageDefinition};
    use crate::pipeline::PipelineBuilder;
    use crate::registry::FnExecutor;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct SleepExecutor(Duration);

    #[async_trait]
    impl StageExecutor for SleepExecutor {
        async fn execute(
            &self,
            _subtype: &str,
            _config: &serde_json::Value,
            _inputs: &[serde_json::Value],
        ) -> anyhow::Result<Vec<serde_json::Value>> {
            tokio::time::sleep(self.0).await;
            Ok(vec![serde_json::json!("late")])
        }
    }

    fn linear_config() -> PipelineConfig {
        PipelineConfig::new()
            .with_stage(
                StageDefinition::new("ingest1", StageType::Ingest, "file").with_outputs(["raw"]),
            )
            .with_stage(
                StageDefinition::new("extract1", StageType::FeatureExtraction, "tsfel")
                    .with_inputs(["raw"])
                    .with_outputs(["features"]),
            )
            .with_edge(PipelineEdge::new("ingest1"))
            .with_edge(PipelineEdge::new("extract1").with_follows(["ingest1"]))
    }

    fn linear_registry() -> StageRegistry {
        StageRegistry::new()
            .with_executor(
                StageType::Ingest,
                Arc::new(FnExecutor::new("ingest", |_, _, _| {
                    Ok(vec![serde_json::json!([1, 2, 3])])
                })),
            )
            .with_executor(
                StageType::FeatureExtraction,
                Arc::new(FnExecutor::new("extract", |_, _, inputs| {
                    Ok(vec![serde_json::json!({"from": inputs[0].clone()})])
                })),
            )
    }

    #[tokio::test]
    async fn test_iteration_wires_inputs_from_producer_cache() {
        let mut pipeline = PipelineBuilder::new().build(&linear_config()).unwrap();
        let executor = Executor::new(Arc::new(linear_registry()));

        let report = executor.run_iteration(&mut pipeline).await.unwrap();

        assert_eq!(report.iteration, 1);
        assert_eq!(
            pipeline.latest_field_value("features"),
            Some(&serde_json::json!({"from": [1, 2, 3]}))
        );
    }

    #[tokio::test]
    async fn test_unsupported_type_fails_dispatch() {
        let mut pipeline = PipelineBuilder::new().build(&linear_config()).unwrap();
        // Only ingest registered; extraction has no executor.
        let registry = StageRegistry::new().with_executor(
            StageType::Ingest,
            Arc::new(FnExecutor::new("ingest", |_, _, _| {
                Ok(vec![serde_json::json!(1)])
            })),
        );
        let executor = Executor::new(Arc::new(registry));

        let err = executor.run_iteration(&mut pipeline).await.unwrap_err();
        assert!(matches!(
            err,
            IterationError::UnsupportedStageType { stage, stage_type }
                if stage == "extract1" && stage_type == StageType::FeatureExtraction
        ));
    }

    #[tokio::test]
    async fn test_failure_is_fail_fast_and_leaves_earlier_cache() {
        let mut pipeline = PipelineBuilder::new().build(&linear_config()).unwrap();
        let registry = StageRegistry::new()
            .with_executor(
                StageType::Ingest,
                Arc::new(FnExecutor::new("ingest", |_, _, _| {
                    Ok(vec![serde_json::json!("fresh")])
                })),
            )
            .with_executor(
                StageType::FeatureExtraction,
                Arc::new(FnExecutor::new("extract", |_, _, _| {
                    anyhow::bail!("bad window")
                })),
            );
        let executor = Executor::new(Arc::new(registry));

        let err = executor.run_iteration(&mut pipeline).await.unwrap_err();
        assert!(matches!(err, IterationError::StageFailed { ref stage, .. } if stage == "extract1"));

        // ingest1 ran before the failure; its cache from the failed
        // iteration stays in place for the caller to retry over.
        assert_eq!(
            pipeline.latest_field_value("raw"),
            Some(&serde_json::json!("fresh"))
        );
        assert_eq!(pipeline.latest_field_value("features"), None);
        assert_eq!(pipeline.iterations_completed(), 0);
    }

    #[tokio::test]
    async fn test_output_arity_enforced() {
        let mut pipeline = PipelineBuilder::new().build(&linear_config()).unwrap();
        let registry = StageRegistry::new()
            .with_executor(
                StageType::Ingest,
                Arc::new(FnExecutor::new("ingest", |_, _, _| {
                    Ok(vec![serde_json::json!(1), serde_json::json!(2)])
                })),
            );
        let executor = Executor::new(Arc::new(registry));

        let err = executor.run_iteration(&mut pipeline).await.unwrap_err();
        assert!(matches!(
            err,
            IterationError::OutputArityMismatch { expected: 1, actual: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_stage_timeout() {
        let mut pipeline = PipelineBuilder::new().build(&linear_config()).unwrap();
        let registry = StageRegistry::new()
            .with_executor(
                StageType::Ingest,
                Arc::new(SleepExecutor(Duration::from_secs(30))),
            )
            .with_executor(
                StageType::FeatureExtraction,
                Arc::new(FnExecutor::new("extract", |_, _, _| Ok(vec![]))),
            );
        let executor = Executor::new(Arc::new(registry)).with_config(ExecutorConfig {
            stage_timeout: Some(Duration::from_millis(20)),
            ..ExecutorConfig::default()
        });

        let err = executor.run_iteration(&mut pipeline).await.unwrap_err();
        assert!(matches!(err, IterationError::StageTimeout { ref stage, .. } if stage == "ingest1"));
    }

    #[tokio::test]
    async fn test_iteration_deadline_caps_stages() {
        let mut pipeline = PipelineBuilder::new().build(&linear_config()).unwrap();
        let registry = StageRegistry::new()
            .with_executor(
                StageType::Ingest,
                Arc::new(SleepExecutor(Duration::from_secs(30))),
            )
            .with_executor(
                StageType::FeatureExtraction,
                Arc::new(FnExecutor::new("extract", |_, _, _| Ok(vec![]))),
            );
        let executor = Executor::new(Arc::new(registry)).with_config(ExecutorConfig {
            iteration_deadline: Some(Duration::from_millis(20)),
            ..ExecutorConfig::default()
        });

        // The deadline is folded into the stage timeout, so the slow stage
        // is cancelled rather than overrunning the iteration budget.
        let err = executor.run_iteration(&mut pipeline).await.unwrap_err();
        assert!(matches!(err, IterationError::StageTimeout { ref stage, .. } if stage == "ingest1"));
    }
}
