//! Scatter/compute/gather execution for a single stage.
//!
//! A `MapReduce` stage's config decomposes into three sub-specifications:
//! a map function splitting the stage input into N independent sub-inputs,
//! a compute function applied once per sub-input, and a reduce function
//! merging the N results into the stage's final output tuple.
//!
//! The compute phase is modeled as fan-out tasks joined by a barrier before
//! reduce: copies run on a bounded worker pool in copy-index order, and a
//! failure in any copy aborts the stage before reduce is invoked. Setting
//! the pool size to 1 reproduces strictly sequential execution.

use super::executor::{dispatch, invoke};
use super::node::StageNode;
use crate::config::{MapReduceSpec, StageDefinition, StageType};
use crate::errors::IterationError;
use crate::registry::StageRegistry;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::time::Duration;
use tracing::debug;

/// Executes one map-reduce stage.
pub struct MapReduceEngine<'a> {
    registry: &'a StageRegistry,
    workers: usize,
}

impl<'a> MapReduceEngine<'a> {
    /// Creates an engine over the registry with the given compute pool size.
    #[must_use]
    pub fn new(registry: &'a StageRegistry, workers: usize) -> Self {
        Self { registry, workers }
    }

    /// Runs the three phases and returns the stage's final output tuple.
    ///
    /// # Errors
    ///
    /// Fails if the stage config does not decompose into map/compute/reduce
    /// sub-specifications, if the map or reduce collaborator is missing, or
    /// if any phase's invocation fails. A compute failure carries the copy
    /// index and suppresses the reduce invocation.
    pub async fn run(
        &self,
        definition: &StageDefinition,
        inputs: &[serde_json::Value],
        timeout: Option<Duration>,
    ) -> Result<Vec<serde_json::Value>, IterationError> {
        let spec: MapReduceSpec =
            serde_json::from_value(definition.config.clone()).map_err(|err| {
                IterationError::InvalidMapReduceConfig {
                    stage: definition.name.clone(),
                    reason: err.to_string(),
                }
            })?;

        let Some(map_fn) = self.registry.map_fn() else {
            return Err(IterationError::InvalidMapReduceConfig {
                stage: definition.name.clone(),
                reason: "no map collaborator registered".to_string(),
            });
        };
        let Some(reduce_fn) = self.registry.reduce_fn() else {
            return Err(IterationError::InvalidMapReduceConfig {
                stage: definition.name.clone(),
                reason: "no reduce collaborator registered".to_string(),
            });
        };

        // Scatter: one ordered sequence of independent sub-inputs.
        let sub_inputs = invoke(
            map_fn.as_ref(),
            &definition.name,
            StageType::MapReduce,
            &spec.map.subtype,
            &spec.map.config,
            inputs,
            timeout,
        )
        .await?;
        debug!(
            stage = %definition.name,
            copies = sub_inputs.len(),
            "scatter produced sub-inputs"
        );

        // Compute: one synthetic stage copy per sub-input, dispatched through
        // the regular path. Copy names carry the index so copies stay
        // distinguishable in logs and errors.
        let tasks = sub_inputs.into_iter().enumerate().map(|(index, sub_input)| {
            let mut copy = StageNode::new(StageDefinition {
                name: format!("{}_{index}", definition.name),
                stage_type: spec.compute.stage_type,
                subtype: spec.compute.subtype.clone(),
                config: spec.compute.config.clone(),
                input_data: Vec::new(),
                output_data: Vec::new(),
            });
            let stage = definition.name.clone();
            async move {
                let outputs = dispatch(
                    self.registry,
                    copy.name(),
                    copy.definition.stage_type,
                    &copy.definition.subtype,
                    &copy.definition.config,
                    std::slice::from_ref(&sub_input),
                    timeout,
                )
                .await
                .map_err(|source| IterationError::ComputeCopyFailed {
                    stage: stage.clone(),
                    index,
                    source: Box::new(source),
                })?;

                copy.set_latest_output_data(outputs);
                copy.latest_output_data().first().cloned().ok_or_else(|| {
                    IterationError::ComputeCopyFailed {
                        stage,
                        index,
                        source: Box::new(IterationError::OutputArityMismatch {
                            stage: copy.name().to_string(),
                            expected: 1,
                            actual: 0,
                        }),
                    }
                })
            }
        });

        // Barrier: all N copies must succeed before reduce sees anything.
        let results: Vec<serde_json::Value> = stream::iter(tasks)
            .buffered(self.workers.max(1))
            .try_collect()
            .await?;

        // Gather: the N results, in copy-index order, become one tuple.
        invoke(
            reduce_fn.as_ref(),
            &definition.name,
            StageType::MapReduce,
            &spec.reduce.subtype,
            &spec.reduce.config,
            &results,
            timeout,
        )
        .await
    }
}
