//! Pipeline construction and validation.
//!
//! The builder turns the two-section configuration into a validated
//! [`Pipeline`]: it checks every structural invariant, links the declared
//! `follows` topology (informational only), indexes output fields to their
//! producers, resolves each stage's input wiring, and computes the
//! execution plan. Any violation fails the build; no partially valid
//! pipeline is ever produced.

use super::node::{FieldRegistry, NodeId, Pipeline, StageNode};
use super::scheduler;
use crate::config::PipelineConfig;
use crate::errors::BuildError;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Builds validated pipelines from configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineBuilder;

impl PipelineBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Builds a pipeline from a parsed configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] for any violation of the structural
    /// invariants: duplicate names, undefined references, root stages with
    /// inputs, duplicate output fields, predecessors missing from the
    /// pipeline section, unresolvable input fields, or cyclic data
    /// dependencies.
    pub fn build(&self, config: &PipelineConfig) -> Result<Pipeline, BuildError> {
        let mut nodes: Vec<StageNode> = Vec::with_capacity(config.parameters.len());
        let mut by_name: HashMap<String, NodeId> = HashMap::new();

        // Stage structs for each definition; names must be unique.
        for definition in &config.parameters {
            if by_name.contains_key(&definition.name) {
                return Err(BuildError::DuplicateStage {
                    name: definition.name.clone(),
                });
            }
            by_name.insert(definition.name.clone(), NodeId(nodes.len()));
            nodes.push(StageNode::new(definition.clone()));
        }
        debug!(stages = nodes.len(), "parsed stage definitions");

        // Pipeline section: connect follows/followers, index output fields.
        // A stage may appear at most once here.
        let mut declared: HashSet<String> = HashSet::new();
        let mut fields = FieldRegistry::new();

        for edge in &config.pipeline {
            if !declared.insert(edge.name.clone()) {
                return Err(BuildError::DuplicatePipelineEntry {
                    name: edge.name.clone(),
                });
            }
            let Some(&id) = by_name.get(&edge.name) else {
                return Err(BuildError::UndefinedStage {
                    name: edge.name.clone(),
                });
            };

            if edge.follows.is_empty() {
                // A first stage has nothing to read from.
                if !nodes[id.index()].definition.input_data.is_empty() {
                    return Err(BuildError::RootStageWithInputs {
                        name: edge.name.clone(),
                    });
                }
            } else {
                for predecessor in &edge.follows {
                    let Some(&pred_id) = by_name.get(predecessor) else {
                        return Err(BuildError::UndefinedPredecessor {
                            stage: edge.name.clone(),
                            predecessor: predecessor.clone(),
                        });
                    };
                    nodes[id.index()].follows.push(predecessor.clone());
                    nodes[pred_id.index()].followers.push(edge.name.clone());
                }
            }

            for field in nodes[id.index()].definition.output_data.clone() {
                if fields.insert(field.clone(), id).is_some() {
                    return Err(BuildError::DuplicateOutputField {
                        field,
                        stage: edge.name.clone(),
                    });
                }
            }
        }

        // Second pass: every predecessor must itself be pipeline-declared,
        // not merely defined.
        for edge in &config.pipeline {
            for predecessor in &edge.follows {
                if !declared.contains(predecessor) {
                    return Err(BuildError::PredecessorNotInPipeline {
                        stage: edge.name.clone(),
                        predecessor: predecessor.clone(),
                    });
                }
            }
        }

        // Resolve each stage's input wiring against the field index.
        for index in 0..nodes.len() {
            let input_fields = nodes[index].definition.input_data.clone();
            let mut sources = Vec::with_capacity(input_fields.len());
            for field in input_fields {
                let Some(producer) = fields.producer(&field) else {
                    return Err(BuildError::UndefinedField {
                        stage: nodes[index].name().to_string(),
                        field,
                    });
                };
                // Producer indexed this field, so the position exists.
                let position = nodes[producer.index()]
                    .output_position(&field)
                    .unwrap_or_default();
                sources.push((producer, position));
            }
            nodes[index].input_sources = sources;
        }

        // One legal serial order, derived from data dependencies alone.
        let plan = scheduler::compute_plan(&mut nodes)?;
        debug!(
            order = ?plan.iter().map(|id| nodes[id.index()].name()).collect::<Vec<_>>(),
            "computed execution plan"
        );

        Ok(Pipeline {
            nodes,
            by_name,
            fields,
            plan,
            iterations: 0,
        })
    }
}
