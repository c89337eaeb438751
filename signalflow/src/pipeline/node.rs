//! Runtime stage nodes, the field registry, and the built pipeline.
//!
//! Nodes live in a single owning arena inside [`Pipeline`]; every other
//! structure refers to them by [`NodeId`]. Back-references (followers) are
//! plain names, never owning links, so the graph cannot form reference
//! cycles.

use crate::config::StageDefinition;
use std::collections::HashMap;

/// Index of a stage node in the pipeline's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Returns the raw arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// The flat, serial execution order computed once at build time and reused
/// for every iteration.
pub type ExecutionPlan = Vec<NodeId>;

/// Runtime wrapper around one stage definition.
#[derive(Debug, Clone)]
pub struct StageNode {
    /// The immutable definition this node was built from.
    pub definition: StageDefinition,
    /// Declared predecessors, from the pipeline section.
    pub follows: Vec<String>,
    /// Names of stages that declared this one as a predecessor.
    /// Introspection only; scheduling ignores it.
    pub followers: Vec<String>,
    /// Resolved input wiring: for each entry of `definition.input_data`, the
    /// producing node and the position of the field within that producer's
    /// declared outputs. Filled in by the builder.
    pub(crate) input_sources: Vec<(NodeId, usize)>,
    /// Flips false→true when the scheduler places the node; never reset.
    pub(crate) scheduled: bool,
    /// Cached output tuple from the most recent iteration, aligned
    /// positionally with `definition.output_data`. Overwritten wholesale
    /// each run.
    latest_output_data: Vec<serde_json::Value>,
}

impl StageNode {
    /// Creates an unscheduled node with an empty output cache.
    #[must_use]
    pub fn new(definition: StageDefinition) -> Self {
        Self {
            definition,
            follows: Vec::new(),
            followers: Vec::new(),
            input_sources: Vec::new(),
            scheduled: false,
            latest_output_data: Vec::new(),
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Whether the scheduler has placed this node in the plan.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// The cached output tuple from the last completed run of this stage.
    #[must_use]
    pub fn latest_output_data(&self) -> &[serde_json::Value] {
        &self.latest_output_data
    }

    /// Replaces the cached output tuple.
    pub(crate) fn set_latest_output_data(&mut self, outputs: Vec<serde_json::Value>) {
        self.latest_output_data = outputs;
    }

    /// Position of a field within this node's declared outputs.
    #[must_use]
    pub fn output_position(&self, field: &str) -> Option<usize> {
        self.definition.output_data.iter().position(|f| f == field)
    }
}

/// Maps every output field name to its single producing node.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    producers: HashMap<String, NodeId>,
}

impl FieldRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id` as the producer of `field`. Returns the previous
    /// producer if the field was already claimed.
    pub(crate) fn insert(&mut self, field: impl Into<String>, id: NodeId) -> Option<NodeId> {
        self.producers.insert(field.into(), id)
    }

    /// Looks up the producer of a field.
    #[must_use]
    pub fn producer(&self, field: &str) -> Option<NodeId> {
        self.producers.get(field).copied()
    }

    /// Returns the number of registered fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.producers.len()
    }

    /// Returns true if no fields are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }

    /// Iterates over `(field, producer)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.producers.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// A validated pipeline: the node arena, the field registry and the
/// execution plan. Built once by the
/// [`PipelineBuilder`](crate::pipeline::PipelineBuilder) and reusable across
/// unboundedly many iterations.
#[derive(Debug)]
pub struct Pipeline {
    pub(crate) nodes: Vec<StageNode>,
    pub(crate) by_name: HashMap<String, NodeId>,
    pub(crate) fields: FieldRegistry,
    pub(crate) plan: ExecutionPlan,
    pub(crate) iterations: u64,
}

impl Pipeline {
    /// Returns the node for an id.
    ///
    /// # Panics
    ///
    /// Panics if the id did not come from this pipeline.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &StageNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut StageNode {
        &mut self.nodes[id.0]
    }

    /// Looks up a node by stage name.
    #[must_use]
    pub fn node_by_name(&self, name: &str) -> Option<&StageNode> {
        self.by_name.get(name).map(|id| &self.nodes[id.0])
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the computed execution plan.
    #[must_use]
    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Returns stage names in plan order.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&str> {
        self.plan.iter().map(|id| self.nodes[id.0].name()).collect()
    }

    /// Returns the field registry.
    #[must_use]
    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    /// Number of iterations completed successfully on this pipeline.
    #[must_use]
    pub fn iterations_completed(&self) -> u64 {
        self.iterations
    }

    /// Reads the cached value of a field from its producer, if the producer
    /// has run at least once.
    #[must_use]
    pub fn latest_field_value(&self, field: &str) -> Option<&serde_json::Value> {
        let producer = self.node(self.fields.producer(field)?);
        let position = producer.output_position(field)?;
        producer.latest_output_data().get(position)
    }
}
