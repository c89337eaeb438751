//! Configuration schema for pipeline definitions.
//!
//! A pipeline configuration has two sections: `parameters` describes every
//! stage (type, subtype, opaque config, input/output fields) and `pipeline`
//! declares the documented `follows` topology between them. How the
//! configuration is loaded (file, env, API) is up to the host; this module
//! only defines the structural schema.

use serde::{Deserialize, Serialize};

/// The closed set of recognized stage types.
///
/// Each type is backed by an external executor registered in the
/// [`StageRegistry`](crate::registry::StageRegistry). `MapReduce` is special:
/// it is executed by the scatter/compute/gather engine rather than a single
/// executor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    /// Pulls raw signals into the pipeline.
    Ingest,
    /// Classifies signal metadata.
    MetadataClassification,
    /// Extracts features from ingested signals.
    FeatureExtraction,
    /// Derives insights from extracted features.
    Insights,
    /// Generates processor configuration from insights.
    ConfigGenerator,
    /// Scatter/compute/gather execution over a single stage.
    MapReduce,
}

impl StageType {
    /// Returns the configuration name of the type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::MetadataClassification => "metadata_classification",
            Self::FeatureExtraction => "feature_extraction",
            Self::Insights => "insights",
            Self::ConfigGenerator => "config_generator",
            Self::MapReduce => "map_reduce",
        }
    }
}

impl std::fmt::Display for StageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable definition of a single stage, as parsed from the `parameters`
/// section. Created once from configuration and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Unique stage name.
    pub name: String,
    /// Stage type, resolved against the executor registry.
    #[serde(rename = "type")]
    pub stage_type: StageType,
    /// Algorithm variant within the type, interpreted by the executor.
    pub subtype: String,
    /// Opaque payload passed through to the executor.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Ordered field names this stage consumes.
    #[serde(default)]
    pub input_data: Vec<String>,
    /// Ordered field names this stage produces. Position is significant:
    /// cached outputs are aligned index-for-index with this list.
    #[serde(default)]
    pub output_data: Vec<String>,
}

impl StageDefinition {
    /// Creates a definition with no inputs, outputs, or config.
    #[must_use]
    pub fn new(name: impl Into<String>, stage_type: StageType, subtype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage_type,
            subtype: subtype.into(),
            config: serde_json::Value::Null,
            input_data: Vec::new(),
            output_data: Vec::new(),
        }
    }

    /// Sets the opaque config payload.
    #[must_use]
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Sets the consumed field names.
    #[must_use]
    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.input_data = inputs.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the produced field names.
    #[must_use]
    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.output_data = outputs.into_iter().map(Into::into).collect();
        self
    }
}

/// One entry of the `pipeline` section: a stage and its declared
/// predecessors. The `follows` relation is the documented topology; it is
/// validated at build time but execution order is derived from field
/// dependencies instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEdge {
    /// The stage this entry describes.
    pub name: String,
    /// Names of stages declared to precede it.
    #[serde(default)]
    pub follows: Vec<String>,
}

impl PipelineEdge {
    /// Creates an entry with no predecessors.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            follows: Vec::new(),
        }
    }

    /// Sets the declared predecessors.
    #[must_use]
    pub fn with_follows(mut self, follows: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.follows = follows.into_iter().map(Into::into).collect();
        self
    }
}

/// The full two-section pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stage definitions.
    #[serde(default)]
    pub parameters: Vec<StageDefinition>,
    /// Declared pipeline edges.
    #[serde(default)]
    pub pipeline: Vec<PipelineEdge>,
}

impl PipelineConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stage definition.
    #[must_use]
    pub fn with_stage(mut self, definition: StageDefinition) -> Self {
        self.parameters.push(definition);
        self
    }

    /// Adds a pipeline-edge entry.
    #[must_use]
    pub fn with_edge(mut self, edge: PipelineEdge) -> Self {
        self.pipeline.push(edge);
        self
    }
}

/// A `(subtype, config)` pair selecting one external function, used for the
/// map and reduce phases of a map-reduce stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Algorithm variant, resolved by the collaborator.
    pub subtype: String,
    /// Opaque payload for the collaborator.
    #[serde(default)]
    pub config: serde_json::Value,
}

/// The compute phase carries a full stage type in addition to the
/// `(subtype, config)` pair, so each synthetic copy dispatches through the
/// regular executor table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeSpec {
    /// Stage type of each synthetic compute copy.
    #[serde(rename = "type")]
    pub stage_type: StageType,
    /// Algorithm variant within the type.
    pub subtype: String,
    /// Opaque payload for the executor.
    #[serde(default)]
    pub config: serde_json::Value,
}

/// The decomposed config payload of a `MapReduce` stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapReduceSpec {
    /// Scatter function: splits the stage input into N sub-inputs.
    pub map: FunctionSpec,
    /// Per-sub-input function, executed once per copy.
    pub compute: ComputeSpec,
    /// Gather function: merges the N compute results into one output tuple.
    pub reduce: FunctionSpec,
}
