//! Error types for the signalflow orchestrator.
//!
//! Errors split along the pipeline lifecycle: [`BuildError`] covers every
//! violation that can surface while constructing a pipeline from
//! configuration (all fatal — no usable pipeline is produced), while
//! [`IterationError`] covers runtime failures that abort the current
//! iteration but leave the pipeline reusable.

use crate::config::StageType;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for signalflow operations.
#[derive(Debug, Error)]
pub enum SignalflowError {
    /// Pipeline construction failed.
    #[error("{0}")]
    Build(#[from] BuildError),

    /// An iteration failed at runtime.
    #[error("{0}")]
    Iteration(#[from] IterationError),
}

/// Errors raised while building a pipeline from configuration.
///
/// Each variant carries the offending stage or field name for diagnostics.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    /// The same stage name appears twice in the definitions section.
    #[error("duplicate stage definition: '{name}'")]
    DuplicateStage {
        /// The repeated stage name.
        name: String,
    },

    /// The same stage appears twice in the pipeline section.
    #[error("stage '{name}' specified more than once in pipeline section")]
    DuplicatePipelineEntry {
        /// The repeated stage name.
        name: String,
    },

    /// A pipeline entry names a stage with no definition.
    #[error("stage '{name}' not defined in parameters section")]
    UndefinedStage {
        /// The undefined stage name.
        name: String,
    },

    /// A `follows` entry names a predecessor with no definition.
    #[error("stage '{stage}' follows '{predecessor}' which is not defined")]
    UndefinedPredecessor {
        /// The stage declaring the predecessor.
        stage: String,
        /// The missing predecessor name.
        predecessor: String,
    },

    /// A stage with no declared predecessors declares input fields.
    #[error("stage '{name}' is a first stage so it should not have input data")]
    RootStageWithInputs {
        /// The offending root stage.
        name: String,
    },

    /// Two stages both declare the same output field.
    #[error("output field '{field}' must be unique to a single stage (also produced by '{stage}')")]
    DuplicateOutputField {
        /// The colliding field name.
        field: String,
        /// The stage attempting to re-produce it.
        stage: String,
    },

    /// A `follows` predecessor is defined but not itself pipeline-declared.
    #[error("stage '{stage}' follows '{predecessor}' which is not declared in the pipeline section")]
    PredecessorNotInPipeline {
        /// The stage declaring the predecessor.
        stage: String,
        /// The predecessor missing from the pipeline section.
        predecessor: String,
    },

    /// An input field has no producing stage.
    #[error("stage '{stage}' consumes field '{field}' which no stage produces")]
    UndefinedField {
        /// The consuming stage.
        stage: String,
        /// The unresolvable field name.
        field: String,
    },

    /// The data-dependency graph contains a cycle.
    #[error("cyclic data dependency: {}", path.join(" -> "))]
    CyclicDependency {
        /// The stage names forming the cycle, first repeated at the end.
        path: Vec<String>,
    },
}

/// Errors raised while running one iteration of the plan.
///
/// Any of these aborts the iteration; stages downstream of the failure do
/// not run. The pipeline itself remains valid and the caller decides
/// whether to retry the full iteration.
#[derive(Debug, Error)]
pub enum IterationError {
    /// A stage's type has no registered executor.
    #[error("stage '{stage}': no executor registered for type '{stage_type}'")]
    UnsupportedStageType {
        /// The stage being dispatched.
        stage: String,
        /// Its unregistered type.
        stage_type: StageType,
    },

    /// An external stage executor returned an error.
    #[error("stage '{stage}' ({stage_type}/{subtype}) failed: {source}")]
    StageFailed {
        /// The failing stage.
        stage: String,
        /// Its type.
        stage_type: StageType,
        /// Its subtype.
        subtype: String,
        /// The collaborator's error.
        #[source]
        source: anyhow::Error,
    },

    /// An executor returned a tuple whose length does not match the stage's
    /// declared `output_data`.
    #[error("stage '{stage}' produced {actual} outputs, declared {expected}")]
    OutputArityMismatch {
        /// The misbehaving stage.
        stage: String,
        /// Declared output count.
        expected: usize,
        /// Returned output count.
        actual: usize,
    },

    /// A map-reduce compute copy failed; reduce was not invoked.
    #[error("stage '{stage}': compute copy {index} failed: {source}")]
    ComputeCopyFailed {
        /// The map-reduce stage.
        stage: String,
        /// Zero-based index of the failing copy.
        index: usize,
        /// The underlying failure.
        #[source]
        source: Box<IterationError>,
    },

    /// A map-reduce stage's config payload did not decompose into
    /// map/compute/reduce sub-specifications.
    #[error("stage '{stage}': invalid map-reduce config: {reason}")]
    InvalidMapReduceConfig {
        /// The map-reduce stage.
        stage: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// A stage ran past its configured timeout.
    #[error("stage '{stage}' timed out after {timeout:?}")]
    StageTimeout {
        /// The stage that was cancelled.
        stage: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The iteration deadline elapsed before this stage could complete.
    #[error("iteration deadline exceeded at stage '{stage}'")]
    DeadlineExceeded {
        /// The stage at which the deadline hit.
        stage: String,
    },
}

impl IterationError {
    /// Returns the name of the stage the error is attached to.
    #[must_use]
    pub fn stage(&self) -> &str {
        match self {
            Self::UnsupportedStageType { stage, .. }
            | Self::StageFailed { stage, .. }
            | Self::OutputArityMismatch { stage, .. }
            | Self::ComputeCopyFailed { stage, .. }
            | Self::InvalidMapReduceConfig { stage, .. }
            | Self::StageTimeout { stage, .. }
            | Self::DeadlineExceeded { stage } => stage,
        }
    }
}
