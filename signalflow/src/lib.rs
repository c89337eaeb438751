//! # Signalflow
//!
//! A configuration-driven orchestrator for directed acyclic pipelines of
//! data-processing stages, with a scatter/compute/gather map-reduce engine
//! for batch-style parallel stages.
//!
//! A pipeline is described by two configuration sections: stage definitions
//! (type, subtype, opaque config, named input/output fields) and declared
//! `follows` edges. The builder validates both, indexes every output field
//! to its single producer, and computes one serial execution plan from the
//! data dependencies. The executor then runs that plan once per iteration,
//! wiring each stage's inputs from its producers' cached outputs and
//! dispatching through a registry of external stage executors.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use signalflow::prelude::*;
//!
//! let config: PipelineConfig = serde_json::from_str(raw_config)?;
//! let mut pipeline = PipelineBuilder::new().build(&config)?;
//!
//! let executor = Executor::new(registry)
//!     .with_sink(Arc::new(LoggingPresentationSink::default()));
//! let report = executor.run_iteration(&mut pipeline).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod report;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        ComputeSpec, FunctionSpec, MapReduceSpec, PipelineConfig, PipelineEdge, StageDefinition,
        StageType,
    };
    pub use crate::errors::{BuildError, IterationError, SignalflowError};
    pub use crate::pipeline::{
        ExecutionPlan, Executor, ExecutorConfig, FieldRegistry, MapReduceEngine, NodeId, Pipeline,
        PipelineBuilder, StageNode,
    };
    pub use crate::registry::{FnExecutor, NoOpExecutor, StageExecutor, StageRegistry};
    pub use crate::report::{
        CollectingPresentationSink, IterationReport, LoggingPresentationSink,
        NoOpPresentationSink, PresentationSink,
    };
}
