//! Pipeline construction and execution.
//!
//! This module provides:
//! - The validating [`PipelineBuilder`]
//! - The node arena, field registry and execution plan
//! - The iteration [`Executor`]
//! - The scatter/compute/gather [`MapReduceEngine`]

mod builder;
mod executor;
mod mapreduce;
mod node;
mod scheduler;


pub use builder::PipelineBuilder;
pub use executor::{Executor, ExecutorConfig};
pub use mapreduce::MapReduceEngine;
pub use node::{ExecutionPlan, FieldRegistry, NodeId, Pipeline, StageNode};
