//! Stage executor trait and registry.
//!
//! Executors are the external collaborators that do a stage's actual work.
//! The orchestrator treats each invocation as a pure function of
//! `(subtype, config, inputs)`; whatever state an executor keeps internally
//! is opaque to the core. Dispatch is a lookup table keyed by the closed
//! [`StageType`] set, so there is no runtime type branching.

use crate::config::StageType;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Trait for external stage executors.
///
/// The returned tuple must match the calling stage's declared `output_data`
/// in length and order; the executor for a field never changes between
/// iterations.
#[async_trait]
pub trait StageExecutor: Send + Sync + Debug {
    /// Runs the algorithm variant selected by `subtype` against the gathered
    /// inputs, returning the ordered output tuple.
    async fn execute(
        &self,
        subtype: &str,
        config: &serde_json::Value,
        inputs: &[serde_json::Value],
    ) -> anyhow::Result<Vec<serde_json::Value>>;
}

/// A function-based executor for closures and tests.
pub struct FnExecutor<F>
where
    F: Fn(&str, &serde_json::Value, &[serde_json::Value]) -> anyhow::Result<Vec<serde_json::Value>>
        + Send
        + Sync,
{
    name: String,
    func: F,
}

impl<F> FnExecutor<F>
where
    F: Fn(&str, &serde_json::Value, &[serde_json::Value]) -> anyhow::Result<Vec<serde_json::Value>>
        + Send
        + Sync,
{
    /// Creates a new function-based executor.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnExecutor<F>
where
    F: Fn(&str, &serde_json::Value, &[serde_json::Value]) -> anyhow::Result<Vec<serde_json::Value>>
        + Send
        + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnExecutor").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> StageExecutor for FnExecutor<F>
where
    F: Fn(&str, &serde_json::Value, &[serde_json::Value]) -> anyhow::Result<Vec<serde_json::Value>>
        + Send
        + Sync,
{
    async fn execute(
        &self,
        subtype: &str,
        config: &serde_json::Value,
        inputs: &[serde_json::Value],
    ) -> anyhow::Result<Vec<serde_json::Value>> {
        (self.func)(subtype, config, inputs)
    }
}

/// An executor that returns an empty tuple, for stages with no outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpExecutor;

#[async_trait]
impl StageExecutor for NoOpExecutor {
    async fn execute(
        &self,
        _subtype: &str,
        _config: &serde_json::Value,
        _inputs: &[serde_json::Value],
    ) -> anyhow::Result<Vec<serde_json::Value>> {
        Ok(Vec::new())
    }
}

/// Lookup table from stage type to executor, plus the dedicated map and
/// reduce collaborators used by the scatter/gather engine.
///
/// `MapReduce` stages are driven by the engine itself, so registering an
/// executor under [`StageType::MapReduce`] has no effect on dispatch.
#[derive(Debug, Default)]
pub struct StageRegistry {
    executors: HashMap<StageType, Arc<dyn StageExecutor>>,
    map_fn: Option<Arc<dyn StageExecutor>>,
    reduce_fn: Option<Arc<dyn StageExecutor>>,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the executor for a stage type.
    #[must_use]
    pub fn with_executor(mut self, stage_type: StageType, executor: Arc<dyn StageExecutor>) -> Self {
        self.executors.insert(stage_type, executor);
        self
    }

    /// Registers the map (scatter) collaborator.
    #[must_use]
    pub fn with_map(mut self, executor: Arc<dyn StageExecutor>) -> Self {
        self.map_fn = Some(executor);
        self
    }

    /// Registers the reduce (gather) collaborator.
    #[must_use]
    pub fn with_reduce(mut self, executor: Arc<dyn StageExecutor>) -> Self {
        self.reduce_fn = Some(executor);
        self
    }

    /// Looks up the executor for a stage type.
    #[must_use]
    pub fn get(&self, stage_type: StageType) -> Option<Arc<dyn StageExecutor>> {
        self.executors.get(&stage_type).cloned()
    }

    /// Returns the map collaborator, if registered.
    #[must_use]
    pub fn map_fn(&self) -> Option<Arc<dyn StageExecutor>> {
        self.map_fn.clone()
    }

    /// Returns the reduce collaborator, if registered.
    #[must_use]
    pub fn reduce_fn(&self) -> Option<Arc<dyn StageExecutor>> {
        self.reduce_fn.clone()
    }

    /// Returns the number of registered type executors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    /// Returns true if no type executors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}
