//! Iteration reports and the presentation sink.
//!
//! After an iteration completes, the executor snapshots every named field
//! (time series, insight text, generated configs) into an
//! [`IterationReport`] scoped to that run and hands it to the configured
//! [`PresentationSink`]. The sink is a one-way collaborator: it never calls
//! back into the pipeline.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info, Level};

/// Snapshot of all named field values after one completed iteration.
#[derive(Debug, Clone, Default)]
pub struct IterationReport {
    /// One-based iteration counter.
    pub iteration: u64,
    /// Field name → value produced in this iteration.
    pub fields: HashMap<String, serde_json::Value>,
}

impl IterationReport {
    /// Creates a report for an iteration.
    #[must_use]
    pub fn new(iteration: u64) -> Self {
        Self {
            iteration,
            fields: HashMap::new(),
        }
    }

    /// Reads one field's value.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    /// Names of all reported fields, sorted.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Trait for presentation collaborators consuming iteration output.
#[async_trait]
pub trait PresentationSink: Send + Sync {
    /// Publishes a completed iteration's report.
    async fn publish(&self, report: &IterationReport);

    /// Publishes without blocking. Must never fail; errors are logged and
    /// suppressed.
    fn try_publish(&self, report: &IterationReport);
}

/// A sink that discards all reports. The default when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpPresentationSink;

#[async_trait]
impl PresentationSink for NoOpPresentationSink {
    async fn publish(&self, _report: &IterationReport) {
        // Intentionally empty - discards all reports
    }

    fn try_publish(&self, _report: &IterationReport) {
        // Intentionally empty - discards all reports
    }
}

/// A sink that logs reports through the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingPresentationSink {
    level: Level,
}

impl Default for LoggingPresentationSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingPresentationSink {
    /// Creates a logging sink at the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    fn log_report(&self, report: &IterationReport) {
        match self.level {
            Level::DEBUG => {
                debug!(
                    iteration = report.iteration,
                    fields = ?report.field_names(),
                    "iteration completed"
                );
            }
            _ => {
                info!(
                    iteration = report.iteration,
                    fields = ?report.field_names(),
                    "iteration completed"
                );
            }
        }
    }
}

#[async_trait]
impl PresentationSink for LoggingPresentationSink {
    async fn publish(&self, report: &IterationReport) {
        self.log_report(report);
    }

    fn try_publish(&self, report: &IterationReport) {
        self.log_report(report);
    }
}

/// A collecting sink for tests.
#[derive(Debug, Default)]
pub struct CollectingPresentationSink {
    reports: parking_lot::RwLock<Vec<IterationReport>>,
}

impl CollectingPresentationSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected reports.
    #[must_use]
    pub fn reports(&self) -> Vec<IterationReport> {
        self.reports.read().clone()
    }

    /// Returns the number of collected reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.read().len()
    }

    /// Returns true if nothing has been published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.read().is_empty()
    }
}

#[async_trait]
impl PresentationSink for CollectingPresentationSink {
    async fn publish(&self, report: &IterationReport) {
        self.reports.write().push(report.clone());
    }

    fn try_publish(&self, report: &IterationReport) {
        self.reports.write().push(report.clone());
    }
}
