//! Progress observation for pipeline runs.
//!
//! Observers are advisory: they are invoked synchronously before and after
//! each stage, and a misbehaving observer must never destabilize the run:
//! panics are caught at the call site and logged.

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::result::PipelineStage;

/// Receives progress notifications during a pipeline run.
pub trait ProgressObserver: Send + Sync {
    /// Called before and after each stage.
    ///
    /// `fraction` is an overall completion estimate in `[0, 1]`.
    fn on_progress(&self, stage: PipelineStage, fraction: f64, message: &str);
}

/// Invokes an observer, isolating any panic it raises.
pub(crate) fn emit(
    observer: &dyn ProgressObserver,
    stage: PipelineStage,
    fraction: f64,
    message: &str,
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        observer.on_progress(stage, fraction, message);
    }));
    if outcome.is_err() {
        tracing::warn!(stage = %stage, fraction, "progress observer panicked; ignoring");
    }
}

/// An observer that discards all notifications.
///
/// Used as the default when no observer is supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgress;

impl ProgressObserver for NoOpProgress {
    fn on_progress(&self, _stage: PipelineStage, _fraction: f64, _message: &str) {}
}

/// An observer that logs notifications through the tracing framework.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProgress;

impl ProgressObserver for LoggingProgress {
    fn on_progress(&self, stage: PipelineStage, fraction: f64, message: &str) {
        tracing::info!(stage = %stage, percent = (fraction * 100.0).round(), "{message}");
    }
}

/// An observer backed by a closure.
pub struct FnProgress<F>
where
    F: Fn(PipelineStage, f64, &str) + Send + Sync,
{
    func: F,
}

impl<F> FnProgress<F>
where
    F: Fn(PipelineStage, f64, &str) + Send + Sync,
{
    /// Wraps a closure as an observer.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> ProgressObserver for FnProgress<F>
where
    F: Fn(PipelineStage, f64, &str) + Send + Sync,
{
    fn on_progress(&self, stage: PipelineStage, fraction: f64, message: &str) {
        (self.func)(stage, fraction, message);
    }
}

/// A recorded progress notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// The stage reported.
    pub stage: PipelineStage,
    /// Completion estimate in `[0, 1]`.
    pub fraction: f64,
    /// Human-readable message.
    pub message: String,
}

/// An observer that records every notification, for tests and inspection.
#[derive(Debug, Default)]
pub struct CollectingProgress {
    events: RwLock<Vec<ProgressEvent>>,
}

impl CollectingProgress {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in order.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.read().clone()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Events reported for one stage.
    #[must_use]
    pub fn events_for(&self, stage: PipelineStage) -> Vec<ProgressEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.stage == stage)
            .cloned()
            .collect()
    }
}

impl ProgressObserver for CollectingProgress {
    fn on_progress(&self, stage: PipelineStage, fraction: f64, message: &str) {
        self.events.write().push(ProgressEvent {
            stage,
            fraction,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collecting_progress_records_in_order() {
        let observer = CollectingProgress::new();
        observer.on_progress(PipelineStage::ImageGeneration, 0.1, "starting");
        observer.on_progress(PipelineStage::ImageGeneration, 0.2, "done");
        observer.on_progress(PipelineStage::MeshConversion, 0.3, "converting");

        assert_eq!(observer.len(), 3);
        assert_eq!(observer.events()[0].message, "starting");
        assert_eq!(observer.events_for(PipelineStage::ImageGeneration).len(), 2);
    }

    #[test]
    fn test_fn_progress() {
        let observer = CollectingProgress::new();
        {
            let inner = &observer;
            let wrapped = FnProgress::new(move |stage, fraction, message| {
                inner.on_progress(stage, fraction, message);
            });
            wrapped.on_progress(PipelineStage::Pricing, 0.9, "pricing");
        }
        assert_eq!(observer.len(), 1);
    }

    #[test]
    fn test_emit_isolates_panics() {
        struct Panicking;
        impl ProgressObserver for Panicking {
            fn on_progress(&self, _stage: PipelineStage, _fraction: f64, _message: &str) {
                panic!("observer misbehaved");
            }
        }

        // Must not propagate.
        emit(&Panicking, PipelineStage::ImageGeneration, 0.1, "starting");
    }

    #[test]
    fn test_noop_progress() {
        let observer = NoOpProgress;
        observer.on_progress(PipelineStage::Pricing, 1.0, "complete");
        // Should not panic
    }

    #[test]
    fn test_logging_progress() {
        let observer = LoggingProgress;
        observer.on_progress(PipelineStage::MeshConversion, 0.45, "3D conversion: 50%");
        // Should not panic
    }
}
