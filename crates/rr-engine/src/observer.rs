//! Engine observer trait for progress reporting and data collection.

use rr_core::Step;
use rr_fleet::{Delivery, DeliveryPlan, Unserved};

use crate::{RunSummary, StepSummary};

/// Callbacks invoked by [`Engine::run`][crate::Engine::run].
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
///
/// # Example — progress printer
///
/// ```rust,ignore
/// struct Progress;
///
/// impl EngineObserver for Progress {
///     fn on_step_end(&mut self, summary: &StepSummary) {
///         println!("{}: {} assigned, {} replanned", summary.step, summary.assigned, summary.replanned);
///     }
/// }
/// ```
pub trait EngineObserver {
    /// Called before each `step`.
    fn on_step_start(&mut self, _step: Step) {}

    /// Called after each `step` with what it did.
    fn on_step_end(&mut self, _summary: &StepSummary) {}

    /// Called once per request that became Unserved during a step.
    fn on_unserved(&mut self, _step: Step, _unserved: &Unserved) {}

    /// Called after each `step` with the plan of every vehicle.
    fn on_plans(&mut self, _step: Step, _plans: &[DeliveryPlan]) {}

    /// Called for each stop served while advancing.  `time` is the absolute
    /// simulated time of the delivery.
    fn on_delivery(&mut self, _delivery: &Delivery, _time: f64) {}

    /// Called once when the run finishes.
    fn on_run_end(&mut self, _summary: &RunSummary) {}
}

/// An [`EngineObserver`] that does nothing.
pub struct NoopObserver;

impl EngineObserver for NoopObserver {}
