//! Engine time model.
//!
//! # Design
//!
//! Two clocks run side by side:
//!
//! - `Step` counts orchestrator iterations (`Engine::step`).  It is an exact
//!   integer so observers can key output rows on it.
//! - `SimClock::elapsed` is continuous travel time in the same unit as edge
//!   travel times (the engine never interprets the unit).  ETAs in delivery
//!   plans are absolute values on this axis.
//!
//! `step()` never moves time; only `Engine::advance(duration)` does.  That
//! keeps allocation/replanning idempotent when nothing new has happened.

use std::fmt;

// ── Step ──────────────────────────────────────────────────────────────────────

/// An absolute orchestrator iteration counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Step(pub u64);

impl Step {
    pub const ZERO: Step = Step(0);

    /// Return the step `n` iterations after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Step {
        Step(self.0 + n)
    }
}

impl std::ops::Add<u64> for Step {
    type Output = Step;
    #[inline]
    fn add(self, rhs: u64) -> Step {
        Step(self.0 + rhs)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Tracks the current step and the elapsed simulated travel time.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimClock {
    /// The current step, advanced once per `Engine::step`.
    pub step: Step,
    /// Simulated time elapsed since the run began.
    pub elapsed: f64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to the next orchestrator step.
    #[inline]
    pub fn next_step(&mut self) {
        self.step = self.step + 1;
    }

    /// Advance simulated time by `duration`.  Negative or non-finite
    /// durations are ignored.
    #[inline]
    pub fn advance(&mut self, duration: f64) {
        if duration.is_finite() && duration > 0.0 {
            self.elapsed += duration;
        }
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (t={:.2})", self.step, self.elapsed)
    }
}
